//! AST node types for the playground script engine.
//!
//! [`super::lower`] produces a [`Program`] from source text; the interpreter walks
//! these nodes directly. Function and class bodies are reference counted so
//! closures can share them without cloning the tree.

use std::rc::Rc;

pub type Program = Vec<Stmt>;

// ─── Statements ───────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VarKind {
    Var,
    Let,
    Const,
}

#[derive(Clone, Debug)]
pub struct Declarator {
    pub target: Pattern,
    pub init: Option<Expr>,
}

#[derive(Clone, Debug)]
pub enum ForInit {
    Var(VarKind, Vec<Declarator>),
    Expr(Expr),
}

/// Left-hand side of `for (... of ...)` / `for (... in ...)`.
#[derive(Clone, Debug)]
pub enum ForBinding {
    Decl(VarKind, Pattern),
    Assign(Pattern),
}

#[derive(Clone, Debug)]
pub struct SwitchCase {
    /// `None` for `default:`.
    pub test: Option<Expr>,
    pub body: Vec<Stmt>,
}

#[derive(Clone, Debug)]
pub struct CatchClause {
    pub param: Option<Pattern>,
    pub body: Vec<Stmt>,
}

#[derive(Clone, Debug)]
pub enum Stmt {
    Expr(Expr),
    Var(VarKind, Vec<Declarator>),
    Function(Rc<FunctionDef>),
    Class(Rc<ClassDef>),
    Return(Option<Expr>),
    If {
        test: Expr,
        consequent: Box<Stmt>,
        alternate: Option<Box<Stmt>>,
    },
    Block(Vec<Stmt>),
    For {
        init: Option<ForInit>,
        test: Option<Expr>,
        update: Option<Expr>,
        body: Box<Stmt>,
    },
    ForIn {
        binding: ForBinding,
        object: Expr,
        body: Box<Stmt>,
    },
    ForOf {
        binding: ForBinding,
        iterable: Expr,
        body: Box<Stmt>,
    },
    While {
        test: Expr,
        body: Box<Stmt>,
    },
    DoWhile {
        body: Box<Stmt>,
        test: Expr,
    },
    Break,
    Continue,
    Throw(Expr),
    Try {
        block: Vec<Stmt>,
        handler: Option<CatchClause>,
        finalizer: Option<Vec<Stmt>>,
    },
    Switch {
        discriminant: Expr,
        cases: Vec<SwitchCase>,
    },
    Empty,
}

// ─── Functions & classes ──────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub enum FunctionBody {
    Block(Vec<Stmt>),
    /// Concise arrow body: `x => x * 2`.
    Expr(Box<Expr>),
}

#[derive(Clone, Debug)]
pub struct FunctionDef {
    pub name: Option<Rc<str>>,
    /// Parameters; defaults are expressed as [`Pattern::Default`].
    pub params: Vec<Pattern>,
    pub rest: Option<Pattern>,
    pub body: FunctionBody,
    pub is_arrow: bool,
    pub is_async: bool,
    /// Source text, returned by `Function.prototype.toString`.
    pub source: Rc<str>,
}

impl FunctionDef {
    /// The `length` property: parameters before the first default or rest.
    pub fn arity(&self) -> usize {
        self.params
            .iter()
            .take_while(|p| !matches!(p, Pattern::Default(..)))
            .count()
    }
}

#[derive(Clone, Debug)]
pub enum ClassMemberKind {
    Method(Rc<FunctionDef>),
    Field(Option<Expr>),
}

#[derive(Clone, Debug)]
pub struct ClassMember {
    pub is_static: bool,
    pub key: PropKey,
    pub kind: ClassMemberKind,
}

#[derive(Clone, Debug)]
pub struct ClassDef {
    pub name: Option<Rc<str>>,
    pub superclass: Option<Expr>,
    pub constructor: Option<Rc<FunctionDef>>,
    pub members: Vec<ClassMember>,
    pub source: Rc<str>,
}

// ─── Patterns ─────────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub enum PropKey {
    Name(Rc<str>),
    Computed(Box<Expr>),
}

#[derive(Clone, Debug)]
pub struct ObjectPatternProp {
    pub key: PropKey,
    pub value: Pattern,
}

/// A binding or assignment target.
#[derive(Clone, Debug)]
pub enum Pattern {
    Ident(Rc<str>),
    Object {
        props: Vec<ObjectPatternProp>,
        rest: Option<Box<Pattern>>,
    },
    Array {
        /// `None` marks an elision (`[, b]`).
        elems: Vec<Option<Pattern>>,
        rest: Option<Box<Pattern>>,
    },
    Default(Box<Pattern>, Box<Expr>),
    /// Member expression target, only valid in assignments.
    Member(Box<Expr>),
}

// ─── Expressions ──────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub enum TemplateSegment {
    Text(Rc<str>),
    Expr(Expr),
}

#[derive(Clone, Debug)]
pub enum ArrayElem {
    Item(Expr),
    Spread(Expr),
    Hole,
}

#[derive(Clone, Debug)]
pub enum PropDef {
    KeyValue(PropKey, Expr),
    Shorthand(Rc<str>),
    Method(PropKey, Rc<FunctionDef>),
    Spread(Expr),
}

#[derive(Clone, Debug)]
pub enum Arg {
    Plain(Expr),
    Spread(Expr),
}

#[derive(Clone, Debug)]
pub enum MemberProp {
    Name(Rc<str>),
    Computed(Box<Expr>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
    BitNot,
    Typeof,
    Void,
    Delete,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Exp,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    UShr,
    In,
    InstanceOf,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Nullish,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Arith(BinaryOp),
    Logical(LogicalOp),
}

#[derive(Clone, Debug)]
pub enum Expr {
    Number(f64),
    Str(Rc<str>),
    Bool(bool),
    Null,
    Template(Vec<TemplateSegment>),
    Regex { pattern: Rc<str>, flags: Rc<str> },
    Ident(Rc<str>),
    This,
    /// `super` as a member object or callee.
    Super,
    Array(Vec<ArrayElem>),
    Object(Vec<PropDef>),
    Function(Rc<FunctionDef>),
    Class(Rc<ClassDef>),
    Unary(UnaryOp, Box<Expr>),
    Update {
        increment: bool,
        prefix: bool,
        target: Box<Expr>,
    },
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Logical(LogicalOp, Box<Expr>, Box<Expr>),
    Assign {
        op: AssignOp,
        target: Pattern,
        value: Box<Expr>,
    },
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Arg>,
        optional: bool,
    },
    New {
        callee: Box<Expr>,
        args: Vec<Arg>,
    },
    Member {
        object: Box<Expr>,
        property: MemberProp,
        optional: bool,
    },
    /// Delimits how far an optional-chaining short circuit reaches.
    OptionalChain(Box<Expr>),
    Sequence(Vec<Expr>),
    Await(Box<Expr>),
}
