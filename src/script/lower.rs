//! Lowers the swc syntax tree into the interpreter's [`ast`](super::ast).
//!
//! Anything the interpreter does not implement is rejected here with a
//! located [`SyntaxError`], before a single statement runs.

use std::rc::Rc;

use swc_common::{Span, Spanned};
use swc_ecma_ast as js;

use super::ast::*;
use super::error::SyntaxError;
use super::format::number_to_string;
use super::frontend::{self, Grammar, Parsed};

type LResult<T> = Result<T, SyntaxError>;

/// Parses JavaScript source into a program the interpreter can run.
pub fn parse(src: &str) -> LResult<Program> {
    let parsed = frontend::parse(src, Grammar::JavaScript)?;
    if let Some(e) = parsed.recovered.first() {
        return Err(e.clone());
    }
    let lower = Lower { p: &parsed };
    parsed.module.body.iter().map(|item| lower.item(item)).collect()
}

fn text(s: &str) -> Rc<str> {
    Rc::from(s)
}

fn name(id: &js::Ident) -> Rc<str> {
    text(&id.sym)
}

fn private_name(p: &js::PrivateName) -> Rc<str> {
    format!("#{}", p.id.sym).into()
}

fn key_name(key: &PropKey) -> Option<Rc<str>> {
    match key {
        PropKey::Name(n) => Some(n.clone()),
        PropKey::Computed(_) => None,
    }
}

fn var_kind(kind: js::VarDeclKind) -> VarKind {
    match kind {
        js::VarDeclKind::Var => VarKind::Var,
        js::VarDeclKind::Let => VarKind::Let,
        js::VarDeclKind::Const => VarKind::Const,
    }
}

fn unary_op(op: js::UnaryOp) -> UnaryOp {
    match op {
        js::UnaryOp::Minus => UnaryOp::Neg,
        js::UnaryOp::Plus => UnaryOp::Plus,
        js::UnaryOp::Bang => UnaryOp::Not,
        js::UnaryOp::Tilde => UnaryOp::BitNot,
        js::UnaryOp::TypeOf => UnaryOp::Typeof,
        js::UnaryOp::Void => UnaryOp::Void,
        js::UnaryOp::Delete => UnaryOp::Delete,
    }
}

enum Op {
    Binary(BinaryOp),
    Logical(LogicalOp),
}

fn binary_op(op: js::BinaryOp) -> Op {
    use js::BinaryOp as B;
    Op::Binary(match op {
        B::LogicalAnd => return Op::Logical(LogicalOp::And),
        B::LogicalOr => return Op::Logical(LogicalOp::Or),
        B::NullishCoalescing => return Op::Logical(LogicalOp::Nullish),
        B::EqEq => BinaryOp::Eq,
        B::NotEq => BinaryOp::NotEq,
        B::EqEqEq => BinaryOp::StrictEq,
        B::NotEqEq => BinaryOp::StrictNotEq,
        B::Lt => BinaryOp::Lt,
        B::LtEq => BinaryOp::LtEq,
        B::Gt => BinaryOp::Gt,
        B::GtEq => BinaryOp::GtEq,
        B::LShift => BinaryOp::Shl,
        B::RShift => BinaryOp::Shr,
        B::ZeroFillRShift => BinaryOp::UShr,
        B::Add => BinaryOp::Add,
        B::Sub => BinaryOp::Sub,
        B::Mul => BinaryOp::Mul,
        B::Div => BinaryOp::Div,
        B::Mod => BinaryOp::Mod,
        B::BitOr => BinaryOp::BitOr,
        B::BitXor => BinaryOp::BitXor,
        B::BitAnd => BinaryOp::BitAnd,
        B::In => BinaryOp::In,
        B::InstanceOf => BinaryOp::InstanceOf,
        B::Exp => BinaryOp::Exp,
    })
}

fn assign_op(op: js::AssignOp) -> AssignOp {
    use js::AssignOp as A;
    AssignOp::Arith(match op {
        A::Assign => return AssignOp::Assign,
        A::AndAssign => return AssignOp::Logical(LogicalOp::And),
        A::OrAssign => return AssignOp::Logical(LogicalOp::Or),
        A::NullishAssign => return AssignOp::Logical(LogicalOp::Nullish),
        A::AddAssign => BinaryOp::Add,
        A::SubAssign => BinaryOp::Sub,
        A::MulAssign => BinaryOp::Mul,
        A::DivAssign => BinaryOp::Div,
        A::ModAssign => BinaryOp::Mod,
        A::ExpAssign => BinaryOp::Exp,
        A::LShiftAssign => BinaryOp::Shl,
        A::RShiftAssign => BinaryOp::Shr,
        A::ZeroFillRShiftAssign => BinaryOp::UShr,
        A::BitOrAssign => BinaryOp::BitOr,
        A::BitXorAssign => BinaryOp::BitXor,
        A::BitAndAssign => BinaryOp::BitAnd,
    })
}

/// Whether a member or call expression continues an optional chain.
fn in_chain(e: &js::Expr) -> bool {
    match e {
        js::Expr::OptChain(_) => true,
        js::Expr::Member(m) => in_chain(&m.obj),
        js::Expr::Call(c) => matches!(&c.callee, js::Callee::Expr(callee) if in_chain(callee)),
        _ => false,
    }
}

struct Lower<'p, 'a> {
    p: &'p Parsed<'a>,
}

impl Lower<'_, '_> {
    fn err<T>(&self, span: Span, message: &str) -> LResult<T> {
        Err(self.p.error_at(span, message))
    }

    fn source(&self, span: Span) -> Rc<str> {
        text(self.p.text(span))
    }

    fn item(&self, item: &js::ModuleItem) -> LResult<Stmt> {
        match item {
            js::ModuleItem::Stmt(s) => self.stmt(s),
            js::ModuleItem::ModuleDecl(js::ModuleDecl::Import(d)) => {
                self.err(d.span, "Cannot use import statement outside a module")
            }
            js::ModuleItem::ModuleDecl(d) => self.err(d.span(), "Unexpected token 'export'"),
        }
    }

    // ─── Statements ───────────────────────────────────────────────────────

    fn stmts(&self, stmts: &[js::Stmt]) -> LResult<Vec<Stmt>> {
        stmts.iter().map(|s| self.stmt(s)).collect()
    }

    fn block(&self, b: &js::BlockStmt) -> LResult<Vec<Stmt>> {
        self.stmts(&b.stmts)
    }

    fn boxed(&self, s: &js::Stmt) -> LResult<Box<Stmt>> {
        Ok(Box::new(self.stmt(s)?))
    }

    fn opt_expr(&self, e: &Option<Box<js::Expr>>) -> LResult<Option<Expr>> {
        e.as_deref().map(|e| self.expr(e)).transpose()
    }

    fn stmt(&self, s: &js::Stmt) -> LResult<Stmt> {
        Ok(match s {
            js::Stmt::Block(b) => Stmt::Block(self.block(b)?),
            js::Stmt::Empty(_) | js::Stmt::Debugger(_) => Stmt::Empty,
            js::Stmt::With(w) => return self.err(w.span, "'with' statements are not supported"),
            js::Stmt::Labeled(l) => return self.err(l.span, "Labeled statements are not supported"),
            js::Stmt::Break(b) if b.label.is_some() => {
                return self.err(b.span, "Labeled statements are not supported")
            }
            js::Stmt::Continue(c) if c.label.is_some() => {
                return self.err(c.span, "Labeled statements are not supported")
            }
            js::Stmt::Break(_) => Stmt::Break,
            js::Stmt::Continue(_) => Stmt::Continue,
            js::Stmt::Return(r) => Stmt::Return(self.opt_expr(&r.arg)?),
            js::Stmt::If(i) => Stmt::If {
                test: self.expr(&i.test)?,
                consequent: self.boxed(&i.cons)?,
                alternate: i.alt.as_deref().map(|a| self.boxed(a)).transpose()?,
            },
            js::Stmt::Switch(sw) => Stmt::Switch {
                discriminant: self.expr(&sw.discriminant)?,
                cases: sw.cases.iter().map(|c| self.case(c)).collect::<LResult<_>>()?,
            },
            js::Stmt::Throw(t) => Stmt::Throw(self.expr(&t.arg)?),
            js::Stmt::Try(t) => Stmt::Try {
                block: self.block(&t.block)?,
                handler: t.handler.as_ref().map(|h| self.catch(h)).transpose()?,
                finalizer: t.finalizer.as_ref().map(|f| self.block(f)).transpose()?,
            },
            js::Stmt::While(w) => Stmt::While {
                test: self.expr(&w.test)?,
                body: self.boxed(&w.body)?,
            },
            js::Stmt::DoWhile(d) => Stmt::DoWhile {
                body: self.boxed(&d.body)?,
                test: self.expr(&d.test)?,
            },
            js::Stmt::For(f) => Stmt::For {
                init: match &f.init {
                    None => None,
                    Some(js::VarDeclOrExpr::VarDecl(v)) => {
                        let (kind, decls) = self.var_decl(v)?;
                        Some(ForInit::Var(kind, decls))
                    }
                    Some(js::VarDeclOrExpr::Expr(e)) => Some(ForInit::Expr(self.expr(e)?)),
                },
                test: self.opt_expr(&f.test)?,
                update: self.opt_expr(&f.update)?,
                body: self.boxed(&f.body)?,
            },
            js::Stmt::ForIn(f) => Stmt::ForIn {
                binding: self.for_head(&f.left)?,
                object: self.expr(&f.right)?,
                body: self.boxed(&f.body)?,
            },
            js::Stmt::ForOf(f) if f.is_await => {
                return self.err(f.span, "'for await' loops are not supported")
            }
            js::Stmt::ForOf(f) => Stmt::ForOf {
                binding: self.for_head(&f.left)?,
                iterable: self.expr(&f.right)?,
                body: self.boxed(&f.body)?,
            },
            js::Stmt::Decl(d) => self.decl(d)?,
            js::Stmt::Expr(e) => Stmt::Expr(self.expr(&e.expr)?),
        })
    }

    fn case(&self, c: &js::SwitchCase) -> LResult<SwitchCase> {
        Ok(SwitchCase {
            test: self.opt_expr(&c.test)?,
            body: self.stmts(&c.cons)?,
        })
    }

    fn catch(&self, h: &js::CatchClause) -> LResult<CatchClause> {
        Ok(CatchClause {
            param: h.param.as_ref().map(|p| self.pat(p)).transpose()?,
            body: self.block(&h.body)?,
        })
    }

    fn for_head(&self, head: &js::ForHead) -> LResult<ForBinding> {
        match head {
            js::ForHead::VarDecl(v) => match v.decls.as_slice() {
                [d] => Ok(ForBinding::Decl(var_kind(v.kind), self.pat(&d.name)?)),
                _ => self.err(v.span, "Invalid left-hand side in for-loop: must have a single binding."),
            },
            js::ForHead::UsingDecl(u) => self.err(u.span, "'using' declarations are not supported"),
            js::ForHead::Pat(p) => Ok(ForBinding::Assign(self.pat(p)?)),
        }
    }

    fn decl(&self, d: &js::Decl) -> LResult<Stmt> {
        match d {
            js::Decl::Var(v) => {
                let (kind, decls) = self.var_decl(v)?;
                Ok(Stmt::Var(kind, decls))
            }
            js::Decl::Fn(f) => Ok(Stmt::Function(self.function(
                Some(name(&f.ident)),
                &f.function,
                f.function.span,
            )?)),
            js::Decl::Class(c) => Ok(Stmt::Class(self.class(Some(name(&c.ident)), &c.class)?)),
            other => self.err(other.span(), "Unexpected token"),
        }
    }

    fn var_decl(&self, v: &js::VarDecl) -> LResult<(VarKind, Vec<Declarator>)> {
        let kind = var_kind(v.kind);
        let decls = v
            .decls
            .iter()
            .map(|d| self.declarator(kind, d))
            .collect::<LResult<_>>()?;
        Ok((kind, decls))
    }

    fn declarator(&self, kind: VarKind, d: &js::VarDeclarator) -> LResult<Declarator> {
        if d.init.is_none() {
            if kind == VarKind::Const {
                return self.err(d.span, "Missing initializer in const declaration");
            }
            if !matches!(d.name, js::Pat::Ident(_)) {
                return self.err(d.span, "Missing initializer in destructuring declaration");
            }
        }
        Ok(Declarator {
            target: self.pat(&d.name)?,
            init: self.opt_expr(&d.init)?,
        })
    }

    // ─── Functions & classes ──────────────────────────────────────────────

    fn params(&self, pats: &[&js::Pat]) -> LResult<(Vec<Pattern>, Option<Pattern>)> {
        let mut params = Vec::with_capacity(pats.len());
        let mut rest = None;
        for (i, p) in pats.iter().enumerate() {
            match *p {
                js::Pat::Rest(r) if i + 1 == pats.len() => rest = Some(self.pat(&r.arg)?),
                js::Pat::Rest(r) => return self.err(r.span, "Rest parameter must be last formal parameter"),
                p => params.push(self.pat(p)?),
            }
        }
        Ok((params, rest))
    }

    fn function(&self, name: Option<Rc<str>>, f: &js::Function, span: Span) -> LResult<Rc<FunctionDef>> {
        if f.is_generator {
            return self.err(span, "Generator functions are not supported");
        }
        let pats: Vec<&js::Pat> = f.params.iter().map(|p| &p.pat).collect();
        let (params, rest) = self.params(&pats)?;
        let Some(body) = &f.body else {
            return self.err(span, "Function implementation is missing");
        };
        Ok(Rc::new(FunctionDef {
            name,
            params,
            rest,
            body: FunctionBody::Block(self.block(body)?),
            is_arrow: false,
            is_async: f.is_async,
            source: self.source(span),
        }))
    }

    fn arrow(&self, a: &js::ArrowExpr) -> LResult<Rc<FunctionDef>> {
        if a.is_generator {
            return self.err(a.span, "Generator functions are not supported");
        }
        let pats: Vec<&js::Pat> = a.params.iter().collect();
        let (params, rest) = self.params(&pats)?;
        let body = match &*a.body {
            js::BlockStmtOrExpr::BlockStmt(b) => FunctionBody::Block(self.block(b)?),
            js::BlockStmtOrExpr::Expr(e) => FunctionBody::Expr(Box::new(self.expr(e)?)),
        };
        Ok(Rc::new(FunctionDef {
            name: None,
            params,
            rest,
            body,
            is_arrow: true,
            is_async: a.is_async,
            source: self.source(a.span),
        }))
    }

    fn method_kind(&self, kind: js::MethodKind, span: Span) -> LResult<()> {
        match kind {
            js::MethodKind::Method => Ok(()),
            js::MethodKind::Getter | js::MethodKind::Setter => {
                self.err(span, "Getters and setters are not supported")
            }
        }
    }

    fn constructor(&self, ctor: &js::Constructor) -> LResult<Rc<FunctionDef>> {
        let mut pats = Vec::with_capacity(ctor.params.len());
        for p in &ctor.params {
            match p {
                js::ParamOrTsParamProp::Param(p) => pats.push(&p.pat),
                js::ParamOrTsParamProp::TsParamProp(p) => {
                    return self.err(p.span, "Parameter properties are only allowed in TypeScript")
                }
            }
        }
        let (params, rest) = self.params(&pats)?;
        let Some(body) = &ctor.body else {
            return self.err(ctor.span, "Constructor implementation is missing");
        };
        Ok(Rc::new(FunctionDef {
            name: Some("constructor".into()),
            params,
            rest,
            body: FunctionBody::Block(self.block(body)?),
            is_arrow: false,
            is_async: false,
            source: self.source(ctor.span),
        }))
    }

    fn class(&self, name: Option<Rc<str>>, c: &js::Class) -> LResult<Rc<ClassDef>> {
        let superclass = self.opt_expr(&c.super_class)?;
        let mut constructor = None;
        let mut members = Vec::new();
        for member in &c.body {
            match member {
                js::ClassMember::Constructor(ctor) => constructor = Some(self.constructor(ctor)?),
                js::ClassMember::Method(m) => {
                    self.method_kind(m.kind, m.span)?;
                    let key = self.prop_key(&m.key)?;
                    let def = self.function(key_name(&key), &m.function, m.span)?;
                    members.push(ClassMember {
                        is_static: m.is_static,
                        key,
                        kind: ClassMemberKind::Method(def),
                    });
                }
                js::ClassMember::PrivateMethod(m) => {
                    self.method_kind(m.kind, m.span)?;
                    let key = private_name(&m.key);
                    let def = self.function(Some(key.clone()), &m.function, m.span)?;
                    members.push(ClassMember {
                        is_static: m.is_static,
                        key: PropKey::Name(key),
                        kind: ClassMemberKind::Method(def),
                    });
                }
                js::ClassMember::ClassProp(p) => members.push(ClassMember {
                    is_static: p.is_static,
                    key: self.prop_key(&p.key)?,
                    kind: ClassMemberKind::Field(self.opt_expr(&p.value)?),
                }),
                js::ClassMember::PrivateProp(p) => members.push(ClassMember {
                    is_static: p.is_static,
                    key: PropKey::Name(private_name(&p.key)),
                    kind: ClassMemberKind::Field(self.opt_expr(&p.value)?),
                }),
                js::ClassMember::StaticBlock(b) => {
                    return self.err(b.span, "Static initialization blocks are not supported")
                }
                js::ClassMember::Empty(_) => {}
                other => return self.err(other.span(), "Unexpected token"),
            }
        }
        Ok(Rc::new(ClassDef {
            name,
            superclass,
            constructor,
            members,
            source: self.source(c.span),
        }))
    }

    fn prop_key(&self, key: &js::PropName) -> LResult<PropKey> {
        Ok(match key {
            js::PropName::Ident(i) => PropKey::Name(name(i)),
            js::PropName::Str(s) => PropKey::Name(text(&s.value)),
            js::PropName::Num(n) => PropKey::Name(number_to_string(n.value).into()),
            js::PropName::Computed(c) => PropKey::Computed(Box::new(self.expr(&c.expr)?)),
            js::PropName::BigInt(b) => return self.err(b.span, "BigInt literals are not supported"),
        })
    }

    // ─── Patterns ─────────────────────────────────────────────────────────

    fn pat(&self, p: &js::Pat) -> LResult<Pattern> {
        Ok(match p {
            js::Pat::Ident(b) => Pattern::Ident(name(&b.id)),
            js::Pat::Array(a) => {
                let mut elems = Vec::with_capacity(a.elems.len());
                let mut rest = None;
                for (i, elem) in a.elems.iter().enumerate() {
                    match elem {
                        Some(js::Pat::Rest(r)) if i + 1 == a.elems.len() => {
                            rest = Some(Box::new(self.pat(&r.arg)?))
                        }
                        Some(js::Pat::Rest(r)) => return self.err(r.span, "Rest element must be last element"),
                        Some(p) => elems.push(Some(self.pat(p)?)),
                        None => elems.push(None),
                    }
                }
                Pattern::Array { elems, rest }
            }
            js::Pat::Object(o) => {
                let mut props = Vec::with_capacity(o.props.len());
                let mut rest = None;
                for prop in &o.props {
                    match prop {
                        js::ObjectPatProp::KeyValue(kv) => props.push(ObjectPatternProp {
                            key: self.prop_key(&kv.key)?,
                            value: self.pat(&kv.value)?,
                        }),
                        js::ObjectPatProp::Assign(a) => {
                            let id = name(&a.key);
                            let value = match &a.value {
                                Some(default) => Pattern::Default(
                                    Box::new(Pattern::Ident(id.clone())),
                                    Box::new(self.expr(default)?),
                                ),
                                None => Pattern::Ident(id.clone()),
                            };
                            props.push(ObjectPatternProp {
                                key: PropKey::Name(id),
                                value,
                            });
                        }
                        js::ObjectPatProp::Rest(r) => rest = Some(Box::new(self.pat(&r.arg)?)),
                    }
                }
                Pattern::Object { props, rest }
            }
            js::Pat::Assign(a) => Pattern::Default(Box::new(self.pat(&a.left)?), Box::new(self.expr(&a.right)?)),
            js::Pat::Rest(r) => return self.err(r.span, "Rest element must be last element"),
            js::Pat::Expr(e) => self.target(e)?,
            js::Pat::Invalid(i) => return self.err(i.span, "Invalid destructuring assignment target"),
        })
    }

    /// An expression used where a pattern is expected.
    fn target(&self, e: &js::Expr) -> LResult<Pattern> {
        match e {
            js::Expr::Ident(i) => Ok(Pattern::Ident(name(i))),
            js::Expr::Member(_) | js::Expr::SuperProp(_) => Ok(Pattern::Member(Box::new(self.expr(e)?))),
            js::Expr::Paren(p) => self.target(&p.expr),
            other => self.err(other.span(), "Invalid left-hand side in assignment"),
        }
    }

    fn assign_target(&self, t: &js::PatOrExpr) -> LResult<Pattern> {
        match t {
            js::PatOrExpr::Pat(p) => self.pat(p),
            js::PatOrExpr::Expr(e) => self.target(e),
        }
    }

    // ─── Expressions ──────────────────────────────────────────────────────

    fn boxed_expr(&self, e: &js::Expr) -> LResult<Box<Expr>> {
        Ok(Box::new(self.expr(e)?))
    }

    fn expr(&self, e: &js::Expr) -> LResult<Expr> {
        Ok(match e {
            js::Expr::This(_) => Expr::This,
            js::Expr::Ident(i) => Expr::Ident(name(i)),
            js::Expr::Lit(l) => self.lit(l)?,
            js::Expr::Tpl(t) => self.template(t)?,
            js::Expr::Paren(p) => self.expr(&p.expr)?,
            js::Expr::Array(a) => Expr::Array(a.elems.iter().map(|el| self.array_elem(el)).collect::<LResult<_>>()?),
            js::Expr::Object(o) => Expr::Object(o.props.iter().map(|p| self.prop(p)).collect::<LResult<_>>()?),
            js::Expr::Fn(f) => Expr::Function(self.function(f.ident.as_ref().map(name), &f.function, f.function.span)?),
            js::Expr::Arrow(a) => Expr::Function(self.arrow(a)?),
            js::Expr::Class(c) => Expr::Class(self.class(c.ident.as_ref().map(name), &c.class)?),
            js::Expr::Unary(u) => Expr::Unary(unary_op(u.op), self.boxed_expr(&u.arg)?),
            js::Expr::Update(u) => Expr::Update {
                increment: u.op == js::UpdateOp::PlusPlus,
                prefix: u.prefix,
                target: self.boxed_expr(&u.arg)?,
            },
            js::Expr::Bin(b) => {
                let (left, right) = (self.boxed_expr(&b.left)?, self.boxed_expr(&b.right)?);
                match binary_op(b.op) {
                    Op::Binary(op) => Expr::Binary(op, left, right),
                    Op::Logical(op) => Expr::Logical(op, left, right),
                }
            }
            js::Expr::Assign(a) => Expr::Assign {
                op: assign_op(a.op),
                target: self.assign_target(&a.left)?,
                value: self.boxed_expr(&a.right)?,
            },
            js::Expr::Cond(c) => Expr::Conditional {
                test: self.boxed_expr(&c.test)?,
                consequent: self.boxed_expr(&c.cons)?,
                alternate: self.boxed_expr(&c.alt)?,
            },
            js::Expr::Member(m) if in_chain(&m.obj) => Expr::OptionalChain(Box::new(self.link(e)?)),
            js::Expr::Member(m) => Expr::Member {
                object: self.boxed_expr(&m.obj)?,
                property: self.member_prop(&m.prop)?,
                optional: false,
            },
            js::Expr::SuperProp(s) => Expr::Member {
                object: Box::new(Expr::Super),
                property: match &s.prop {
                    js::SuperProp::Ident(i) => MemberProp::Name(name(i)),
                    js::SuperProp::Computed(c) => MemberProp::Computed(self.boxed_expr(&c.expr)?),
                },
                optional: false,
            },
            js::Expr::Call(_) if in_chain(e) => Expr::OptionalChain(Box::new(self.link(e)?)),
            js::Expr::Call(c) => Expr::Call {
                callee: Box::new(self.callee(&c.callee)?),
                args: self.args(&c.args)?,
                optional: false,
            },
            js::Expr::OptChain(_) => Expr::OptionalChain(Box::new(self.link(e)?)),
            js::Expr::New(n) => Expr::New {
                callee: self.boxed_expr(&n.callee)?,
                args: match &n.args {
                    Some(args) => self.args(args)?,
                    None => Vec::new(),
                },
            },
            js::Expr::Seq(s) => Expr::Sequence(s.exprs.iter().map(|e| self.expr(e)).collect::<LResult<_>>()?),
            js::Expr::Await(a) => Expr::Await(self.boxed_expr(&a.arg)?),
            js::Expr::TaggedTpl(t) => return self.err(t.span, "Tagged templates are not supported"),
            js::Expr::Yield(y) => return self.err(y.span, "Generator functions are not supported"),
            js::Expr::MetaProp(m) => {
                let message = match m.kind {
                    js::MetaPropKind::NewTarget => "'new.target' is not supported",
                    js::MetaPropKind::ImportMeta => "Cannot use 'import.meta' outside a module",
                };
                return self.err(m.span, message);
            }
            js::Expr::PrivateName(p) => return self.err(p.span, "Private name checks with 'in' are not supported"),
            other => return self.err(other.span(), "Unexpected token"),
        })
    }

    /// One link of an optional chain. Only the outermost link is wrapped
    /// in [`Expr::OptionalChain`].
    fn link(&self, e: &js::Expr) -> LResult<Expr> {
        match e {
            js::Expr::OptChain(o) => match &*o.base {
                js::OptChainBase::Member(m) => Ok(Expr::Member {
                    object: Box::new(self.link(&m.obj)?),
                    property: self.member_prop(&m.prop)?,
                    optional: o.optional,
                }),
                js::OptChainBase::Call(c) => Ok(Expr::Call {
                    callee: Box::new(self.link(&c.callee)?),
                    args: self.args(&c.args)?,
                    optional: o.optional,
                }),
            },
            js::Expr::Member(m) => Ok(Expr::Member {
                object: Box::new(self.link(&m.obj)?),
                property: self.member_prop(&m.prop)?,
                optional: false,
            }),
            js::Expr::Call(c) => match &c.callee {
                js::Callee::Expr(callee) => Ok(Expr::Call {
                    callee: Box::new(self.link(callee)?),
                    args: self.args(&c.args)?,
                    optional: false,
                }),
                other => Ok(Expr::Call {
                    callee: Box::new(self.callee(other)?),
                    args: self.args(&c.args)?,
                    optional: false,
                }),
            },
            other => self.expr(other),
        }
    }

    fn callee(&self, callee: &js::Callee) -> LResult<Expr> {
        match callee {
            js::Callee::Super(_) => Ok(Expr::Super),
            js::Callee::Import(i) => self.err(i.span, "Cannot use import statement outside a module"),
            js::Callee::Expr(e) => self.expr(e),
        }
    }

    fn member_prop(&self, prop: &js::MemberProp) -> LResult<MemberProp> {
        Ok(match prop {
            js::MemberProp::Ident(i) => MemberProp::Name(name(i)),
            js::MemberProp::PrivateName(p) => MemberProp::Name(private_name(p)),
            js::MemberProp::Computed(c) => MemberProp::Computed(self.boxed_expr(&c.expr)?),
        })
    }

    fn args(&self, args: &[js::ExprOrSpread]) -> LResult<Vec<Arg>> {
        args.iter()
            .map(|a| -> LResult<Arg> {
                let value = self.expr(&a.expr)?;
                Ok(if a.spread.is_some() {
                    Arg::Spread(value)
                } else {
                    Arg::Plain(value)
                })
            })
            .collect()
    }

    fn array_elem(&self, elem: &Option<js::ExprOrSpread>) -> LResult<ArrayElem> {
        Ok(match elem {
            None => ArrayElem::Hole,
            Some(a) if a.spread.is_some() => ArrayElem::Spread(self.expr(&a.expr)?),
            Some(a) => ArrayElem::Item(self.expr(&a.expr)?),
        })
    }

    fn prop(&self, prop: &js::PropOrSpread) -> LResult<PropDef> {
        let prop = match prop {
            js::PropOrSpread::Spread(s) => return Ok(PropDef::Spread(self.expr(&s.expr)?)),
            js::PropOrSpread::Prop(p) => p,
        };
        Ok(match &**prop {
            js::Prop::Shorthand(i) => PropDef::Shorthand(name(i)),
            js::Prop::KeyValue(kv) => PropDef::KeyValue(self.prop_key(&kv.key)?, self.expr(&kv.value)?),
            // Only meaningful once the literal is reinterpreted as a pattern.
            js::Prop::Assign(a) => PropDef::KeyValue(
                PropKey::Name(name(&a.key)),
                Expr::Assign {
                    op: AssignOp::Assign,
                    target: Pattern::Ident(name(&a.key)),
                    value: self.boxed_expr(&a.value)?,
                },
            ),
            js::Prop::Getter(g) => return self.err(g.span, "Getters and setters are not supported"),
            js::Prop::Setter(s) => return self.err(s.span, "Getters and setters are not supported"),
            js::Prop::Method(m) => {
                let key = self.prop_key(&m.key)?;
                let def = self.function(key_name(&key), &m.function, m.function.span)?;
                PropDef::Method(key, def)
            }
        })
    }

    fn lit(&self, lit: &js::Lit) -> LResult<Expr> {
        Ok(match lit {
            js::Lit::Str(s) => Expr::Str(text(&s.value)),
            js::Lit::Bool(b) => Expr::Bool(b.value),
            js::Lit::Null(_) => Expr::Null,
            js::Lit::Num(n) => Expr::Number(n.value),
            js::Lit::Regex(r) => Expr::Regex {
                pattern: text(&r.exp),
                flags: text(&r.flags),
            },
            js::Lit::BigInt(b) => return self.err(b.span, "BigInt literals are not supported"),
            js::Lit::JSXText(t) => return self.err(t.span, "JSX is not supported"),
        })
    }

    fn template(&self, t: &js::Tpl) -> LResult<Expr> {
        let mut segments = Vec::with_capacity(t.quasis.len() + t.exprs.len());
        for (i, quasi) in t.quasis.iter().enumerate() {
            let cooked = quasi.cooked.as_ref().unwrap_or(&quasi.raw);
            if !cooked.is_empty() {
                segments.push(TemplateSegment::Text(text(cooked)));
            }
            if let Some(e) = t.exprs.get(i) {
                segments.push(TemplateSegment::Expr(self.expr(e)?));
            }
        }
        Ok(Expr::Template(segments))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(src: &str) -> Program {
        parse(src).unwrap_or_else(|e| panic!("parse failed for {:?}: {}", src, e))
    }

    #[test]
    fn asi_splits_statements_on_newlines() {
        let prog = parse_ok("let a = 1\nlet b = a\nconsole.log(a + b)");
        assert_eq!(prog.len(), 3);
    }

    #[test]
    fn arrow_functions_in_all_shapes() {
        let prog = parse_ok("const f = x => x * 2; const g = (a, b = 1, ...r) => { return a }; const h = async () => 1;");
        assert_eq!(prog.len(), 3);
        match &prog[1] {
            Stmt::Var(_, decls) => match &decls[0].init {
                Some(Expr::Function(def)) => {
                    assert_eq!(def.arity(), 1);
                    assert!(def.rest.is_some());
                }
                other => panic!("unexpected init {:?}", other),
            },
            other => panic!("unexpected stmt {:?}", other),
        }
        match &prog[2] {
            Stmt::Var(_, decls) => match &decls[0].init {
                Some(Expr::Function(def)) => assert!(def.is_arrow && def.is_async),
                other => panic!("unexpected init {:?}", other),
            },
            other => panic!("unexpected stmt {:?}", other),
        }
    }

    #[test]
    fn destructuring_assignment_becomes_pattern() {
        let prog = parse_ok("let a = 1, b = 2;\n[a, b] = [b, a];");
        match &prog[1] {
            Stmt::Expr(Expr::Assign { target: Pattern::Array { elems, .. }, .. }) => {
                assert_eq!(elems.len(), 2)
            }
            other => panic!("unexpected {:?}", other),
        }
        let prog = parse_ok("const { x, y: [first], ...others } = point;");
        match &prog[0] {
            Stmt::Var(VarKind::Const, decls) => match &decls[0].target {
                Pattern::Object { props, rest } => {
                    assert_eq!(props.len(), 2);
                    assert!(rest.is_some());
                }
                other => panic!("unexpected {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn exponent_is_right_associative() {
        let prog = parse_ok("2 ** 3 ** 2");
        match &prog[0] {
            Stmt::Expr(Expr::Binary(BinaryOp::Exp, _, right)) => {
                assert!(matches!(**right, Expr::Binary(BinaryOp::Exp, _, _)))
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn for_of_and_for_in_heads() {
        let prog = parse_ok("for (const [k, v] of entries) {}\nfor (key in obj) {}\nfor (let i = 0; i < 3; i++) {}");
        assert!(matches!(prog[0], Stmt::ForOf { binding: ForBinding::Decl(VarKind::Const, _), .. }));
        assert!(matches!(prog[1], Stmt::ForIn { binding: ForBinding::Assign(Pattern::Ident(_)), .. }));
        assert!(matches!(prog[2], Stmt::For { init: Some(ForInit::Var(VarKind::Let, _)), .. }));
    }

    #[test]
    fn class_with_fields_and_constructor() {
        let prog = parse_ok("class A extends B { static count = 0; #secret = 1; constructor(x) { super(x) } get2() { return this.#secret } }");
        match &prog[0] {
            Stmt::Class(def) => {
                assert!(def.constructor.is_some());
                assert!(def.superclass.is_some());
                assert_eq!(def.members.len(), 3);
                assert!(matches!(&def.members[1].key, PropKey::Name(n) if &**n == "#secret"));
                assert!(def.source.starts_with("class A extends B"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn optional_chain_is_wrapped_once() {
        let prog = parse_ok("a?.b.c()");
        let Stmt::Expr(Expr::OptionalChain(inner)) = &prog[0] else {
            panic!("unexpected {:?}", prog[0]);
        };
        match &**inner {
            Expr::Call { callee, optional: false, .. } => match &**callee {
                Expr::Member { object, optional: false, .. } => {
                    assert!(matches!(**object, Expr::Member { optional: true, .. }))
                }
                other => panic!("unexpected callee {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn numeric_keys_use_the_number_rendering() {
        let prog = parse_ok("({ 1.50: 'a', 0x10: 'b' })");
        match &prog[0] {
            Stmt::Expr(Expr::Object(props)) => {
                assert!(matches!(&props[0], PropDef::KeyValue(PropKey::Name(k), _) if &**k == "1.5"));
                assert!(matches!(&props[1], PropDef::KeyValue(PropKey::Name(k), _) if &**k == "16"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn syntax_errors_carry_positions() {
        let err = parse("let x = 1;\nlet y = ;").unwrap_err();
        assert_eq!(err.line, 2);

        let err = parse("let ok = 1;\nconst z;").unwrap_err();
        assert_eq!(err.message, "Missing initializer in const declaration");
        assert_eq!((err.line, err.column), (2, 7));

        let err = parse("let { a };").unwrap_err();
        assert_eq!(err.message, "Missing initializer in destructuring declaration");

        let err = parse("function f( {").unwrap_err();
        assert_eq!(err.line, 1);
    }

    #[test]
    fn unsupported_constructs_are_reported() {
        assert!(parse("function* g() {}").unwrap_err().message.contains("Generator"));
        assert_eq!(
            parse("import x from 'y'").unwrap_err().message,
            "Cannot use import statement outside a module"
        );
        assert!(parse("outer: for (;;) {}").unwrap_err().message.contains("Labeled"));
        assert!(parse("const o = { get x() { return 1 } };").unwrap_err().message.contains("Getters"));
        assert!(parse("tag`x`").unwrap_err().message.contains("Tagged"));
        let err = parse("class A {\n  static { }\n}").unwrap_err();
        assert_eq!((err.line, err.message.as_str()), (2, "Static initialization blocks are not supported"));
    }

    #[test]
    fn template_expressions_are_parsed() {
        let prog = parse_ok("`sum: ${a + b}!`");
        match &prog[0] {
            Stmt::Expr(Expr::Template(segs)) => assert_eq!(segs.len(), 3),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn function_source_is_the_declaration_text() {
        let prog = parse_ok("// header\nasync function load(id) { return id; }");
        match &prog[0] {
            Stmt::Function(def) => assert_eq!(&*def.source, "async function load(id) { return id; }"),
            other => panic!("unexpected {:?}", other),
        }
    }
}
