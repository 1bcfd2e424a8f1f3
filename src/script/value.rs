//! Runtime values and the heap object model.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use super::ast::{Expr, FunctionDef};
use super::error::Flow;
use super::interpreter::Interpreter;
use super::scope::ScopeRef;

pub type ObjRef = Rc<RefCell<Object>>;

/// Built-in function: `(interpreter, this, args)`.
pub type NativeFn = fn(&mut Interpreter, &Value, &[Value]) -> Flow<Value>;

/// Built-in function carrying captured state: `(interpreter, captured, args)`.
pub type ClosureFn = fn(&mut Interpreter, &[Value], &[Value]) -> Flow<Value>;

// ─── Value ────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    Object(ObjRef),
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::Str(s) => write!(f, "{:?}", s),
            // Object graphs may be cyclic.
            Value::Object(_) => write!(f, "[object]"),
        }
    }
}

impl Value {
    pub fn str(s: &str) -> Self {
        Value::Str(s.into())
    }

    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "object",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Object(o) if o.borrow().is_callable() => "function",
            Value::Object(_) => "object",
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::Object(_) => true,
        }
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn as_object(&self) -> Option<&ObjRef> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn is_callable(&self) -> bool {
        self.as_object().map_or(false, |o| o.borrow().is_callable())
    }

    pub fn is_array(&self) -> bool {
        self.as_object()
            .map_or(false, |o| matches!(o.borrow().kind, ObjectKind::Array(_)))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s.into())
    }
}

impl From<ObjRef> for Value {
    fn from(o: ObjRef) -> Self {
        Value::Object(o)
    }
}

pub fn strict_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => x == y,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::Object(x), Value::Object(y)) => Rc::ptr_eq(x, y),
        _ => false,
    }
}

/// Equality used by `includes`, `Map` and `Set`: like `===` but `NaN` equals itself.
pub fn same_value_zero(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) if x.is_nan() && y.is_nan() => true,
        _ => strict_equals(a, b),
    }
}

/// `Object.is`.
pub fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            (x.is_nan() && y.is_nan()) || (x == y && x.is_sign_negative() == y.is_sign_negative())
        }
        _ => strict_equals(a, b),
    }
}

// ─── Heap objects ─────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct Property {
    pub value: Value,
    pub enumerable: bool,
    pub writable: bool,
}

impl Property {
    pub fn data(value: Value) -> Self {
        Self {
            value,
            enumerable: true,
            writable: true,
        }
    }

    pub fn hidden(value: Value) -> Self {
        Self {
            value,
            enumerable: false,
            writable: true,
        }
    }
}

pub struct Object {
    pub kind: ObjectKind,
    pub props: IndexMap<Rc<str>, Property>,
    pub proto: Option<ObjRef>,
    pub extensible: bool,
    /// Set by `Object.freeze`; also covers array elements.
    pub frozen: bool,
}

pub enum ObjectKind {
    Plain,
    Array(Vec<Value>),
    Function(FuncKind),
    Error,
    Promise(PromiseCell),
    Map(IndexMap<MapKey, (Value, Value)>),
    Set(IndexMap<MapKey, Value>),
    Date(f64),
    RegExp(RegExpData),
}

#[derive(Clone)]
pub enum FuncKind {
    User(Rc<UserFunction>),
    Native {
        name: Rc<str>,
        f: NativeFn,
        /// Behaviour under `new`; `None` means not a constructor.
        ctor: Option<NativeFn>,
    },
    Closure {
        f: ClosureFn,
        captured: Vec<Value>,
    },
    Bound {
        target: ObjRef,
        this: Value,
        args: Vec<Value>,
    },
}

pub struct UserFunction {
    pub def: Rc<FunctionDef>,
    pub env: ScopeRef,
    /// Object whose prototype `super.x` reads from (methods only).
    pub home: Option<ObjRef>,
    pub class: Option<Rc<ClassInfo>>,
}

/// Extra state carried by class constructors.
pub struct ClassInfo {
    pub name: Rc<str>,
    pub parent: Option<ObjRef>,
    /// Instance fields, keys already evaluated.
    pub fields: Vec<(Rc<str>, Option<Expr>)>,
    pub env: ScopeRef,
    pub source: Rc<str>,
}

pub enum PromiseState {
    Pending(Vec<Reaction>),
    Fulfilled(Value),
    Rejected(Value),
}

pub struct PromiseCell {
    pub state: PromiseState,
    /// Set once any reaction is attached; unhandled rejections are reported.
    pub handled: bool,
}

#[derive(Clone)]
pub struct Reaction {
    pub on_fulfilled: Option<Value>,
    pub on_rejected: Option<Value>,
    pub derived: Option<ObjRef>,
}

pub struct RegExpData {
    pub source: Rc<str>,
    pub flags: Rc<str>,
    pub regex: regex::Regex,
    pub last_index: usize,
}

impl RegExpData {
    pub fn global(&self) -> bool {
        self.flags.contains('g')
    }

    pub fn sticky(&self) -> bool {
        self.flags.contains('y')
    }
}

/// Hashable identity of a value under SameValueZero, for `Map`/`Set`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum MapKey {
    Undefined,
    Null,
    Bool(bool),
    Number(u64),
    Str(Rc<str>),
    Object(usize),
}

impl MapKey {
    pub fn from_value(v: &Value) -> Self {
        match v {
            Value::Undefined => MapKey::Undefined,
            Value::Null => MapKey::Null,
            Value::Bool(b) => MapKey::Bool(*b),
            Value::Number(n) if n.is_nan() => MapKey::Number(f64::NAN.to_bits()),
            // -0 and +0 are the same key.
            Value::Number(n) if *n == 0.0 => MapKey::Number(0f64.to_bits()),
            Value::Number(n) => MapKey::Number(n.to_bits()),
            Value::Str(s) => MapKey::Str(s.clone()),
            Value::Object(o) => MapKey::Object(Rc::as_ptr(o) as *const u8 as usize),
        }
    }
}

/// Canonical array index for a property key (`"3"` but not `"03"`).
pub fn array_index(key: &str) -> Option<usize> {
    if key.is_empty() || key.len() > 10 || (key.len() > 1 && key.starts_with('0')) {
        return None;
    }
    if !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    key.parse::<u32>().ok().filter(|i| *i != u32::MAX).map(|i| i as usize)
}

impl Object {
    pub fn new(kind: ObjectKind, proto: Option<ObjRef>) -> Self {
        Self {
            kind,
            props: IndexMap::new(),
            proto,
            extensible: true,
            frozen: false,
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self.kind, ObjectKind::Function(_))
    }

    pub fn class_name(&self) -> &'static str {
        match self.kind {
            ObjectKind::Plain => "Object",
            ObjectKind::Array(_) => "Array",
            ObjectKind::Function(_) => "Function",
            ObjectKind::Error => "Error",
            ObjectKind::Promise(_) => "Promise",
            ObjectKind::Map(_) => "Map",
            ObjectKind::Set(_) => "Set",
            ObjectKind::Date(_) => "Date",
            ObjectKind::RegExp(_) => "RegExp",
        }
    }

    pub fn get_own(&self, key: &str) -> Option<Value> {
        if let ObjectKind::Array(items) = &self.kind {
            if key == "length" {
                return Some(Value::Number(items.len() as f64));
            }
            if let Some(i) = array_index(key) {
                return items.get(i).cloned();
            }
        }
        self.props.get(key).map(|p| p.value.clone())
    }

    pub fn has_own(&self, key: &str) -> bool {
        if let ObjectKind::Array(items) = &self.kind {
            if key == "length" {
                return true;
            }
            if let Some(i) = array_index(key) {
                return i < items.len();
            }
        }
        self.props.contains_key(key)
    }

    /// Stores a property, honouring frozen properties and non-extensible
    /// objects. Returns `false` when the write was refused.
    pub fn set_own(&mut self, key: &str, value: Value) -> bool {
        if self.frozen {
            return false;
        }
        if let ObjectKind::Array(items) = &mut self.kind {
            if key == "length" {
                let len = match value {
                    Value::Number(n) if n >= 0.0 && n.fract() == 0.0 && n <= u32::MAX as f64 => n as usize,
                    _ => return false,
                };
                if !self.extensible && len > items.len() {
                    return false;
                }
                items.resize(len, Value::Undefined);
                return true;
            }
            if let Some(i) = array_index(key) {
                if i < items.len() {
                    items[i] = value;
                    return true;
                }
                if !self.extensible {
                    return false;
                }
                items.resize(i, Value::Undefined);
                items.push(value);
                return true;
            }
        }
        match self.props.get_mut(key) {
            Some(prop) if !prop.writable => false,
            Some(prop) => {
                prop.value = value;
                true
            }
            None if !self.extensible => false,
            None => {
                self.props.insert(key.into(), Property::data(value));
                true
            }
        }
    }

    pub fn define_hidden(&mut self, key: &str, value: Value) {
        self.props.insert(key.into(), Property::hidden(value));
    }

    pub fn delete(&mut self, key: &str) -> bool {
        if self.frozen {
            return false;
        }
        if let ObjectKind::Array(items) = &mut self.kind {
            if let Some(i) = array_index(key) {
                if i < items.len() {
                    items[i] = Value::Undefined;
                }
                return true;
            }
        }
        match self.props.get(key) {
            Some(p) if !p.writable && !self.extensible => false,
            Some(_) => {
                self.props.shift_remove(key);
                true
            }
            None => true,
        }
    }

    /// Own property keys in enumeration order: array indices, then
    /// integer-like keys ascending, then the rest in insertion order.
    pub fn own_keys(&self, enumerable_only: bool) -> Vec<Rc<str>> {
        let mut keys: Vec<Rc<str>> = Vec::new();
        if let ObjectKind::Array(items) = &self.kind {
            keys.extend((0..items.len()).map(|i| Rc::from(i.to_string())));
        }
        let mut numeric: Vec<(usize, Rc<str>)> = Vec::new();
        let mut named: Vec<Rc<str>> = Vec::new();
        for (k, p) in &self.props {
            if enumerable_only && !p.enumerable {
                continue;
            }
            match array_index(k) {
                Some(i) => numeric.push((i, k.clone())),
                None => named.push(k.clone()),
            }
        }
        numeric.sort_by_key(|(i, _)| *i);
        keys.extend(numeric.into_iter().map(|(_, k)| k));
        keys.extend(named);
        if !enumerable_only && matches!(self.kind, ObjectKind::Array(_)) {
            keys.push("length".into());
        }
        keys
    }

    pub fn freeze(&mut self) {
        self.extensible = false;
        self.frozen = true;
        for p in self.props.values_mut() {
            p.writable = false;
        }
    }
}

// ─── Heap tracking ────────────────────────────────────────────────────────────

thread_local! {
    static HEAP: RefCell<Heap> = RefCell::new(Heap::default());
}

/// Weak handles to every object allocated on this thread. Script object
/// graphs are full of `Rc` cycles (prototype/constructor pairs, closures
/// stored in their own scope), so they are broken explicitly by
/// [`sweep_heap`] once a run is over.
#[derive(Default)]
struct Heap {
    objects: Vec<Weak<RefCell<Object>>>,
    prune_at: usize,
}

impl Heap {
    fn track(&mut self, obj: &ObjRef) {
        if self.objects.len() >= self.prune_at {
            self.objects.retain(|w| w.strong_count() > 0);
            self.prune_at = (self.objects.len() * 2).max(4096);
        }
        self.objects.push(Rc::downgrade(obj));
    }
}

pub fn new_object(kind: ObjectKind, proto: Option<ObjRef>) -> ObjRef {
    let obj = Rc::new(RefCell::new(Object::new(kind, proto)));
    HEAP.with(|heap| heap.borrow_mut().track(&obj));
    obj
}

/// Empties every live object allocated on this thread, releasing cycles.
/// Only one interpreter may be alive per thread when this runs.
pub fn sweep_heap() {
    let objects = HEAP.with(|heap| std::mem::take(&mut heap.borrow_mut().objects));
    for weak in objects {
        let Some(obj) = weak.upgrade() else {
            continue;
        };
        let (kind, props) = match obj.try_borrow_mut() {
            Ok(mut o) => {
                o.proto = None;
                (
                    std::mem::replace(&mut o.kind, ObjectKind::Plain),
                    std::mem::take(&mut o.props),
                )
            }
            Err(_) => continue,
        };
        drop(kind);
        drop(props);
    }
}

/// Reads a property through the prototype chain.
pub fn lookup(obj: &ObjRef, key: &str) -> Option<Value> {
    let mut current = obj.clone();
    for _ in 0..1024 {
        let next = {
            let o = current.borrow();
            if let Some(v) = o.get_own(key) {
                return Some(v);
            }
            o.proto.clone()
        };
        match next {
            Some(p) => current = p,
            None => return None,
        }
    }
    None
}

pub fn has_property(obj: &ObjRef, key: &str) -> bool {
    let mut current = obj.clone();
    for _ in 0..1024 {
        let next = {
            let o = current.borrow();
            if o.has_own(key) {
                return true;
            }
            o.proto.clone()
        };
        match next {
            Some(p) => current = p,
            None => return false,
        }
    }
    false
}
