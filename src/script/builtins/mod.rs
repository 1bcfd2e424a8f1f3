//! Built-in objects.
//!
//! Prototype methods (what `[].map` or `"x".trim` resolve to) are installed
//! into the [`Realm`] when an interpreter is created. Global bindings are
//! separate: each module registers a [`Facility`] through `inventory`, and
//! the embedder decides which facilities a program may see.

pub mod array;
pub mod collections;
pub mod console;
pub mod date;
pub mod errors;
pub mod function;
pub mod globals;
pub mod json;
pub mod math;
pub mod number;
pub mod object;
pub mod promise;
pub mod reflect;
pub mod regexp;
pub mod string;
pub mod timers;

use super::error::Flow;
use super::interpreter::{ErrorKind, Interpreter};
use super::value::*;

/// A global binding a program can be given, e.g. `Math` or `setTimeout`.
pub struct Facility {
    pub name: &'static str,
    pub install: fn(&mut Interpreter) -> Value,
}

inventory::collect!(Facility);

pub fn facilities() -> impl Iterator<Item = &'static Facility> {
    inventory::iter::<Facility>.into_iter()
}

pub fn facility(name: &str) -> Option<&'static Facility> {
    facilities().find(|f| f.name == name)
}

/// Prototype objects shared by every value of a kind.
pub struct Realm {
    pub object_proto: ObjRef,
    pub function_proto: ObjRef,
    pub array_proto: ObjRef,
    pub string_proto: ObjRef,
    pub number_proto: ObjRef,
    pub boolean_proto: ObjRef,
    pub error_proto: ObjRef,
    pub type_error_proto: ObjRef,
    pub range_error_proto: ObjRef,
    pub syntax_error_proto: ObjRef,
    pub reference_error_proto: ObjRef,
    pub promise_proto: ObjRef,
    pub map_proto: ObjRef,
    pub set_proto: ObjRef,
    pub date_proto: ObjRef,
    pub regexp_proto: ObjRef,
}

impl Realm {
    pub fn new() -> Self {
        let object_proto = new_object(ObjectKind::Plain, None);
        let derived = || new_object(ObjectKind::Plain, Some(object_proto.clone()));
        let error_proto = derived();
        let error_subtype = || new_object(ObjectKind::Plain, Some(error_proto.clone()));
        Self {
            function_proto: derived(),
            array_proto: derived(),
            string_proto: derived(),
            number_proto: derived(),
            boolean_proto: derived(),
            type_error_proto: error_subtype(),
            range_error_proto: error_subtype(),
            syntax_error_proto: error_subtype(),
            reference_error_proto: error_subtype(),
            promise_proto: derived(),
            map_proto: derived(),
            set_proto: derived(),
            date_proto: derived(),
            regexp_proto: derived(),
            error_proto,
            object_proto,
        }
    }

    pub fn error_proto_for(&self, kind: ErrorKind) -> ObjRef {
        match kind {
            ErrorKind::Error => self.error_proto.clone(),
            ErrorKind::Type => self.type_error_proto.clone(),
            ErrorKind::Range => self.range_error_proto.clone(),
            ErrorKind::Syntax => self.syntax_error_proto.clone(),
            ErrorKind::Reference => self.reference_error_proto.clone(),
        }
    }
}

pub fn init_prototypes(interp: &mut Interpreter) {
    object::init(interp);
    function::init(interp);
    array::init(interp);
    string::init(interp);
    number::init(interp);
    errors::init(interp);
    promise::init(interp);
    collections::init(interp);
    date::init(interp);
    regexp::init(interp);
}

// ─── Helpers ──────────────────────────────────────────────────────────────────

pub fn arg(args: &[Value], i: usize) -> Value {
    args.get(i).cloned().unwrap_or(Value::Undefined)
}

fn function_object(interp: &Interpreter, kind: FuncKind, name: &str, arity: usize) -> ObjRef {
    let f = new_object(ObjectKind::Function(kind), Some(interp.realm.function_proto.clone()));
    {
        let mut o = f.borrow_mut();
        o.define_hidden("name", Value::str(name));
        o.define_hidden("length", arity.into());
    }
    f
}

pub fn native_fn(interp: &Interpreter, name: &str, arity: usize, f: NativeFn) -> ObjRef {
    function_object(
        interp,
        FuncKind::Native {
            name: name.into(),
            f,
            ctor: None,
        },
        name,
        arity,
    )
}

/// Installs a non-enumerable native method on `target`.
pub fn method(interp: &Interpreter, target: &ObjRef, name: &str, arity: usize, f: NativeFn) {
    let func = native_fn(interp, name, arity, f);
    target.borrow_mut().define_hidden(name, func.into());
}

/// A native constructor wired to `proto` in both directions.
pub fn constructor(
    interp: &Interpreter,
    name: &str,
    arity: usize,
    call: NativeFn,
    construct: NativeFn,
    proto: &ObjRef,
) -> ObjRef {
    let ctor = function_object(
        interp,
        FuncKind::Native {
            name: name.into(),
            f: call,
            ctor: Some(construct),
        },
        name,
        arity,
    );
    ctor.borrow_mut().define_hidden("prototype", proto.clone().into());
    proto.borrow_mut().define_hidden("constructor", ctor.clone().into());
    ctor
}

/// A native function carrying `captured` values.
pub fn closure(interp: &Interpreter, f: ClosureFn, captured: Vec<Value>, arity: usize) -> ObjRef {
    function_object(interp, FuncKind::Closure { f, captured }, "", arity)
}

pub fn constant(target: &ObjRef, name: &str, value: Value) {
    target.borrow_mut().props.insert(
        name.into(),
        Property {
            value,
            enumerable: false,
            writable: false,
        },
    );
}

/// Integer argument with a default, as the relative-index methods take them.
pub fn int_arg(interp: &mut Interpreter, args: &[Value], i: usize, default: f64) -> Flow<f64> {
    match args.get(i) {
        None | Some(Value::Undefined) => Ok(default),
        Some(v) => Ok(super::format::to_integer(interp.to_number(v)?)),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::console::{capture, Severity};
    use crate::script::{on_engine_thread, ExecutionLimits, Interpreter, ScriptError};

    /// Runs `src` with the full namespace and returns what it logged.
    pub fn run_logs(src: &str) -> Vec<String> {
        let (result, records) = run_script(src);
        if let Err(e) = result {
            panic!("script failed: {}\n{}", e, src);
        }
        records.into_iter().map(|(_, m)| m).collect()
    }

    pub fn run_script(src: &str) -> (Result<(), ScriptError>, Vec<(Severity, String)>) {
        let src = src.to_string();
        let (result, records) = capture(move || {
            on_engine_thread(move || {
                let mut interp = Interpreter::new(ExecutionLimits::default());
                crate::sandbox::namespace::install(&mut interp);
                interp.run(&src)
            })
            .expect("engine thread")
        });
        (result, records.into_iter().map(|r| (r.severity, r.message)).collect())
    }

    /// The single line logged by `console.log(<expr>)`.
    pub fn eval_logged(expr: &str) -> String {
        let mut logs = run_logs(&format!("console.log({});", expr));
        assert_eq!(logs.len(), 1, "expected one line for {}", expr);
        logs.remove(0)
    }
}
