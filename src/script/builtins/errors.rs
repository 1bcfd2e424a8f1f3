//! `Error` and its subtypes.

use super::{arg, constructor, method, Facility};
use crate::script::error::Flow;
use crate::script::interpreter::{ErrorKind, Interpreter};
use crate::script::value::*;

const KINDS: [ErrorKind; 5] = [
    ErrorKind::Error,
    ErrorKind::Type,
    ErrorKind::Range,
    ErrorKind::Syntax,
    ErrorKind::Reference,
];

pub fn init(interp: &mut Interpreter) {
    for kind in KINDS {
        let proto = interp.realm.error_proto_for(kind);
        let mut p = proto.borrow_mut();
        p.define_hidden("name", Value::str(kind.name()));
        p.define_hidden("message", Value::str(""));
    }
    let proto = interp.realm.error_proto.clone();
    method(interp, &proto, "toString", 0, to_string);
}

fn to_string(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> Flow<Value> {
    if !matches!(this, Value::Object(_)) {
        return Err(interp.type_error("Error.prototype.toString called on non-object"));
    }
    let name = match interp.get_value(this, "name")? {
        Value::Undefined => "Error".into(),
        v => interp.to_string(&v)?,
    };
    let message = match interp.get_value(this, "message")? {
        Value::Undefined => "".into(),
        v => interp.to_string(&v)?,
    };
    Ok(match (name.is_empty(), message.is_empty()) {
        (_, true) => Value::Str(name),
        (true, false) => Value::Str(message),
        _ => format!("{}: {}", name, message).into(),
    })
}

/// Builds an error of `kind` from constructor arguments `(message, options)`.
fn make(interp: &mut Interpreter, kind: ErrorKind, args: &[Value]) -> Flow<Value> {
    let message = match arg(args, 0) {
        Value::Undefined => None,
        v => Some(interp.to_string(&v)?),
    };
    let error = interp.new_error(kind, message.as_deref().unwrap_or(""));
    if let Value::Object(o) = &error {
        if message.is_none() {
            o.borrow_mut().props.shift_remove("message");
        }
        if let options @ Value::Object(_) = arg(args, 1) {
            let cause = interp.get_value(&options, "cause")?;
            if !matches!(cause, Value::Undefined) {
                o.borrow_mut().define_hidden("cause", cause);
            }
        }
    }
    Ok(error)
}

macro_rules! error_constructor {
    ($call:ident, $construct:ident, $install:ident, $kind:expr, $name:literal) => {
        fn $call(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
            make(interp, $kind, args)
        }

        fn $construct(interp: &mut Interpreter, _new_target: &Value, args: &[Value]) -> Flow<Value> {
            make(interp, $kind, args)
        }

        fn $install(interp: &mut Interpreter) -> Value {
            let proto = interp.realm.error_proto_for($kind);
            constructor(interp, $name, 1, $call, $construct, &proto).into()
        }

        inventory::submit! {
            Facility { name: $name, install: $install }
        }
    };
}

error_constructor!(error_call, error_construct, install_error, ErrorKind::Error, "Error");
error_constructor!(type_call, type_construct, install_type, ErrorKind::Type, "TypeError");
error_constructor!(range_call, range_construct, install_range, ErrorKind::Range, "RangeError");
error_constructor!(syntax_call, syntax_construct, install_syntax, ErrorKind::Syntax, "SyntaxError");
error_constructor!(
    reference_call,
    reference_construct,
    install_reference,
    ErrorKind::Reference,
    "ReferenceError"
);

#[cfg(test)]
mod tests {
    use crate::script::builtins::test_support::{eval_logged, run_logs};

    #[test]
    fn constructors_set_name_and_message() {
        let out = run_logs(
            "const e = new RangeError('too big');\n\
             console.log(e.name, e.message, e instanceof RangeError, e instanceof Error);\n\
             console.log(String(TypeError('called')));\n\
             console.log(new Error().toString());",
        );
        assert_eq!(out, vec!["RangeError too big true true", "TypeError: called", "Error"]);
    }

    #[test]
    fn cause_is_kept() {
        assert_eq!(eval_logged("new Error('outer', { cause: 'inner' }).cause"), "inner");
    }

    #[test]
    fn thrown_engine_errors_are_instances() {
        let out = run_logs(
            "try { null.x; } catch (e) { console.log(e instanceof TypeError, e.constructor === TypeError); }",
        );
        assert_eq!(out, vec!["true true"]);
    }
}
