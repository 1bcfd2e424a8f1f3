//! Free functions: `parseInt`, `parseFloat`, `isNaN`, `isFinite`.

use super::{arg, native_fn, Facility};
use crate::script::error::Flow;
use crate::script::format;
use crate::script::interpreter::Interpreter;
use crate::script::value::*;

pub(crate) fn parse_int(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
    let text = interp.to_string(&arg(args, 0))?;
    let radix = match arg(args, 1) {
        Value::Undefined => None,
        v => match format::to_int32(interp.to_number(&v)?) {
            0 => None,
            r => Some(r as u32),
        },
    };
    Ok(format::parse_int(&text, radix).into())
}

pub(crate) fn parse_float(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
    let text = interp.to_string(&arg(args, 0))?;
    Ok(format::parse_float(&text).into())
}

fn is_nan(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
    Ok(interp.to_number(&arg(args, 0))?.is_nan().into())
}

fn is_finite(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
    Ok(interp.to_number(&arg(args, 0))?.is_finite().into())
}

fn install_parse_int(interp: &mut Interpreter) -> Value {
    native_fn(interp, "parseInt", 2, parse_int).into()
}

fn install_parse_float(interp: &mut Interpreter) -> Value {
    native_fn(interp, "parseFloat", 1, parse_float).into()
}

fn install_is_nan(interp: &mut Interpreter) -> Value {
    native_fn(interp, "isNaN", 1, is_nan).into()
}

fn install_is_finite(interp: &mut Interpreter) -> Value {
    native_fn(interp, "isFinite", 1, is_finite).into()
}

inventory::submit! {
    Facility { name: "parseInt", install: install_parse_int }
}

inventory::submit! {
    Facility { name: "parseFloat", install: install_parse_float }
}

inventory::submit! {
    Facility { name: "isNaN", install: install_is_nan }
}

inventory::submit! {
    Facility { name: "isFinite", install: install_is_finite }
}

#[cfg(test)]
mod tests {
    use crate::script::builtins::test_support::eval_logged;

    #[test]
    fn parsing_functions() {
        assert_eq!(eval_logged("parseInt('42px')"), "42");
        assert_eq!(eval_logged("parseInt('ff', 16)"), "255");
        assert_eq!(eval_logged("parseInt('0x1A')"), "26");
        assert_eq!(eval_logged("parseInt('abc')"), "NaN");
        assert_eq!(eval_logged("parseFloat('3.14 is pi')"), "3.14");
        assert_eq!(eval_logged("parseFloat('.5e1')"), "5");
    }

    #[test]
    fn numeric_predicates_coerce() {
        assert_eq!(eval_logged("[isNaN('x'), isNaN('12'), isFinite('1e3'), isFinite(Infinity)].join()"), "true,false,true,false");
    }
}
