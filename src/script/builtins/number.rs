//! `Number`, `Boolean` and their prototypes.

use super::globals::{parse_float, parse_int};
use super::{arg, constant, constructor, method, Facility};
use crate::script::error::Flow;
use crate::script::format;
use crate::script::interpreter::Interpreter;
use crate::script::value::*;

const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

pub fn init(interp: &mut Interpreter) {
    let proto = interp.realm.number_proto.clone();
    method(interp, &proto, "toFixed", 1, to_fixed);
    method(interp, &proto, "toPrecision", 1, to_precision);
    method(interp, &proto, "toExponential", 1, to_exponential);
    method(interp, &proto, "toString", 1, to_string);
    method(interp, &proto, "toLocaleString", 0, to_locale_string);
    method(interp, &proto, "valueOf", 0, value_of);

    let proto = interp.realm.boolean_proto.clone();
    method(interp, &proto, "toString", 0, bool_to_string);
    method(interp, &proto, "valueOf", 0, bool_value_of);
}

fn this_number(interp: &mut Interpreter, this: &Value, name: &str) -> Flow<f64> {
    match this {
        Value::Number(n) => Ok(*n),
        _ => Err(interp.type_error(format!(
            "Number.prototype.{} requires that 'this' be a Number",
            name
        ))),
    }
}

/// Optional integer argument checked against `range`.
fn digits(
    interp: &mut Interpreter,
    args: &[Value],
    range: std::ops::RangeInclusive<f64>,
    name: &str,
) -> Flow<Option<usize>> {
    let v = arg(args, 0);
    if matches!(v, Value::Undefined) {
        return Ok(None);
    }
    let d = format::to_integer(interp.to_number(&v)?);
    if !range.contains(&d) {
        return Err(interp.range_error(format!(
            "{}() digits argument must be between {} and {}",
            name,
            range.start(),
            range.end()
        )));
    }
    Ok(Some(d as usize))
}

fn to_fixed(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    let x = this_number(interp, this, "toFixed")?;
    let d = digits(interp, args, 0.0..=100.0, "toFixed")?.unwrap_or(0);
    Ok(format::to_fixed(x, d).into())
}

fn to_precision(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    let x = this_number(interp, this, "toPrecision")?;
    match arg(args, 0) {
        Value::Undefined => Ok(format::number_to_string(x).into()),
        _ => {
            let d = digits(interp, args, 1.0..=100.0, "toPrecision")?.unwrap_or(1);
            Ok(format::to_precision(x, d).into())
        }
    }
}

fn to_exponential(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    let x = this_number(interp, this, "toExponential")?;
    let d = digits(interp, args, 0.0..=100.0, "toExponential")?;
    Ok(format::to_exponential(x, d).into())
}

fn to_string(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    let x = this_number(interp, this, "toString")?;
    let radix = match arg(args, 0) {
        Value::Undefined => 10.0,
        v => format::to_integer(interp.to_number(&v)?),
    };
    if !(2.0..=36.0).contains(&radix) {
        return Err(interp.range_error("toString() radix must be between 2 and 36"));
    }
    if radix == 10.0 {
        return Ok(format::number_to_string(x).into());
    }
    Ok(format::number_to_radix(x, radix as u32).into())
}

fn to_locale_string(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> Flow<Value> {
    let x = this_number(interp, this, "toLocaleString")?;
    Ok(format::to_locale_string(x).into())
}

fn value_of(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> Flow<Value> {
    Ok(this_number(interp, this, "valueOf")?.into())
}

// ─── Number ───────────────────────────────────────────────────────────────────

fn number_call(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
    match args.first() {
        None => Ok(Value::Number(0.0)),
        Some(v) => Ok(Value::Number(interp.to_number(v)?)),
    }
}

fn number_construct(interp: &mut Interpreter, _new_target: &Value, args: &[Value]) -> Flow<Value> {
    number_call(interp, &Value::Undefined, args)
}

fn number_arg(args: &[Value]) -> Option<f64> {
    match arg(args, 0) {
        Value::Number(n) => Some(n),
        _ => None,
    }
}

fn is_integer(_interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
    Ok(number_arg(args).map_or(false, |n| n.is_finite() && n.fract() == 0.0).into())
}

fn is_safe_integer(_interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
    Ok(number_arg(args)
        .map_or(false, |n| n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER)
        .into())
}

fn is_finite(_interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
    Ok(number_arg(args).map_or(false, f64::is_finite).into())
}

fn is_nan(_interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
    Ok(number_arg(args).map_or(false, f64::is_nan).into())
}

fn install_number(interp: &mut Interpreter) -> Value {
    let proto = interp.realm.number_proto.clone();
    let ctor = constructor(interp, "Number", 1, number_call, number_construct, &proto);
    method(interp, &ctor, "isInteger", 1, is_integer);
    method(interp, &ctor, "isSafeInteger", 1, is_safe_integer);
    method(interp, &ctor, "isFinite", 1, is_finite);
    method(interp, &ctor, "isNaN", 1, is_nan);
    method(interp, &ctor, "parseFloat", 1, parse_float);
    method(interp, &ctor, "parseInt", 2, parse_int);
    for (name, value) in [
        ("MAX_SAFE_INTEGER", MAX_SAFE_INTEGER),
        ("MIN_SAFE_INTEGER", -MAX_SAFE_INTEGER),
        ("MAX_VALUE", f64::MAX),
        ("MIN_VALUE", 5e-324),
        ("EPSILON", f64::EPSILON),
        ("POSITIVE_INFINITY", f64::INFINITY),
        ("NEGATIVE_INFINITY", f64::NEG_INFINITY),
        ("NaN", f64::NAN),
    ] {
        constant(&ctor, name, value.into());
    }
    ctor.into()
}

inventory::submit! {
    Facility { name: "Number", install: install_number }
}

// ─── Boolean ──────────────────────────────────────────────────────────────────

fn this_bool(interp: &mut Interpreter, this: &Value) -> Flow<bool> {
    match this {
        Value::Bool(b) => Ok(*b),
        _ => Err(interp.type_error("Boolean.prototype.valueOf requires that 'this' be a Boolean")),
    }
}

fn bool_to_string(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> Flow<Value> {
    Ok(Value::str(if this_bool(interp, this)? { "true" } else { "false" }))
}

fn bool_value_of(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> Flow<Value> {
    Ok(this_bool(interp, this)?.into())
}

fn boolean_call(_interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
    Ok(arg(args, 0).truthy().into())
}

fn boolean_construct(interp: &mut Interpreter, _new_target: &Value, args: &[Value]) -> Flow<Value> {
    boolean_call(interp, &Value::Undefined, args)
}

fn install_boolean(interp: &mut Interpreter) -> Value {
    let proto = interp.realm.boolean_proto.clone();
    constructor(interp, "Boolean", 1, boolean_call, boolean_construct, &proto).into()
}

inventory::submit! {
    Facility { name: "Boolean", install: install_boolean }
}

#[cfg(test)]
mod tests {
    use crate::script::builtins::test_support::{eval_logged, run_script};

    #[test]
    fn formatting_methods() {
        assert_eq!(eval_logged("(3.14159).toFixed(2)"), "3.14");
        assert_eq!(eval_logged("(2.5).toFixed(0)"), "3");
        assert_eq!(eval_logged("(1234.5678).toPrecision(6)"), "1234.57");
        assert_eq!(eval_logged("(255).toString(16) + (5).toString(2)"), "ff101");
        assert_eq!(eval_logged("(1234567.891).toLocaleString()"), "1,234,567.891");
        assert_eq!(eval_logged("(12345).toExponential(2)"), "1.23e+4");
    }

    #[test]
    fn out_of_range_digits_throw() {
        let (result, _) = run_script("(1).toFixed(101);");
        assert_eq!(
            result.unwrap_err().to_string(),
            "RangeError: toFixed() digits argument must be between 0 and 100"
        );
        let (result, _) = run_script("(1).toString(1);");
        assert_eq!(result.unwrap_err().to_string(), "RangeError: toString() radix must be between 2 and 36");
    }

    #[test]
    fn statics_and_conversion() {
        assert_eq!(eval_logged("[Number.isInteger(5), Number.isInteger(5.5), Number.isNaN('x'), Number.isSafeInteger(2 ** 53)].join()"), "true,false,false,false");
        assert_eq!(eval_logged("Number('  42 ') + Number('') + Number(true)"), "43");
        assert_eq!(eval_logged("Number('12px')"), "NaN");
        assert_eq!(eval_logged("Number.MAX_SAFE_INTEGER"), "9007199254740991");
        assert_eq!(eval_logged("Number.parseFloat('1.5e3x')"), "1500");
    }

    #[test]
    fn booleans() {
        assert_eq!(eval_logged("[Boolean(''), Boolean('x'), new Boolean(0), true.toString()].join()"), "false,true,false,true");
    }
}
