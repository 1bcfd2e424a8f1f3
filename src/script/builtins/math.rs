//! The `Math` namespace.

use rand::Rng;

use super::{arg, constant, method, Facility};
use crate::script::error::Flow;
use crate::script::format;
use crate::script::interpreter::Interpreter;
use crate::script::value::*;

macro_rules! unary {
    ($($name:ident => $op:expr,)*) => {
        $(
            fn $name(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
                let x = interp.to_number(&arg(args, 0))?;
                let op: fn(f64) -> f64 = $op;
                Ok(op(x).into())
            }
        )*
    };
}

unary! {
    abs => f64::abs,
    floor => f64::floor,
    ceil => f64::ceil,
    trunc => f64::trunc,
    round => round_half_up,
    sign => sign_of,
    sqrt => f64::sqrt,
    cbrt => f64::cbrt,
    exp => f64::exp,
    expm1 => f64::exp_m1,
    log => f64::ln,
    log2 => f64::log2,
    log10 => f64::log10,
    log1p => f64::ln_1p,
    sin => f64::sin,
    cos => f64::cos,
    tan => f64::tan,
    asin => f64::asin,
    acos => f64::acos,
    atan => f64::atan,
    sinh => f64::sinh,
    cosh => f64::cosh,
    tanh => f64::tanh,
    fround => |x| x as f32 as f64,
}

/// Ties go towards +Infinity, so `-2.5` rounds to `-2`.
fn round_half_up(x: f64) -> f64 {
    let r = x.round();
    if (r - x).abs() == 0.5 {
        x.ceil()
    } else {
        r
    }
}

fn sign_of(x: f64) -> f64 {
    if x.is_nan() || x == 0.0 {
        x
    } else {
        x.signum()
    }
}

fn numbers(interp: &mut Interpreter, args: &[Value]) -> Flow<Vec<f64>> {
    args.iter().map(|v| interp.to_number(v)).collect()
}

fn max(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
    let mut best = f64::NEG_INFINITY;
    for x in numbers(interp, args)? {
        if x.is_nan() {
            return Ok(Value::Number(f64::NAN));
        }
        if x > best || (x == 0.0 && best == 0.0 && best.is_sign_negative()) {
            best = x;
        }
    }
    Ok(best.into())
}

fn min(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
    let mut best = f64::INFINITY;
    for x in numbers(interp, args)? {
        if x.is_nan() {
            return Ok(Value::Number(f64::NAN));
        }
        if x < best || (x == 0.0 && best == 0.0 && x.is_sign_negative()) {
            best = x;
        }
    }
    Ok(best.into())
}

fn pow(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
    let base = interp.to_number(&arg(args, 0))?;
    let exponent = interp.to_number(&arg(args, 1))?;
    Ok(crate::script::ops::power(base, exponent).into())
}

fn atan2(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
    let y = interp.to_number(&arg(args, 0))?;
    let x = interp.to_number(&arg(args, 1))?;
    Ok(y.atan2(x).into())
}

fn hypot(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
    let xs = numbers(interp, args)?;
    if xs.iter().any(|x| x.is_infinite()) {
        return Ok(f64::INFINITY.into());
    }
    Ok(xs.iter().map(|x| x * x).sum::<f64>().sqrt().into())
}

fn clz32(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
    let x = format::to_uint32(interp.to_number(&arg(args, 0))?);
    Ok(f64::from(x.leading_zeros()).into())
}

fn imul(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
    let a = format::to_int32(interp.to_number(&arg(args, 0))?);
    let b = format::to_int32(interp.to_number(&arg(args, 1))?);
    Ok(f64::from(a.wrapping_mul(b)).into())
}

fn random(_interp: &mut Interpreter, _this: &Value, _args: &[Value]) -> Flow<Value> {
    Ok(rand::thread_rng().gen::<f64>().into())
}

fn install(interp: &mut Interpreter) -> Value {
    let math = interp.new_plain();
    let table: &[(&str, usize, NativeFn)] = &[
        ("abs", 1, abs),
        ("floor", 1, floor),
        ("ceil", 1, ceil),
        ("trunc", 1, trunc),
        ("round", 1, round),
        ("sign", 1, sign),
        ("sqrt", 1, sqrt),
        ("cbrt", 1, cbrt),
        ("exp", 1, exp),
        ("expm1", 1, expm1),
        ("log", 1, log),
        ("log2", 1, log2),
        ("log10", 1, log10),
        ("log1p", 1, log1p),
        ("sin", 1, sin),
        ("cos", 1, cos),
        ("tan", 1, tan),
        ("asin", 1, asin),
        ("acos", 1, acos),
        ("atan", 1, atan),
        ("sinh", 1, sinh),
        ("cosh", 1, cosh),
        ("tanh", 1, tanh),
        ("fround", 1, fround),
        ("max", 2, max),
        ("min", 2, min),
        ("pow", 2, pow),
        ("atan2", 2, atan2),
        ("hypot", 2, hypot),
        ("clz32", 1, clz32),
        ("imul", 2, imul),
        ("random", 0, random),
    ];
    for (name, arity, f) in table {
        method(interp, &math, name, *arity, *f);
    }
    use std::f64::consts;
    for (name, value) in [
        ("PI", consts::PI),
        ("E", consts::E),
        ("LN2", consts::LN_2),
        ("LN10", consts::LN_10),
        ("LOG2E", consts::LOG2_E),
        ("LOG10E", consts::LOG10_E),
        ("SQRT2", consts::SQRT_2),
        ("SQRT1_2", consts::FRAC_1_SQRT_2),
    ] {
        constant(&math, name, value.into());
    }
    math.into()
}

inventory::submit! {
    Facility { name: "Math", install }
}

#[cfg(test)]
mod tests {
    use crate::script::builtins::test_support::{eval_logged, run_logs};

    #[test]
    fn rounding() {
        assert_eq!(
            eval_logged("[Math.round(2.5), Math.round(-2.5), Math.round(-2.6), Math.floor(-1.5), Math.trunc(-1.5)].join()"),
            "3,-2,-3,-2,-1"
        );
    }

    #[test]
    fn min_max_edges() {
        assert_eq!(eval_logged("Math.max()"), "-Infinity");
        assert_eq!(eval_logged("Math.min()"), "Infinity");
        assert_eq!(eval_logged("Math.max(1, 'x', 3)"), "NaN");
        assert_eq!(eval_logged("Math.max(...[4, 9, 2]) + Math.min(4, 9, 2)"), "11");
    }

    #[test]
    fn misc_functions() {
        assert_eq!(eval_logged("Math.hypot(3, 4)"), "5");
        assert_eq!(eval_logged("Math.pow(2, 10)"), "1024");
        assert_eq!(eval_logged("Math.sign(-3) + Math.abs(-7)"), "6");
        assert_eq!(eval_logged("Math.clz32(1) + Math.imul(3, 4)"), "43");
        assert_eq!(eval_logged("Math.PI.toFixed(4)"), "3.1416");
    }

    #[test]
    fn random_stays_in_unit_interval() {
        let out = run_logs(
            "let ok = true;\n\
             for (let i = 0; i < 200; i++) { const r = Math.random(); if (r < 0 || r >= 1) ok = false; }\n\
             console.log(ok);",
        );
        assert_eq!(out, vec!["true"]);
    }
}
