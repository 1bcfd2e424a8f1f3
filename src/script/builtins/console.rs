//! The `console` object. Every call is rendered to a single line and sent
//! to the matching process channel in [`crate::console`].

use super::json::{format_json, to_json, Cycles};
use super::{arg, closure, method, Facility};
use crate::console::{emit, Severity};
use crate::script::error::Flow;
use crate::script::interpreter::Interpreter;
use crate::script::value::*;

/// Renders console arguments the way the output panel shows them:
/// strings verbatim, other primitives in their string form, errors as
/// `Name: message`, functions as source, everything else as indented JSON.
pub fn render_args(interp: &mut Interpreter, args: &[Value]) -> Flow<String> {
    let mut parts = Vec::with_capacity(args.len());
    for v in args {
        parts.push(render_value(interp, v)?);
    }
    Ok(parts.join(" "))
}

pub fn render_value(interp: &mut Interpreter, v: &Value) -> Flow<String> {
    let Value::Object(o) = v else {
        return Ok(interp.to_string(v)?.to_string());
    };
    let (callable, is_error) = {
        let obj = o.borrow();
        (obj.is_callable(), matches!(obj.kind, ObjectKind::Error))
    };
    if callable {
        return Ok(super::function::source_text(o));
    }
    if is_error {
        return Ok(interp.describe_thrown(v));
    }
    Ok(match to_json(interp, v, Cycles::Mark)? {
        Some(json) => format_json(&json, "  "),
        None => "undefined".to_string(),
    })
}

fn write(interp: &mut Interpreter, severity: Severity, args: &[Value]) -> Flow<Value> {
    let line = render_args(interp, args)?;
    emit(severity, line);
    Ok(Value::Undefined)
}

fn log(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
    write(interp, Severity::Log, args)
}

fn info(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
    write(interp, Severity::Info, args)
}

fn warn(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
    write(interp, Severity::Warn, args)
}

fn error(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
    write(interp, Severity::Error, args)
}

fn assert(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
    if arg(args, 0).truthy() {
        return Ok(Value::Undefined);
    }
    let rest = args.get(1..).unwrap_or_default();
    let line = if rest.is_empty() {
        "Assertion failed".to_string()
    } else {
        format!("Assertion failed: {}", render_args(interp, rest)?)
    };
    emit(Severity::Error, line);
    Ok(Value::Undefined)
}

/// `console.count(label)`; the counters object is captured at slot 0.
fn count(interp: &mut Interpreter, captured: &[Value], args: &[Value]) -> Flow<Value> {
    let label = label(interp, args)?;
    let counters = arg(captured, 0);
    let next = match interp.get_value(&counters, &label)? {
        Value::Number(n) => n + 1.0,
        _ => 1.0,
    };
    interp.set_value(&counters, &label, next.into())?;
    emit(Severity::Log, format!("{}: {}", label, next));
    Ok(Value::Undefined)
}

fn count_reset(interp: &mut Interpreter, captured: &[Value], args: &[Value]) -> Flow<Value> {
    let label = label(interp, args)?;
    interp.set_value(&arg(captured, 0), &label, Value::Number(0.0))?;
    Ok(Value::Undefined)
}

fn label(interp: &mut Interpreter, args: &[Value]) -> Flow<String> {
    Ok(match arg(args, 0) {
        Value::Undefined => "default".to_string(),
        v => interp.to_string(&v)?.to_string(),
    })
}

fn install(interp: &mut Interpreter) -> Value {
    let console = interp.new_plain();
    method(interp, &console, "log", 0, log);
    method(interp, &console, "info", 0, info);
    method(interp, &console, "warn", 0, warn);
    method(interp, &console, "error", 0, error);
    method(interp, &console, "debug", 0, log);
    method(interp, &console, "dir", 0, log);
    method(interp, &console, "assert", 0, assert);

    let counters: Value = interp.new_plain().into();
    let count = closure(interp, count, vec![counters.clone()], 0);
    let reset = closure(interp, count_reset, vec![counters], 0);
    {
        let mut c = console.borrow_mut();
        c.define_hidden("count", count.into());
        c.define_hidden("countReset", reset.into());
    }
    console.into()
}

inventory::submit! {
    Facility { name: "console", install }
}

#[cfg(test)]
mod tests {
    use crate::console::Severity;
    use crate::script::builtins::test_support::{eval_logged, run_script};

    #[test]
    fn arguments_are_joined_with_spaces() {
        assert_eq!(eval_logged("'a', 1, true, null, undefined"), "a 1 true null undefined");
    }

    #[test]
    fn objects_render_as_indented_json() {
        assert_eq!(eval_logged("{ a: 1, b: [1, 2] }"), "{\n  \"a\": 1,\n  \"b\": [\n    1,\n    2\n  ]\n}");
        assert_eq!(eval_logged("[]"), "[]");
        assert_eq!(eval_logged("'x', { k: 'v' }"), "x {\n  \"k\": \"v\"\n}");
    }

    #[test]
    fn special_objects() {
        assert_eq!(eval_logged("new Error('bad thing')"), "Error: bad thing");
        assert_eq!(eval_logged("function f(x) { return x; }"), "function f(x) { return x; }");
        assert_eq!(eval_logged("new Map([[1, 2]])"), "{}");
        let out = crate::script::builtins::test_support::run_logs("const o = { name: 'o' }; o.me = o; console.log(o);");
        assert_eq!(out, vec!["{\n  \"name\": \"o\",\n  \"me\": \"[Circular]\"\n}"]);
    }

    #[test]
    fn severities_follow_the_method() {
        let (result, records) = run_script(
            "console.log('l'); console.info('i'); console.warn('w'); console.error('e'); console.debug('d');",
        );
        assert!(result.is_ok());
        let severities: Vec<Severity> = records.iter().map(|(s, _)| *s).collect();
        assert_eq!(
            severities,
            vec![Severity::Log, Severity::Info, Severity::Warn, Severity::Error, Severity::Log]
        );
    }

    #[test]
    fn assert_and_count() {
        let (_, records) = run_script(
            "console.assert(1 === 1, 'fine');\n\
             console.assert(false, 'x is', 3);\n\
             console.count(); console.count(); console.count('tag');\n\
             console.countReset(); console.count();",
        );
        let messages: Vec<_> = records.into_iter().map(|(_, m)| m).collect();
        assert_eq!(
            messages,
            vec!["Assertion failed: x is 3", "default: 1", "default: 2", "tag: 1", "default: 1"]
        );
    }
}
