//! `setTimeout` and friends, scheduled on the interpreter's virtual clock.

use super::{arg, native_fn, Facility};
use crate::script::error::Flow;
use crate::script::interpreter::Interpreter;
use crate::script::value::*;

fn schedule(interp: &mut Interpreter, args: &[Value], repeat: bool) -> Flow<Value> {
    let callback = arg(args, 0);
    if !callback.is_callable() {
        let shown = interp.display_lossy(&callback);
        return Err(interp.type_error(format!(
            "The \"callback\" argument must be of type function. Received {}",
            shown
        )));
    }
    let delay = match arg(args, 1) {
        Value::Undefined => 0.0,
        v => interp.to_number(&v)?,
    };
    let extra = args.get(2..).map(<[Value]>::to_vec).unwrap_or_default();
    let id = interp.add_timer(callback, delay, extra, repeat);
    Ok(Value::Number(id as f64))
}

fn set_timeout(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
    schedule(interp, args, false)
}

fn set_interval(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
    schedule(interp, args, true)
}

fn clear(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
    if let Value::Number(n) = arg(args, 0) {
        if n.is_finite() && n >= 0.0 {
            interp.clear_timer(n as u32);
        }
    }
    Ok(Value::Undefined)
}

fn install_set_timeout(interp: &mut Interpreter) -> Value {
    native_fn(interp, "setTimeout", 2, set_timeout).into()
}

fn install_set_interval(interp: &mut Interpreter) -> Value {
    native_fn(interp, "setInterval", 2, set_interval).into()
}

fn install_clear_timeout(interp: &mut Interpreter) -> Value {
    native_fn(interp, "clearTimeout", 1, clear).into()
}

fn install_clear_interval(interp: &mut Interpreter) -> Value {
    native_fn(interp, "clearInterval", 1, clear).into()
}

inventory::submit! {
    Facility { name: "setTimeout", install: install_set_timeout }
}

inventory::submit! {
    Facility { name: "setInterval", install: install_set_interval }
}

inventory::submit! {
    Facility { name: "clearTimeout", install: install_clear_timeout }
}

inventory::submit! {
    Facility { name: "clearInterval", install: install_clear_interval }
}

#[cfg(test)]
mod tests {
    use crate::script::builtins::test_support::{run_logs, run_script};

    #[test]
    fn timeouts_fire_in_due_order_with_extra_arguments() {
        let out = run_logs(
            "setTimeout((a, b) => console.log('second', a + b), 20, 1, 2);\n\
             setTimeout(() => console.log('first'), 5);\n\
             setTimeout(() => console.log('zero'));",
        );
        assert_eq!(out, vec!["zero", "first", "second 3"]);
    }

    #[test]
    fn cleared_timeouts_never_fire() {
        let out = run_logs(
            "const id = setTimeout(() => console.log('nope'), 10);\n\
             clearTimeout(id);\n\
             clearTimeout(undefined);\n\
             setTimeout(() => console.log('done'), 20);",
        );
        assert_eq!(out, vec!["done"]);
    }

    #[test]
    fn date_now_follows_the_virtual_clock() {
        let out = run_logs(
            "const start = Date.now();\n\
             setTimeout(() => console.log(Date.now() - start >= 250), 250);",
        );
        assert_eq!(out, vec!["true"]);
    }

    #[test]
    fn timers_beyond_the_horizon_are_dropped() {
        let (result, records) = run_script(
            "setTimeout(() => console.log('far future'), 60 * 60 * 1000);\n\
             console.log('now');",
        );
        assert!(result.is_ok());
        let messages: Vec<_> = records.into_iter().map(|(_, m)| m).collect();
        assert_eq!(messages, vec!["now"]);
    }

    #[test]
    fn non_function_callbacks_are_rejected() {
        let (result, _) = run_script("setTimeout('console.log(1)', 10);");
        assert!(result.unwrap_err().to_string().starts_with("TypeError: The \"callback\" argument"));
    }
}
