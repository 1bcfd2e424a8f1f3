//! `Function.prototype`.

use super::{arg, method};
use crate::script::error::Flow;
use crate::script::interpreter::{function_kind, Interpreter};
use crate::script::value::*;

/// What `Function.prototype.toString` prints for `func`.
pub fn source_text(func: &ObjRef) -> String {
    let native = |name: &str| format!("function {}() {{ [native code] }}", name);
    match function_kind(func) {
        Some(FuncKind::User(uf)) => match &uf.class {
            Some(info) => info.source.to_string(),
            None => uf.def.source.to_string(),
        },
        Some(FuncKind::Native { name, .. }) => native(&name),
        _ => native(""),
    }
}

pub fn init(interp: &mut Interpreter) {
    let proto = interp.realm.function_proto.clone();
    method(interp, &proto, "call", 1, call);
    method(interp, &proto, "apply", 2, apply);
    method(interp, &proto, "bind", 1, bind);
    method(interp, &proto, "toString", 0, to_string);
}

fn call(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    interp.call_function(this, arg(args, 0), args.get(1..).unwrap_or_default())
}

fn apply(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    let list = match arg(args, 1) {
        Value::Undefined | Value::Null => Vec::new(),
        Value::Object(o) if matches!(o.borrow().kind, ObjectKind::Array(_)) => {
            interp.iterate(&Value::Object(o))?
        }
        _ => return Err(interp.type_error("CreateListFromArrayLike called on non-object")),
    };
    interp.call_function(this, arg(args, 0), &list)
}

fn bind(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    let Some(target) = this.as_object().filter(|o| o.borrow().is_callable()).cloned() else {
        return Err(interp.type_error("Bind must be called on a function"));
    };
    let bound_args: Vec<Value> = args.get(1..).map(<[Value]>::to_vec).unwrap_or_default();
    let (name, length) = {
        let t = target.borrow();
        let name = match t.get_own("name") {
            Some(Value::Str(s)) => s.to_string(),
            _ => String::new(),
        };
        let length = match t.get_own("length") {
            Some(Value::Number(n)) => (n - bound_args.len() as f64).max(0.0),
            _ => 0.0,
        };
        (name, length)
    };
    let bound = new_object(
        ObjectKind::Function(FuncKind::Bound {
            target,
            this: arg(args, 0),
            args: bound_args,
        }),
        Some(interp.realm.function_proto.clone()),
    );
    {
        let mut b = bound.borrow_mut();
        b.define_hidden("name", Value::Str(format!("bound {}", name).into()));
        b.define_hidden("length", length.into());
    }
    Ok(bound.into())
}

fn to_string(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> Flow<Value> {
    match this.as_object().filter(|o| o.borrow().is_callable()) {
        Some(f) => Ok(source_text(f).into()),
        None => Err(interp.type_error("Function.prototype.toString requires that 'this' be a Function")),
    }
}

#[cfg(test)]
mod tests {
    use crate::script::builtins::test_support::{eval_logged, run_logs};

    #[test]
    fn call_apply_and_bind_set_this_and_arguments() {
        let out = run_logs(
            "function greet(greeting, mark) { return greeting + ', ' + this.name + mark; }\n\
             const who = { name: 'Ada' };\n\
             console.log(greet.call(who, 'Hi', '!'));\n\
             console.log(greet.apply(who, ['Hey', '?']));\n\
             const bound = greet.bind(who, 'Yo');\n\
             console.log(bound('.'), bound.name, bound.length);",
        );
        assert_eq!(out, vec!["Hi, Ada!", "Hey, Ada?", "Yo, Ada. bound greet 1"]);
    }

    #[test]
    fn to_string_returns_source_text() {
        assert_eq!(eval_logged("(function add(a, b) { return a + b; }).toString()"), "function add(a, b) { return a + b; }");
        assert_eq!(eval_logged("String((x) => x * 2)"), "(x) => x * 2");
        assert_eq!(eval_logged("Math.max.toString()"), "function max() { [native code] }");
    }

    #[test]
    fn bound_constructors_still_construct() {
        let out = run_logs(
            "class Point { constructor(x, y) { this.x = x; this.y = y; } }\n\
             const OnX = Point.bind(null, 5);\n\
             const p = new OnX(7);\n\
             console.log(p.x, p.y, p instanceof Point);",
        );
        assert_eq!(out, vec!["5 7 true"]);
    }
}
