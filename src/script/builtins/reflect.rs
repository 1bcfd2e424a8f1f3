//! The `Reflect` namespace. Each function is the boolean-returning
//! counterpart of an object operation.

use super::object::{define, get_prototype_of};
use super::{arg, method, Facility};
use crate::script::error::Flow;
use crate::script::interpreter::Interpreter;
use crate::script::value::*;

fn target(interp: &mut Interpreter, args: &[Value], name: &str) -> Flow<ObjRef> {
    match arg(args, 0) {
        Value::Object(o) => Ok(o),
        _ => Err(interp.type_error(format!("Reflect.{} called on non-object", name))),
    }
}

fn key(interp: &mut Interpreter, args: &[Value]) -> Flow<std::rc::Rc<str>> {
    interp.to_property_key(&arg(args, 1))
}

fn own_keys(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
    let obj = target(interp, args, "ownKeys")?;
    let keys = obj.borrow().own_keys(false);
    Ok(interp.new_array(keys.into_iter().map(Value::Str).collect()).into())
}

fn has(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
    let obj = target(interp, args, "has")?;
    let key = key(interp, args)?;
    Ok(has_property(&obj, &key).into())
}

fn get(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
    let obj = target(interp, args, "get")?;
    let key = key(interp, args)?;
    interp.get_value(&obj.into(), &key)
}

fn set(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
    let obj = target(interp, args, "set")?;
    let key = key(interp, args)?;
    let value = arg(args, 2);
    interp.check_array_growth(&obj, &key, &value)?;
    let written = obj.borrow_mut().set_own(&key, value);
    Ok(written.into())
}

fn delete_property(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
    let obj = target(interp, args, "deleteProperty")?;
    let key = key(interp, args)?;
    let deleted = obj.borrow_mut().delete(&key);
    Ok(deleted.into())
}

fn define_property(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
    let obj = target(interp, args, "defineProperty")?;
    let key = key(interp, args)?;
    if obj.borrow().frozen || (!obj.borrow().extensible && !obj.borrow().has_own(&key)) {
        return Ok(false.into());
    }
    define(interp, &obj, &key, &arg(args, 2))?;
    Ok(true.into())
}

fn reflect_get_prototype_of(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    target(interp, args, "getPrototypeOf")?;
    get_prototype_of(interp, this, args)
}

fn set_prototype_of(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
    let obj = target(interp, args, "setPrototypeOf")?;
    let proto = match arg(args, 1) {
        Value::Null => None,
        Value::Object(p) => Some(p),
        _ => return Err(interp.type_error("Object prototype may only be an Object or null")),
    };
    let mut current = proto.clone();
    while let Some(c) = current {
        if std::rc::Rc::ptr_eq(&c, &obj) {
            return Ok(false.into());
        }
        current = c.borrow().proto.clone();
    }
    if !obj.borrow().extensible {
        return Ok(false.into());
    }
    obj.borrow_mut().proto = proto;
    Ok(true.into())
}

fn is_extensible(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
    let obj = target(interp, args, "isExtensible")?;
    let extensible = obj.borrow().extensible;
    Ok(extensible.into())
}

fn prevent_extensions(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
    let obj = target(interp, args, "preventExtensions")?;
    obj.borrow_mut().extensible = false;
    Ok(true.into())
}

fn argument_list(interp: &mut Interpreter, v: &Value) -> Flow<Vec<Value>> {
    match v {
        Value::Object(_) => interp.iterate(v),
        _ => Err(interp.type_error("CreateListFromArrayLike called on non-object")),
    }
}

fn apply(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
    let f = arg(args, 0);
    let items = argument_list(interp, &arg(args, 2))?;
    interp.call_function(&f, arg(args, 1), &items)
}

fn construct(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
    let ctor = match arg(args, 0) {
        Value::Object(o) if interp.is_constructor(&o) => o,
        other => {
            let shown = interp.display_lossy(&other);
            return Err(interp.type_error(format!("{} is not a constructor", shown)));
        }
    };
    let items = argument_list(interp, &arg(args, 1))?;
    let new_target = match arg(args, 2) {
        Value::Undefined => ctor.clone(),
        Value::Object(o) if interp.is_constructor(&o) => o,
        other => {
            let shown = interp.display_lossy(&other);
            return Err(interp.type_error(format!("{} is not a constructor", shown)));
        }
    };
    interp.construct(&ctor, &items, &new_target)
}

fn install(interp: &mut Interpreter) -> Value {
    let reflect = interp.new_plain();
    let table: &[(&str, usize, NativeFn)] = &[
        ("ownKeys", 1, own_keys),
        ("has", 2, has),
        ("get", 2, get),
        ("set", 3, set),
        ("deleteProperty", 2, delete_property),
        ("defineProperty", 3, define_property),
        ("getPrototypeOf", 1, reflect_get_prototype_of),
        ("setPrototypeOf", 2, set_prototype_of),
        ("isExtensible", 1, is_extensible),
        ("preventExtensions", 1, prevent_extensions),
        ("apply", 3, apply),
        ("construct", 2, construct),
    ];
    for (name, arity, f) in table {
        method(interp, &reflect, name, *arity, *f);
    }
    reflect.into()
}

inventory::submit! {
    Facility { name: "Reflect", install }
}

#[cfg(test)]
mod tests {
    use crate::script::builtins::test_support::{eval_logged, run_script};

    #[test]
    fn property_operations() {
        assert_eq!(
            eval_logged("(() => { const o = { a: 1 }; Reflect.set(o, 'b', 2); return [Reflect.has(o, 'b'), Reflect.get(o, 'a'), Reflect.ownKeys(o).join('|')].join(); })()"),
            "true,1,a|b"
        );
        assert_eq!(
            eval_logged("(() => { const o = Object.freeze({ a: 1 }); return [Reflect.set(o, 'a', 2), Reflect.deleteProperty(o, 'a'), o.a].join(); })()"),
            "false,false,1"
        );
        assert_eq!(eval_logged("Reflect.has({}, 'toString')"), "true");
    }

    #[test]
    fn apply_and_construct() {
        assert_eq!(eval_logged("Reflect.apply(Math.max, null, [1, 5, 3])"), "5");
        assert_eq!(
            eval_logged("(() => { class P { constructor(x) { this.x = x; } } return Reflect.construct(P, [7]).x; })()"),
            "7"
        );
    }

    #[test]
    fn non_object_targets_throw() {
        let (result, _) = run_script("Reflect.ownKeys(1);");
        assert_eq!(result.unwrap_err().to_string(), "TypeError: Reflect.ownKeys called on non-object");
    }
}
