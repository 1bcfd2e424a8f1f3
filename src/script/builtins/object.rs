//! `Object` and `Object.prototype`.

use super::{arg, constructor, method, Facility};
use crate::script::error::Flow;
use crate::script::interpreter::Interpreter;
use crate::script::value::*;

pub fn init(interp: &mut Interpreter) {
    let proto = interp.realm.object_proto.clone();
    method(interp, &proto, "hasOwnProperty", 1, has_own_property);
    method(interp, &proto, "isPrototypeOf", 1, is_prototype_of);
    method(interp, &proto, "propertyIsEnumerable", 1, property_is_enumerable);
    method(interp, &proto, "toString", 0, to_string);
    method(interp, &proto, "toLocaleString", 0, to_string);
    method(interp, &proto, "valueOf", 0, value_of);
}

/// Own keys of any value, as `Object.keys` sees them.
fn keys_of(interp: &mut Interpreter, v: &Value, enumerable_only: bool) -> Flow<Vec<std::rc::Rc<str>>> {
    match v {
        Value::Undefined | Value::Null => Err(interp.type_error("Cannot convert undefined or null to object")),
        Value::Str(s) => Ok((0..s.chars().count()).map(|i| i.to_string().into()).collect()),
        Value::Object(o) => Ok(o.borrow().own_keys(enumerable_only)),
        _ => Ok(Vec::new()),
    }
}

fn has_own_property(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    let key = interp.to_property_key(&arg(args, 0))?;
    Ok(match this {
        Value::Object(o) => o.borrow().has_own(&key),
        Value::Str(s) => key.as_ref() == "length" || array_index(&key).map_or(false, |i| i < s.chars().count()),
        _ => false,
    }
    .into())
}

fn is_prototype_of(_interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    let (Some(proto), Some(obj)) = (this.as_object(), arg(args, 0).as_object().cloned()) else {
        return Ok(false.into());
    };
    let mut current = obj.borrow().proto.clone();
    while let Some(p) = current {
        if std::rc::Rc::ptr_eq(&p, proto) {
            return Ok(true.into());
        }
        current = p.borrow().proto.clone();
    }
    Ok(false.into())
}

fn property_is_enumerable(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    let key = interp.to_property_key(&arg(args, 0))?;
    let Some(o) = this.as_object() else {
        return Ok(false.into());
    };
    let o = o.borrow();
    let enumerable = match (&o.kind, array_index(&key)) {
        (ObjectKind::Array(items), Some(i)) => i < items.len(),
        _ => o.props.get(&*key).map_or(false, |p| p.enumerable),
    };
    Ok(enumerable.into())
}

fn to_string(_interp: &mut Interpreter, this: &Value, _args: &[Value]) -> Flow<Value> {
    let tag = match this {
        Value::Undefined => "Undefined",
        Value::Null => "Null",
        Value::Bool(_) => "Boolean",
        Value::Number(_) => "Number",
        Value::Str(_) => "String",
        Value::Object(o) => o.borrow().class_name(),
    };
    Ok(format!("[object {}]", tag).into())
}

fn value_of(_interp: &mut Interpreter, this: &Value, _args: &[Value]) -> Flow<Value> {
    Ok(this.clone())
}

// ─── Constructor ──────────────────────────────────────────────────────────────

fn object_call(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
    match arg(args, 0) {
        v @ Value::Object(_) => Ok(v),
        _ => Ok(interp.new_plain().into()),
    }
}

fn object_construct(interp: &mut Interpreter, _new_target: &Value, args: &[Value]) -> Flow<Value> {
    object_call(interp, &Value::Undefined, args)
}

fn keys(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
    let keys = keys_of(interp, &arg(args, 0), true)?;
    Ok(interp.new_array(keys.into_iter().map(Value::Str).collect()).into())
}

fn values(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
    let target = arg(args, 0);
    let mut out = Vec::new();
    for k in keys_of(interp, &target, true)? {
        out.push(interp.get_value(&target, &k)?);
    }
    Ok(interp.new_array(out).into())
}

fn entries(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
    let target = arg(args, 0);
    let mut out = Vec::new();
    for k in keys_of(interp, &target, true)? {
        let v = interp.get_value(&target, &k)?;
        out.push(interp.new_array(vec![Value::Str(k), v]).into());
    }
    Ok(interp.new_array(out).into())
}

fn assign(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
    let target = arg(args, 0);
    if target.is_nullish() {
        return Err(interp.type_error("Cannot convert undefined or null to object"));
    }
    for source in args.iter().skip(1) {
        let Value::Object(src) = source else {
            continue;
        };
        for (k, v) in interp.own_entries(src) {
            interp.set_value(&target, &k, v)?;
        }
    }
    Ok(target)
}

fn freeze(_interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
    let target = arg(args, 0);
    if let Value::Object(o) = &target {
        o.borrow_mut().freeze();
    }
    Ok(target)
}

fn is_frozen(_interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
    Ok(match arg(args, 0) {
        Value::Object(o) => {
            let o = o.borrow();
            o.frozen || (!o.extensible && o.props.values().all(|p| !p.writable) && !matches!(o.kind, ObjectKind::Array(_)))
        }
        _ => true,
    }
    .into())
}

fn prevent_extensions(_interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
    let target = arg(args, 0);
    if let Value::Object(o) = &target {
        o.borrow_mut().extensible = false;
    }
    Ok(target)
}

fn proto_arg(interp: &mut Interpreter, v: &Value) -> Flow<Option<ObjRef>> {
    match v {
        Value::Null => Ok(None),
        Value::Object(o) => Ok(Some(o.clone())),
        other => {
            let shown = interp.display_lossy(other);
            Err(interp.type_error(format!("Object prototype may only be an Object or null: {}", shown)))
        }
    }
}

fn create(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
    let proto = proto_arg(interp, &arg(args, 0))?;
    let obj = new_object(ObjectKind::Plain, proto);
    if let Value::Object(props) = arg(args, 1) {
        for (k, desc) in interp.own_entries(&props) {
            define(interp, &obj, &k, &desc)?;
        }
    }
    Ok(obj.into())
}

pub(crate) fn get_prototype_of(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
    let proto = match arg(args, 0) {
        Value::Object(o) => o.borrow().proto.clone(),
        Value::Str(_) => Some(interp.realm.string_proto.clone()),
        Value::Number(_) => Some(interp.realm.number_proto.clone()),
        Value::Bool(_) => Some(interp.realm.boolean_proto.clone()),
        _ => return Err(interp.type_error("Cannot convert undefined or null to object")),
    };
    Ok(proto.map_or(Value::Null, Value::Object))
}

fn set_prototype_of(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
    let target = arg(args, 0);
    let proto = proto_arg(interp, &arg(args, 1))?;
    if let Value::Object(o) = &target {
        if let Some(p) = &proto {
            let mut current = Some(p.clone());
            while let Some(c) = current {
                if std::rc::Rc::ptr_eq(&c, o) {
                    return Err(interp.type_error("Cyclic __proto__ value"));
                }
                current = c.borrow().proto.clone();
            }
        }
        o.borrow_mut().proto = proto;
    }
    Ok(target)
}

fn from_entries(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
    let obj = interp.new_plain();
    for entry in interp.iterate(&arg(args, 0))? {
        let k = interp.get_value(&entry, "0")?;
        let key = interp.to_property_key(&k)?;
        let v = interp.get_value(&entry, "1")?;
        obj.borrow_mut().set_own(&key, v);
    }
    Ok(obj.into())
}

pub(crate) fn define(interp: &mut Interpreter, obj: &ObjRef, key: &str, desc: &Value) -> Flow<()> {
    if !matches!(desc, Value::Object(_)) {
        let shown = interp.display_lossy(desc);
        return Err(interp.type_error(format!("Property description must be an object: {}", shown)));
    }
    let get = interp.get_value(desc, "get")?;
    let set = interp.get_value(desc, "set")?;
    if !get.is_nullish() || !set.is_nullish() {
        return Err(interp.type_error("Accessor properties are not supported"));
    }
    let value = interp.get_value(desc, "value")?;
    let enumerable = interp.get_value(desc, "enumerable")?.truthy();
    let writable = interp.get_value(desc, "writable")?.truthy();
    interp.check_array_growth(obj, key, &value)?;

    let mut o = obj.borrow_mut();
    if o.frozen || (!o.extensible && !o.has_own(key)) {
        drop(o);
        return Err(interp.type_error(format!("Cannot define property {}, object is not extensible", key)));
    }
    if let (ObjectKind::Array(_), Some(_)) = (&o.kind, array_index(key)) {
        o.set_own(key, value);
        return Ok(());
    }
    if o.props.get(key).map_or(false, |p| !p.writable) {
        drop(o);
        return Err(interp.type_error(format!("Cannot redefine property: {}", key)));
    }
    o.props.insert(
        key.into(),
        Property {
            value,
            enumerable,
            writable,
        },
    );
    Ok(())
}

fn define_property(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
    let target = arg(args, 0);
    let Value::Object(obj) = &target else {
        return Err(interp.type_error("Object.defineProperty called on non-object"));
    };
    let key = interp.to_property_key(&arg(args, 1))?;
    define(interp, obj, &key, &arg(args, 2))?;
    Ok(target)
}

fn get_own_property_names(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
    let keys = keys_of(interp, &arg(args, 0), false)?;
    Ok(interp.new_array(keys.into_iter().map(Value::Str).collect()).into())
}

fn has_own(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
    has_own_property(interp, &arg(args, 0), args.get(1..).unwrap_or_default())
}

fn is(_interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
    Ok(same_value(&arg(args, 0), &arg(args, 1)).into())
}

fn install(interp: &mut Interpreter) -> Value {
    let proto = interp.realm.object_proto.clone();
    let ctor = constructor(interp, "Object", 1, object_call, object_construct, &proto);
    method(interp, &ctor, "keys", 1, keys);
    method(interp, &ctor, "values", 1, values);
    method(interp, &ctor, "entries", 1, entries);
    method(interp, &ctor, "assign", 2, assign);
    method(interp, &ctor, "freeze", 1, freeze);
    method(interp, &ctor, "isFrozen", 1, is_frozen);
    method(interp, &ctor, "preventExtensions", 1, prevent_extensions);
    method(interp, &ctor, "create", 2, create);
    method(interp, &ctor, "getPrototypeOf", 1, get_prototype_of);
    method(interp, &ctor, "setPrototypeOf", 2, set_prototype_of);
    method(interp, &ctor, "fromEntries", 1, from_entries);
    method(interp, &ctor, "defineProperty", 3, define_property);
    method(interp, &ctor, "getOwnPropertyNames", 1, get_own_property_names);
    method(interp, &ctor, "hasOwn", 2, has_own);
    method(interp, &ctor, "is", 2, is);
    ctor.into()
}

inventory::submit! {
    Facility { name: "Object", install }
}

#[cfg(test)]
mod tests {
    use crate::script::builtins::test_support::{eval_logged, run_logs};

    #[test]
    fn keys_values_entries_follow_enumeration_order() {
        let out = run_logs(
            "const o = { b: 1, 2: 'two', a: 3, 1: 'one' };\n\
             console.log(Object.keys(o).join());\n\
             console.log(Object.values(o).join());\n\
             console.log(Object.entries({ x: 1 })[0].join('='));",
        );
        assert_eq!(out, vec!["1,2,b,a", "one,two,1,3", "x=1"]);
    }

    #[test]
    fn freeze_blocks_writes_silently() {
        let out = run_logs(
            "const o = Object.freeze({ a: 1, list: [1] });\n\
             o.a = 2; o.b = 3; delete o.a;\n\
             o.list.push(2);\n\
             const arr = Object.freeze([1, 2]);\n\
             arr[0] = 9;\n\
             console.log(o.a, o.b, o.list.length, arr[0], Object.isFrozen(o));",
        );
        assert_eq!(out, vec!["1 undefined 2 1 true"]);
    }

    #[test]
    fn create_and_prototype_queries() {
        let out = run_logs(
            "const base = { hello() { return 'hi ' + this.n; } };\n\
             const o = Object.create(base);\n\
             o.n = 4;\n\
             console.log(o.hello(), Object.getPrototypeOf(o) === base, base.isPrototypeOf(o));\n\
             console.log(o.hasOwnProperty('n'), o.hasOwnProperty('hello'), Object.hasOwn(o, 'n'));\n\
             const bare = Object.create(null);\n\
             console.log(Object.getPrototypeOf(bare));",
        );
        assert_eq!(out, vec!["hi 4 true true", "true false true", "null"]);
    }

    #[test]
    fn define_property_defaults_to_hidden_and_read_only() {
        let out = run_logs(
            "const o = {};\n\
             Object.defineProperty(o, 'secret', { value: 42 });\n\
             o.secret = 1;\n\
             console.log(o.secret, Object.keys(o).length, Object.getOwnPropertyNames(o).join());",
        );
        assert_eq!(out, vec!["42 0 secret"]);
    }

    #[test]
    fn assign_from_entries_and_is() {
        assert_eq!(eval_logged("JSON.stringify(Object.assign({ a: 1 }, { b: 2 }, null, { a: 3 }))"), r#"{"a":3,"b":2}"#);
        assert_eq!(eval_logged("Object.fromEntries([['k', 1], ['v', 2]]).v"), "2");
        assert_eq!(eval_logged("[Object.is(NaN, NaN), Object.is(0, -0)].join()"), "true,false");
        assert_eq!(eval_logged("Object.prototype.toString.call([])"), "[object Array]");
    }
}
