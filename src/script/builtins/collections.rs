//! `Map` and `Set`. Both keep insertion order; keys compare with
//! SameValueZero through [`MapKey`].

use indexmap::IndexMap;

use super::{arg, constructor, method, Facility};
use crate::script::error::Flow;
use crate::script::interpreter::Interpreter;
use crate::script::value::*;

pub fn init(interp: &mut Interpreter) {
    let proto = interp.realm.map_proto.clone();
    let table: &[(&str, usize, NativeFn)] = &[
        ("get", 1, map_get),
        ("set", 2, map_set),
        ("has", 1, map_has),
        ("delete", 1, map_delete),
        ("clear", 0, map_clear),
        ("forEach", 1, map_for_each),
        ("keys", 0, map_keys),
        ("values", 0, map_values),
        ("entries", 0, map_entries),
    ];
    for (name, arity, f) in table {
        method(interp, &proto, name, *arity, *f);
    }

    let proto = interp.realm.set_proto.clone();
    let table: &[(&str, usize, NativeFn)] = &[
        ("add", 1, set_add),
        ("has", 1, set_has),
        ("delete", 1, set_delete),
        ("clear", 0, set_clear),
        ("forEach", 1, set_for_each),
        ("keys", 0, set_values),
        ("values", 0, set_values),
        ("entries", 0, set_entries),
    ];
    for (name, arity, f) in table {
        method(interp, &proto, name, *arity, *f);
    }
}

fn incompatible(interp: &mut Interpreter, method: &str) -> crate::script::error::Abort {
    interp.type_error(format!("Method {} called on incompatible receiver", method))
}

fn callback(interp: &mut Interpreter, args: &[Value]) -> Flow<Value> {
    let f = arg(args, 0);
    if !f.is_callable() {
        let shown = interp.display_lossy(&f);
        return Err(interp.type_error(format!("{} is not a function", shown)));
    }
    Ok(f)
}

// ─── Map ──────────────────────────────────────────────────────────────────────

fn this_map(interp: &mut Interpreter, this: &Value, method: &str) -> Flow<ObjRef> {
    match this {
        Value::Object(o) if matches!(o.borrow().kind, ObjectKind::Map(_)) => Ok(o.clone()),
        _ => Err(incompatible(interp, &format!("Map.prototype.{}", method))),
    }
}

fn with_map<R>(map: &ObjRef, f: impl FnOnce(&mut IndexMap<MapKey, (Value, Value)>) -> R) -> R {
    match &mut map.borrow_mut().kind {
        ObjectKind::Map(entries) => f(entries),
        _ => unreachable!("receiver checked by this_map"),
    }
}

fn map_get(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    let map = this_map(interp, this, "get")?;
    let key = MapKey::from_value(&arg(args, 0));
    Ok(with_map(&map, |m| m.get(&key).map(|(_, v)| v.clone())).unwrap_or(Value::Undefined))
}

fn map_set(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    let map = this_map(interp, this, "set")?;
    let mut key = arg(args, 0);
    if matches!(key, Value::Number(n) if n == 0.0) {
        key = Value::Number(0.0);
    }
    let value = arg(args, 1);
    with_map(&map, |m| m.insert(MapKey::from_value(&key), (key, value)));
    Ok(this.clone())
}

fn map_has(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    let map = this_map(interp, this, "has")?;
    let key = MapKey::from_value(&arg(args, 0));
    Ok(with_map(&map, |m| m.contains_key(&key)).into())
}

fn map_delete(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    let map = this_map(interp, this, "delete")?;
    let key = MapKey::from_value(&arg(args, 0));
    Ok(with_map(&map, |m| m.shift_remove(&key).is_some()).into())
}

fn map_clear(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> Flow<Value> {
    let map = this_map(interp, this, "clear")?;
    with_map(&map, |m| m.clear());
    Ok(Value::Undefined)
}

fn map_for_each(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    let map = this_map(interp, this, "forEach")?;
    let f = callback(interp, args)?;
    let this_arg = arg(args, 1);
    let snapshot: Vec<(Value, Value)> = with_map(&map, |m| m.values().cloned().collect());
    for (k, v) in snapshot {
        interp.call_function(&f, this_arg.clone(), &[v, k, this.clone()])?;
    }
    Ok(Value::Undefined)
}

fn map_keys(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> Flow<Value> {
    let map = this_map(interp, this, "keys")?;
    let keys = with_map(&map, |m| m.values().map(|(k, _)| k.clone()).collect());
    Ok(interp.new_array(keys).into())
}

fn map_values(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> Flow<Value> {
    let map = this_map(interp, this, "values")?;
    let values = with_map(&map, |m| m.values().map(|(_, v)| v.clone()).collect());
    Ok(interp.new_array(values).into())
}

fn map_entries(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> Flow<Value> {
    let map = this_map(interp, this, "entries")?;
    let pairs: Vec<(Value, Value)> = with_map(&map, |m| m.values().cloned().collect());
    let entries = pairs
        .into_iter()
        .map(|(k, v)| interp.new_array(vec![k, v]).into())
        .collect();
    Ok(interp.new_array(entries).into())
}

fn map_call(interp: &mut Interpreter, _this: &Value, _args: &[Value]) -> Flow<Value> {
    Err(interp.type_error("Constructor Map requires 'new'"))
}

fn map_construct(interp: &mut Interpreter, _new_target: &Value, args: &[Value]) -> Flow<Value> {
    let map = new_object(ObjectKind::Map(IndexMap::new()), Some(interp.realm.map_proto.clone()));
    let init = arg(args, 0);
    if init.is_nullish() {
        return Ok(map.into());
    }
    let this: Value = map.into();
    for entry in interp.iterate(&init)? {
        if !matches!(entry, Value::Object(_)) {
            let shown = interp.display_lossy(&entry);
            return Err(interp.type_error(format!("Iterator value {} is not an entry object", shown)));
        }
        let k = interp.get_value(&entry, "0")?;
        let v = interp.get_value(&entry, "1")?;
        map_set(interp, &this, &[k, v])?;
    }
    Ok(this)
}

fn install_map(interp: &mut Interpreter) -> Value {
    let proto = interp.realm.map_proto.clone();
    constructor(interp, "Map", 0, map_call, map_construct, &proto).into()
}

inventory::submit! {
    Facility { name: "Map", install: install_map }
}

// ─── Set ──────────────────────────────────────────────────────────────────────

fn this_set(interp: &mut Interpreter, this: &Value, method: &str) -> Flow<ObjRef> {
    match this {
        Value::Object(o) if matches!(o.borrow().kind, ObjectKind::Set(_)) => Ok(o.clone()),
        _ => Err(incompatible(interp, &format!("Set.prototype.{}", method))),
    }
}

fn with_set<R>(set: &ObjRef, f: impl FnOnce(&mut IndexMap<MapKey, Value>) -> R) -> R {
    match &mut set.borrow_mut().kind {
        ObjectKind::Set(items) => f(items),
        _ => unreachable!("receiver checked by this_set"),
    }
}

fn set_add(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    let set = this_set(interp, this, "add")?;
    let mut value = arg(args, 0);
    if matches!(value, Value::Number(n) if n == 0.0) {
        value = Value::Number(0.0);
    }
    with_set(&set, |s| {
        s.entry(MapKey::from_value(&value)).or_insert(value);
    });
    Ok(this.clone())
}

fn set_has(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    let set = this_set(interp, this, "has")?;
    let key = MapKey::from_value(&arg(args, 0));
    Ok(with_set(&set, |s| s.contains_key(&key)).into())
}

fn set_delete(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    let set = this_set(interp, this, "delete")?;
    let key = MapKey::from_value(&arg(args, 0));
    Ok(with_set(&set, |s| s.shift_remove(&key).is_some()).into())
}

fn set_clear(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> Flow<Value> {
    let set = this_set(interp, this, "clear")?;
    with_set(&set, |s| s.clear());
    Ok(Value::Undefined)
}

fn set_for_each(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    let set = this_set(interp, this, "forEach")?;
    let f = callback(interp, args)?;
    let this_arg = arg(args, 1);
    let snapshot: Vec<Value> = with_set(&set, |s| s.values().cloned().collect());
    for v in snapshot {
        interp.call_function(&f, this_arg.clone(), &[v.clone(), v, this.clone()])?;
    }
    Ok(Value::Undefined)
}

fn set_values(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> Flow<Value> {
    let set = this_set(interp, this, "values")?;
    let values = with_set(&set, |s| s.values().cloned().collect());
    Ok(interp.new_array(values).into())
}

fn set_entries(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> Flow<Value> {
    let set = this_set(interp, this, "entries")?;
    let values: Vec<Value> = with_set(&set, |s| s.values().cloned().collect());
    let entries = values
        .into_iter()
        .map(|v| interp.new_array(vec![v.clone(), v]).into())
        .collect();
    Ok(interp.new_array(entries).into())
}

fn set_call(interp: &mut Interpreter, _this: &Value, _args: &[Value]) -> Flow<Value> {
    Err(interp.type_error("Constructor Set requires 'new'"))
}

fn set_construct(interp: &mut Interpreter, _new_target: &Value, args: &[Value]) -> Flow<Value> {
    let set = new_object(ObjectKind::Set(IndexMap::new()), Some(interp.realm.set_proto.clone()));
    let init = arg(args, 0);
    let this: Value = set.into();
    if !init.is_nullish() {
        for v in interp.iterate(&init)? {
            set_add(interp, &this, &[v])?;
        }
    }
    Ok(this)
}

fn install_set(interp: &mut Interpreter) -> Value {
    let proto = interp.realm.set_proto.clone();
    constructor(interp, "Set", 0, set_call, set_construct, &proto).into()
}

inventory::submit! {
    Facility { name: "Set", install: install_set }
}

#[cfg(test)]
mod tests {
    use crate::script::builtins::test_support::{eval_logged, run_logs, run_script};

    #[test]
    fn map_keeps_insertion_order_and_identity() {
        let out = run_logs(
            "const k = {};\n\
             const m = new Map([['a', 1]]);\n\
             m.set(k, 'obj').set(NaN, 'nan').set('a', 2);\n\
             console.log(m.size, m.get('a'), m.get(k), m.get(NaN), m.get({}));\n\
             console.log(m.keys().length, m.has(k), m.delete(k), m.has(k), m.size);",
        );
        assert_eq!(out, vec!["3 2 obj nan undefined", "3 true true false 2"]);
    }

    #[test]
    fn map_iteration() {
        let out = run_logs(
            "const m = new Map([[1, 'one'], [2, 'two']]);\n\
             for (const [k, v] of m) console.log(k, v);\n\
             m.forEach((v, k) => console.log(v + k));\n\
             console.log(JSON.stringify([...m.entries()]));",
        );
        assert_eq!(out, vec!["1 one", "2 two", "one1", "two2", "[[1,\"one\"],[2,\"two\"]]"]);
    }

    #[test]
    fn set_deduplicates() {
        assert_eq!(eval_logged("[...new Set([3, 1, 3, 2, 1])].join()"), "3,1,2");
        assert_eq!(eval_logged("new Set('hello').size"), "4");
        assert_eq!(eval_logged("new Set([0]).has(-0)"), "true");
    }

    #[test]
    fn constructors_require_new() {
        let (result, _) = run_script("Map();");
        assert_eq!(result.unwrap_err().to_string(), "TypeError: Constructor Map requires 'new'");
        let (result, _) = run_script("new Map([1]);");
        assert_eq!(
            result.unwrap_err().to_string(),
            "TypeError: Iterator value 1 is not an entry object"
        );
    }
}
