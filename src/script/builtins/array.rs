//! `Array` and `Array.prototype`.

use std::cmp::Ordering;

use super::{arg, constructor, int_arg, method, Facility};
use crate::script::error::Flow;
use crate::script::format::relative_index;
use crate::script::interpreter::Interpreter;
use crate::script::value::*;

pub fn init(interp: &mut Interpreter) {
    let proto = interp.realm.array_proto.clone();
    let methods: &[(&str, usize, NativeFn)] = &[
        ("push", 1, push),
        ("pop", 0, pop),
        ("shift", 0, shift),
        ("unshift", 1, unshift),
        ("slice", 2, slice),
        ("splice", 2, splice),
        ("concat", 1, concat),
        ("join", 1, join),
        ("reverse", 0, reverse),
        ("indexOf", 1, index_of),
        ("lastIndexOf", 1, last_index_of),
        ("includes", 1, includes),
        ("find", 1, find),
        ("findIndex", 1, find_index),
        ("findLast", 1, find_last),
        ("findLastIndex", 1, find_last_index),
        ("filter", 1, filter),
        ("map", 1, map),
        ("forEach", 1, for_each),
        ("reduce", 1, reduce),
        ("reduceRight", 1, reduce_right),
        ("some", 1, some),
        ("every", 1, every),
        ("sort", 1, sort),
        ("flat", 0, flat),
        ("flatMap", 1, flat_map),
        ("fill", 1, fill),
        ("at", 1, at),
        ("keys", 0, keys),
        ("values", 0, values),
        ("entries", 0, entries),
        ("toString", 0, to_string),
    ];
    for (name, arity, f) in methods {
        method(interp, &proto, name, *arity, *f);
    }
}

// ─── Helpers ──────────────────────────────────────────────────────────────────

fn this_array(interp: &mut Interpreter, this: &Value, name: &str) -> Flow<ObjRef> {
    match this {
        Value::Object(o) if matches!(o.borrow().kind, ObjectKind::Array(_)) => Ok(o.clone()),
        _ => Err(interp.type_error(format!("Array.prototype.{} called on a non-array", name))),
    }
}

/// Like [`this_array`], but refuses frozen arrays.
fn this_mutable(interp: &mut Interpreter, this: &Value, name: &str) -> Flow<ObjRef> {
    let arr = this_array(interp, this, name)?;
    if arr.borrow().frozen {
        return Err(interp.type_error("Cannot add property 0, object is not extensible"));
    }
    Ok(arr)
}

fn items(arr: &ObjRef) -> Vec<Value> {
    match &arr.borrow().kind {
        ObjectKind::Array(items) => items.clone(),
        _ => Vec::new(),
    }
}

fn len(arr: &ObjRef) -> usize {
    match &arr.borrow().kind {
        ObjectKind::Array(items) => items.len(),
        _ => 0,
    }
}

fn get(arr: &ObjRef, i: usize) -> Option<Value> {
    match &arr.borrow().kind {
        ObjectKind::Array(items) => items.get(i).cloned(),
        _ => None,
    }
}

fn with_items<R>(arr: &ObjRef, f: impl FnOnce(&mut Vec<Value>) -> R) -> R {
    let mut obj = arr.borrow_mut();
    match &mut obj.kind {
        ObjectKind::Array(items) => f(items),
        _ => f(&mut Vec::new()),
    }
}

fn callback(interp: &mut Interpreter, args: &[Value], name: &str) -> Flow<Value> {
    let f = arg(args, 0);
    if !f.is_callable() {
        let shown = interp.display_lossy(&f);
        return Err(interp.type_error(format!("{} is not a function (in Array.prototype.{})", shown, name)));
    }
    Ok(f)
}

/// Calls `f(element, index, array)` for each live element.
fn visit(
    interp: &mut Interpreter,
    this: &Value,
    args: &[Value],
    name: &str,
    mut each: impl FnMut(&mut Interpreter, usize, Value, Value) -> Flow<bool>,
) -> Flow<()> {
    let arr = this_array(interp, this, name)?;
    let f = callback(interp, args, name)?;
    let this_arg = arg(args, 1);
    let n = len(&arr);
    for i in 0..n {
        let Some(v) = get(&arr, i) else {
            break;
        };
        let result = interp.call_function(&f, this_arg.clone(), &[v.clone(), i.into(), this.clone()])?;
        if !each(interp, i, v, result)? {
            break;
        }
    }
    Ok(())
}

fn visit_reverse(
    interp: &mut Interpreter,
    this: &Value,
    args: &[Value],
    name: &str,
) -> Flow<Option<(usize, Value)>> {
    let arr = this_array(interp, this, name)?;
    let f = callback(interp, args, name)?;
    let this_arg = arg(args, 1);
    for i in (0..len(&arr)).rev() {
        let v = get(&arr, i).unwrap_or(Value::Undefined);
        let hit = interp.call_function(&f, this_arg.clone(), &[v.clone(), i.into(), this.clone()])?;
        if hit.truthy() {
            return Ok(Some((i, v)));
        }
    }
    Ok(None)
}

// ─── Mutators ─────────────────────────────────────────────────────────────────

fn push(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    let arr = this_mutable(interp, this, "push")?;
    interp.array_length((len(&arr) + args.len()) as f64)?;
    let n = with_items(&arr, |items| {
        items.extend_from_slice(args);
        items.len()
    });
    Ok(n.into())
}

fn pop(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> Flow<Value> {
    let arr = this_mutable(interp, this, "pop")?;
    Ok(with_items(&arr, |items| items.pop()).unwrap_or(Value::Undefined))
}

fn shift(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> Flow<Value> {
    let arr = this_mutable(interp, this, "shift")?;
    Ok(with_items(&arr, |items| (!items.is_empty()).then(|| items.remove(0))).unwrap_or(Value::Undefined))
}

fn unshift(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    let arr = this_mutable(interp, this, "unshift")?;
    let n = with_items(&arr, |items| {
        items.splice(0..0, args.iter().cloned());
        items.len()
    });
    Ok(n.into())
}

fn splice(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    let arr = this_mutable(interp, this, "splice")?;
    let n = len(&arr);
    let start = relative_index(int_arg(interp, args, 0, 0.0)?, n);
    let delete = match args.len() {
        0 => 0,
        1 => n - start,
        _ => (int_arg(interp, args, 1, 0.0)?.max(0.0) as usize).min(n - start),
    };
    let inserted = args.get(2..).unwrap_or_default().to_vec();
    let removed: Vec<Value> = with_items(&arr, |items| items.splice(start..start + delete, inserted).collect());
    Ok(interp.new_array(removed).into())
}

fn reverse(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> Flow<Value> {
    let arr = this_mutable(interp, this, "reverse")?;
    with_items(&arr, |items| items.reverse());
    Ok(this.clone())
}

fn fill(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    let arr = this_mutable(interp, this, "fill")?;
    let n = len(&arr);
    let start = relative_index(int_arg(interp, args, 1, 0.0)?, n);
    let end = relative_index(int_arg(interp, args, 2, n as f64)?, n);
    let value = arg(args, 0);
    with_items(&arr, |items| {
        for slot in items.iter_mut().take(end).skip(start) {
            *slot = value.clone();
        }
    });
    Ok(this.clone())
}

/// Stable merge sort with a comparator that may throw.
fn merge_sort(
    interp: &mut Interpreter,
    items: Vec<Value>,
    cmp: &mut dyn FnMut(&mut Interpreter, &Value, &Value) -> Flow<Ordering>,
) -> Flow<Vec<Value>> {
    if items.len() <= 1 {
        return Ok(items);
    }
    let mut left = items;
    let right = left.split_off(left.len() / 2);
    let left = merge_sort(interp, left, cmp)?;
    let right = merge_sort(interp, right, cmp)?;

    let mut out = Vec::with_capacity(left.len() + right.len());
    let mut l = left.into_iter().peekable();
    let mut r = right.into_iter().peekable();
    while let (Some(a), Some(b)) = (l.peek(), r.peek()) {
        if cmp(interp, a, b)? == Ordering::Greater {
            out.extend(r.next());
        } else {
            out.extend(l.next());
        }
    }
    out.extend(l);
    out.extend(r);
    Ok(out)
}

fn sort(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    let arr = this_mutable(interp, this, "sort")?;
    let comparator = arg(args, 0);
    if !comparator.is_callable() && !matches!(comparator, Value::Undefined) {
        return Err(interp.type_error("The comparison function must be either a function or undefined"));
    }
    let all = items(&arr);
    let undefined_count = all.iter().filter(|v| matches!(v, Value::Undefined)).count();
    let defined: Vec<Value> = all.into_iter().filter(|v| !matches!(v, Value::Undefined)).collect();

    let mut cmp = |interp: &mut Interpreter, a: &Value, b: &Value| -> Flow<Ordering> {
        if comparator.is_callable() {
            let r = interp.call_function(&comparator, Value::Undefined, &[a.clone(), b.clone()])?;
            let n = interp.to_number(&r)?;
            Ok(if n > 0.0 {
                Ordering::Greater
            } else if n < 0.0 {
                Ordering::Less
            } else {
                Ordering::Equal
            })
        } else {
            let x = interp.to_string(a)?;
            let y = interp.to_string(b)?;
            Ok(x.encode_utf16().cmp(y.encode_utf16()))
        }
    };
    let mut sorted = merge_sort(interp, defined, &mut cmp)?;
    sorted.extend(std::iter::repeat(Value::Undefined).take(undefined_count));
    with_items(&arr, |items| *items = sorted);
    Ok(this.clone())
}

// ─── Accessors ────────────────────────────────────────────────────────────────

fn slice(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    let arr = this_array(interp, this, "slice")?;
    let all = items(&arr);
    let start = relative_index(int_arg(interp, args, 0, 0.0)?, all.len());
    let end = relative_index(int_arg(interp, args, 1, all.len() as f64)?, all.len());
    let out = if start < end { all[start..end].to_vec() } else { Vec::new() };
    Ok(interp.new_array(out).into())
}

fn concat(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    let arr = this_array(interp, this, "concat")?;
    let mut out = items(&arr);
    for a in args {
        match a {
            Value::Object(o) if matches!(o.borrow().kind, ObjectKind::Array(_)) => out.extend(items(o)),
            other => out.push(other.clone()),
        }
    }
    Ok(interp.new_array(out).into())
}

pub(crate) fn join_values(interp: &mut Interpreter, values: &[Value], sep: &str) -> Flow<String> {
    let mut parts = Vec::with_capacity(values.len());
    for v in values {
        parts.push(match v {
            Value::Undefined | Value::Null => String::new(),
            v => interp.to_string(v)?.to_string(),
        });
    }
    Ok(parts.join(sep))
}

fn join(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    let arr = this_array(interp, this, "join")?;
    let sep = match arg(args, 0) {
        Value::Undefined => ",".into(),
        v => interp.to_string(&v)?,
    };
    Ok(join_values(interp, &items(&arr), &sep)?.into())
}

fn to_string(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> Flow<Value> {
    match this {
        Value::Object(o) if matches!(o.borrow().kind, ObjectKind::Array(_)) => {
            Ok(join_values(interp, &items(o), ",")?.into())
        }
        _ => Ok(Value::str("[object Object]")),
    }
}

fn index_of(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    let arr = this_array(interp, this, "indexOf")?;
    let all = items(&arr);
    let from = relative_index(int_arg(interp, args, 1, 0.0)?, all.len());
    let target = arg(args, 0);
    let found = all.iter().enumerate().skip(from).find(|(_, v)| strict_equals(v, &target));
    Ok(found.map_or(-1.0, |(i, _)| i as f64).into())
}

fn last_index_of(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    let arr = this_array(interp, this, "lastIndexOf")?;
    let all = items(&arr);
    let target = arg(args, 0);
    let found = all.iter().enumerate().rev().find(|(_, v)| strict_equals(v, &target));
    Ok(found.map_or(-1.0, |(i, _)| i as f64).into())
}

fn includes(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    let arr = this_array(interp, this, "includes")?;
    let all = items(&arr);
    let from = relative_index(int_arg(interp, args, 1, 0.0)?, all.len());
    let target = arg(args, 0);
    Ok(all.iter().skip(from).any(|v| same_value_zero(v, &target)).into())
}

fn at(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    let arr = this_array(interp, this, "at")?;
    let n = len(&arr) as f64;
    let i = int_arg(interp, args, 0, 0.0)?;
    let i = if i < 0.0 { n + i } else { i };
    if i < 0.0 || i >= n {
        return Ok(Value::Undefined);
    }
    Ok(get(&arr, i as usize).unwrap_or(Value::Undefined))
}

fn flatten(out: &mut Vec<Value>, values: Vec<Value>, depth: f64) {
    for v in values {
        match &v {
            Value::Object(o) if depth >= 1.0 && matches!(o.borrow().kind, ObjectKind::Array(_)) => {
                flatten(out, items(o), depth - 1.0)
            }
            _ => out.push(v),
        }
    }
}

fn flat(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    let arr = this_array(interp, this, "flat")?;
    let depth = int_arg(interp, args, 0, 1.0)?;
    let mut out = Vec::new();
    flatten(&mut out, items(&arr), depth);
    Ok(interp.new_array(out).into())
}

fn flat_map(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    let mut mapped = Vec::new();
    visit(interp, this, args, "flatMap", |_, _, _, r| {
        mapped.push(r);
        Ok(true)
    })?;
    let mut out = Vec::new();
    flatten(&mut out, mapped, 1.0);
    Ok(interp.new_array(out).into())
}

fn keys(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> Flow<Value> {
    let arr = this_array(interp, this, "keys")?;
    let out = (0..len(&arr)).map(Value::from).collect();
    Ok(interp.new_array(out).into())
}

fn values(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> Flow<Value> {
    let arr = this_array(interp, this, "values")?;
    Ok(interp.new_array(items(&arr)).into())
}

fn entries(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> Flow<Value> {
    let arr = this_array(interp, this, "entries")?;
    let out: Vec<Value> = items(&arr)
        .into_iter()
        .enumerate()
        .map(|(i, v)| interp.new_array(vec![i.into(), v]).into())
        .collect();
    Ok(interp.new_array(out).into())
}

// ─── Iteration ────────────────────────────────────────────────────────────────

fn for_each(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    visit(interp, this, args, "forEach", |_, _, _, _| Ok(true))?;
    Ok(Value::Undefined)
}

fn map(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    let mut out = Vec::new();
    visit(interp, this, args, "map", |_, _, _, r| {
        out.push(r);
        Ok(true)
    })?;
    Ok(interp.new_array(out).into())
}

fn filter(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    let mut out = Vec::new();
    visit(interp, this, args, "filter", |_, _, v, r| {
        if r.truthy() {
            out.push(v);
        }
        Ok(true)
    })?;
    Ok(interp.new_array(out).into())
}

fn find(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    let mut found = Value::Undefined;
    visit(interp, this, args, "find", |_, _, v, r| {
        if r.truthy() {
            found = v;
            return Ok(false);
        }
        Ok(true)
    })?;
    Ok(found)
}

fn find_index(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    let mut found = -1.0;
    visit(interp, this, args, "findIndex", |_, i, _, r| {
        if r.truthy() {
            found = i as f64;
            return Ok(false);
        }
        Ok(true)
    })?;
    Ok(found.into())
}

fn find_last(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    Ok(visit_reverse(interp, this, args, "findLast")?.map_or(Value::Undefined, |(_, v)| v))
}

fn find_last_index(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    Ok(visit_reverse(interp, this, args, "findLastIndex")?.map_or(-1.0, |(i, _)| i as f64).into())
}

fn some(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    let mut hit = false;
    visit(interp, this, args, "some", |_, _, _, r| {
        hit = r.truthy();
        Ok(!hit)
    })?;
    Ok(hit.into())
}

fn every(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    let mut all = true;
    visit(interp, this, args, "every", |_, _, _, r| {
        all = r.truthy();
        Ok(all)
    })?;
    Ok(all.into())
}

fn fold(interp: &mut Interpreter, this: &Value, args: &[Value], name: &str, reverse: bool) -> Flow<Value> {
    let arr = this_array(interp, this, name)?;
    let f = callback(interp, args, name)?;
    let mut order: Vec<usize> = (0..len(&arr)).collect();
    if reverse {
        order.reverse();
    }
    let mut order = order.into_iter();
    let mut acc = if args.len() >= 2 {
        arg(args, 1)
    } else {
        match order.next() {
            Some(i) => get(&arr, i).unwrap_or(Value::Undefined),
            None => return Err(interp.type_error("Reduce of empty array with no initial value")),
        }
    };
    for i in order {
        let v = get(&arr, i).unwrap_or(Value::Undefined);
        acc = interp.call_function(&f, Value::Undefined, &[acc, v, i.into(), this.clone()])?;
    }
    Ok(acc)
}

fn reduce(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    fold(interp, this, args, "reduce", false)
}

fn reduce_right(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    fold(interp, this, args, "reduceRight", true)
}

// ─── Constructor ──────────────────────────────────────────────────────────────

fn array_call(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
    if let [Value::Number(n)] = args {
        let len = interp.array_length(*n)?;
        return Ok(interp.new_array(vec![Value::Undefined; len]).into());
    }
    Ok(interp.new_array(args.to_vec()).into())
}

fn array_construct(interp: &mut Interpreter, _new_target: &Value, args: &[Value]) -> Flow<Value> {
    array_call(interp, &Value::Undefined, args)
}

fn is_array(_interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
    Ok(arg(args, 0).is_array().into())
}

fn from(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
    let source = arg(args, 0);
    let list = match &source {
        Value::Undefined | Value::Null => {
            return Err(interp.type_error(format!(
                "{} is not iterable",
                if matches!(source, Value::Null) { "null" } else { "undefined" }
            )))
        }
        // Array-like: `{ length: n }`.
        Value::Object(o) if matches!(o.borrow().kind, ObjectKind::Plain) => {
            let n = interp.get_value(&source, "length")?;
            let n = interp.to_number(&n)?;
            let n = if n.is_nan() || n <= 0.0 { 0 } else { interp.array_length(n.floor())? };
            let mut out = Vec::with_capacity(n);
            for i in 0..n {
                out.push(interp.get_value(&source, &i.to_string())?);
            }
            out
        }
        Value::Str(_) | Value::Object(_) => interp.iterate(&source)?,
        _ => Vec::new(),
    };
    let mapper = arg(args, 1);
    if !mapper.is_callable() {
        return Ok(interp.new_array(list).into());
    }
    let mut out = Vec::with_capacity(list.len());
    for (i, v) in list.into_iter().enumerate() {
        out.push(interp.call_function(&mapper, Value::Undefined, &[v, i.into()])?);
    }
    Ok(interp.new_array(out).into())
}

fn of(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
    Ok(interp.new_array(args.to_vec()).into())
}

fn install(interp: &mut Interpreter) -> Value {
    let proto = interp.realm.array_proto.clone();
    let ctor = constructor(interp, "Array", 1, array_call, array_construct, &proto);
    method(interp, &ctor, "isArray", 1, is_array);
    method(interp, &ctor, "from", 1, from);
    method(interp, &ctor, "of", 0, of);
    ctor.into()
}

inventory::submit! {
    Facility { name: "Array", install }
}

#[cfg(test)]
mod tests {
    use crate::script::builtins::test_support::{eval_logged, run_logs, run_script};

    #[test]
    fn mutators() {
        let out = run_logs(
            "const a = [1, 2, 3];\n\
             a.push(4, 5); a.shift(); a.unshift(0); a.pop();\n\
             console.log(a.join());\n\
             const removed = a.splice(1, 2, 'x', 'y', 'z');\n\
             console.log(a.join(), removed.join());\n\
             console.log([1, 2, 3, 4].fill(0, 1, 3).join(), [1, 2, 3].reverse().join());",
        );
        assert_eq!(out, vec!["0,2,3,4", "0,x,y,z,4 2,3", "1,0,0,4 3,2,1"]);
    }

    #[test]
    fn higher_order_methods() {
        let out = run_logs(
            "const n = [1, 2, 3, 4, 5];\n\
             console.log(n.map(x => x * 2).filter(x => x > 4).join());\n\
             console.log(n.reduce((a, b) => a + b), n.reduceRight((a, b) => a + b, ''));\n\
             console.log(n.find(x => x > 2), n.findIndex(x => x > 2), n.findLast(x => x < 3), n.findLastIndex(x => x > 9));\n\
             console.log(n.some(x => x > 4), n.every(x => x > 0), n.includes(3), n.indexOf(9));\n\
             let seen = 0; n.forEach(function (x) { seen += x * this.k; }, { k: 10 });\n\
             console.log(seen);",
        );
        assert_eq!(out, vec!["6,8,10", "15 54321", "3 2 2 -1", "true true true -1", "150"]);
    }

    #[test]
    fn sort_is_stable_and_defaults_to_string_order() {
        let out = run_logs(
            "console.log([10, 9, 1, 100].sort().join());\n\
             const people = [{ n: 'b', a: 2 }, { n: 'a', a: 1 }, { n: 'c', a: 2 }];\n\
             console.log(people.sort((x, y) => x.a - y.a).map(p => p.n).join());\n\
             console.log([3, undefined, 1].sort().map(String).join());",
        );
        assert_eq!(out, vec!["1,10,100,9", "a,b,c", "1,3,undefined"]);
    }

    #[test]
    fn comparator_errors_propagate() {
        let (result, _) = run_script("[2, 1].sort(() => { throw new Error('cmp'); });");
        assert_eq!(result.unwrap_err().to_string(), "Error: cmp");
    }

    #[test]
    fn slicing_flattening_and_access() {
        assert_eq!(eval_logged("[1, 2, 3, 4].slice(1, -1).join()"), "2,3");
        assert_eq!(eval_logged("[1, [2, [3, [4]]]].flat(2).length"), "4");
        assert_eq!(eval_logged("[1, 2].flatMap(x => [x, x * 10]).join()"), "1,10,2,20");
        assert_eq!(eval_logged("[1, 2, 3].at(-1)"), "3");
        assert_eq!(eval_logged("[1, null, undefined, 'a'].join('-')"), "1---a");
        assert_eq!(eval_logged("String([1, [2, 3]])"), "1,2,3");
        assert_eq!(eval_logged("[1].concat([2, 3], 4).length"), "4");
    }

    #[test]
    fn constructor_and_statics() {
        assert_eq!(eval_logged("new Array(3).length"), "3");
        assert_eq!(eval_logged("Array(1, 2).join()"), "1,2");
        assert_eq!(eval_logged("Array.isArray([]) && !Array.isArray('x')"), "true");
        assert_eq!(eval_logged("Array.from('abc').join('|')"), "a|b|c");
        assert_eq!(eval_logged("Array.from({ length: 3 }, (_, i) => i * i).join()"), "0,1,4");
        assert_eq!(eval_logged("Array.from(new Set([1, 1, 2])).length"), "2");
        assert_eq!(eval_logged("Array.of(7).length"), "1");
    }

    #[test]
    fn reduce_of_empty_array_throws() {
        let (result, _) = run_script("[].reduce((a, b) => a + b);");
        assert_eq!(
            result.unwrap_err().to_string(),
            "TypeError: Reduce of empty array with no initial value"
        );
    }
}
