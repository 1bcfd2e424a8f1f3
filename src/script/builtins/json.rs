//! `JSON.stringify` / `JSON.parse`, bridged through `serde_json`.

use std::rc::Rc;

use serde::Serialize;
use serde_json::ser::PrettyFormatter;

use super::{arg, method, Facility};
use crate::script::error::Flow;
use crate::script::interpreter::{ErrorKind, Interpreter};
use crate::script::value::*;

/// What to do when an object contains itself.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Cycles {
    /// `JSON.stringify` semantics: a TypeError.
    Throw,
    /// Console rendering: the back-reference prints as `"[Circular]"`.
    Mark,
}

struct Writer {
    replacer: Option<Value>,
    allow: Option<Vec<Rc<str>>>,
    stack: Vec<ObjRef>,
    cycles: Cycles,
}

impl Writer {
    fn new(cycles: Cycles) -> Self {
        Self {
            replacer: None,
            allow: None,
            stack: Vec::new(),
            cycles,
        }
    }

    /// `None` means the value is skipped (undefined, functions).
    fn write(
        &mut self,
        interp: &mut Interpreter,
        holder: &Value,
        key: &str,
        mut value: Value,
    ) -> Flow<Option<serde_json::Value>> {
        if let Value::Object(_) = value {
            let to_json = interp.get_value(&value, "toJSON")?;
            if to_json.is_callable() {
                value = interp.call_function(&to_json, value, &[Value::str(key)])?;
            }
        }
        if let Some(replacer) = self.replacer.clone() {
            value = interp.call_function(&replacer, holder.clone(), &[Value::str(key), value])?;
        }

        Ok(Some(match &value {
            Value::Undefined => return Ok(None),
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => number(*n),
            Value::Str(s) => serde_json::Value::String(s.to_string()),
            Value::Object(o) => {
                if o.borrow().is_callable() {
                    return Ok(None);
                }
                if self.stack.iter().any(|seen| Rc::ptr_eq(seen, o)) {
                    return match self.cycles {
                        Cycles::Throw => Err(interp.type_error("Converting circular structure to JSON")),
                        Cycles::Mark => Ok(Some(serde_json::Value::String("[Circular]".into()))),
                    };
                }
                self.stack.push(o.clone());
                let out = self.write_object(interp, o, &value);
                self.stack.pop();
                out?
            }
        }))
    }

    fn write_object(&mut self, interp: &mut Interpreter, o: &ObjRef, holder: &Value) -> Flow<serde_json::Value> {
        let items = match &o.borrow().kind {
            ObjectKind::Array(items) => Some(items.clone()),
            _ => None,
        };
        if let Some(items) = items {
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.into_iter().enumerate() {
                let v = self.write(interp, holder, &i.to_string(), item)?;
                out.push(v.unwrap_or(serde_json::Value::Null));
            }
            return Ok(serde_json::Value::Array(out));
        }

        let entries: Vec<(Rc<str>, Value)> = match &self.allow {
            Some(keys) => {
                let keys = keys.clone();
                let mut entries = Vec::new();
                for k in keys {
                    if o.borrow().has_own(&k) {
                        let v = interp.get_value(holder, &k)?;
                        entries.push((k, v));
                    }
                }
                entries
            }
            None => interp.own_entries(o),
        };
        let mut map = serde_json::Map::new();
        for (k, v) in entries {
            if let Some(json) = self.write(interp, holder, &k, v)? {
                map.insert(k.to_string(), json);
            }
        }
        Ok(serde_json::Value::Object(map))
    }
}

fn number(n: f64) -> serde_json::Value {
    if !n.is_finite() {
        return serde_json::Value::Null;
    }
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        return serde_json::Value::from(n as i64);
    }
    serde_json::Number::from_f64(n).map_or(serde_json::Value::Null, serde_json::Value::Number)
}

/// Converts a value to its JSON tree. `None` for values JSON skips.
pub fn to_json(interp: &mut Interpreter, value: &Value, cycles: Cycles) -> Flow<Option<serde_json::Value>> {
    let holder: Value = interp.new_plain().into();
    Writer::new(cycles).write(interp, &holder, "", value.clone())
}

/// Serializes with `indent` per level; an empty indent gives compact output.
pub fn format_json(value: &serde_json::Value, indent: &str) -> String {
    if indent.is_empty() {
        return value.to_string();
    }
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(indent.as_bytes()));
    if value.serialize(&mut ser).is_err() {
        return value.to_string();
    }
    String::from_utf8(buf).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

pub fn from_json(interp: &Interpreter, json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => Value::str(s),
        serde_json::Value::Array(items) => {
            let items = items.iter().map(|item| from_json(interp, item)).collect();
            interp.new_array(items).into()
        }
        serde_json::Value::Object(map) => {
            let obj = interp.new_plain();
            {
                let mut o = obj.borrow_mut();
                for (k, v) in map {
                    o.set_own(k, from_json(interp, v));
                }
            }
            obj.into()
        }
    }
}

// ─── JSON object ──────────────────────────────────────────────────────────────

fn stringify(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
    let mut writer = Writer::new(Cycles::Throw);
    match arg(args, 1) {
        f if f.is_callable() => writer.replacer = Some(f),
        Value::Object(list) if matches!(list.borrow().kind, ObjectKind::Array(_)) => {
            let mut keys = Vec::new();
            for item in interp.iterate(&Value::Object(list.clone()))? {
                if matches!(item, Value::Str(_) | Value::Number(_)) {
                    keys.push(interp.to_string(&item)?);
                }
            }
            writer.allow = Some(keys);
        }
        _ => {}
    }
    let indent = match arg(args, 2) {
        Value::Number(n) => " ".repeat(n.clamp(0.0, 10.0) as usize),
        Value::Str(s) => s.chars().take(10).collect(),
        _ => String::new(),
    };

    let holder = interp.new_plain();
    holder.borrow_mut().set_own("", arg(args, 0));
    match writer.write(interp, &holder.into(), "", arg(args, 0))? {
        Some(json) => Ok(format_json(&json, &indent).into()),
        None => Ok(Value::Undefined),
    }
}

fn parse(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
    let text = interp.to_string(&arg(args, 0))?;
    let json: serde_json::Value = match serde_json::from_str(&text) {
        Ok(json) => json,
        Err(e) => {
            return Err(interp.throw(
                ErrorKind::Syntax,
                format!("Unexpected token in JSON at line {} column {}", e.line(), e.column()),
            ))
        }
    };
    let value = from_json(interp, &json);
    let reviver = arg(args, 1);
    if !reviver.is_callable() {
        return Ok(value);
    }
    let root = interp.new_plain();
    root.borrow_mut().set_own("", value);
    revive(interp, &reviver, &root.into(), "")
}

fn revive(interp: &mut Interpreter, reviver: &Value, holder: &Value, key: &str) -> Flow<Value> {
    let value = interp.get_value(holder, key)?;
    if let Value::Object(o) = &value {
        let keys = o.borrow().own_keys(true);
        for k in keys {
            let revived = revive(interp, reviver, &value, &k)?;
            let mut obj = o.borrow_mut();
            match revived {
                Value::Undefined if !matches!(obj.kind, ObjectKind::Array(_)) => {
                    obj.delete(&k);
                }
                v => {
                    obj.set_own(&k, v);
                }
            }
        }
    }
    interp.call_function(reviver, holder.clone(), &[Value::str(key), value])
}

fn install(interp: &mut Interpreter) -> Value {
    let json = interp.new_plain();
    method(interp, &json, "stringify", 3, stringify);
    method(interp, &json, "parse", 2, parse);
    json.into()
}

inventory::submit! {
    Facility { name: "JSON", install }
}

#[cfg(test)]
mod tests {
    use super::format_json;
    use crate::script::builtins::test_support::{eval_logged, run_logs, run_script};

    #[test]
    fn stringify_matches_javascript_layout() {
        assert_eq!(
            eval_logged("JSON.stringify({ a: 1, b: [true, null, 'x'], c: undefined, f() {} })"),
            r#"{"a":1,"b":[true,null,"x"]}"#
        );
        assert_eq!(eval_logged("JSON.stringify([undefined, () => 1])"), "[null,null]");
        assert_eq!(eval_logged("JSON.stringify(1.5)"), "1.5");
        assert_eq!(eval_logged("JSON.stringify(NaN)"), "null");
        assert_eq!(eval_logged("JSON.stringify('q\"')"), r#""q\"""#);
    }

    #[test]
    fn stringify_indent_replacer_and_to_json() {
        let out = run_logs(
            "console.log(JSON.stringify({ a: [1, 2] }, null, 2));\n\
             console.log(JSON.stringify({ a: 1, b: 2, c: 3 }, ['c', 'a']));\n\
             console.log(JSON.stringify({ a: 1, b: 'x' }, (k, v) => typeof v === 'number' ? v * 10 : v));\n\
             console.log(JSON.stringify({ toJSON() { return 'custom'; } }));",
        );
        assert_eq!(
            out,
            vec![
                "{\n  \"a\": [\n    1,\n    2\n  ]\n}",
                r#"{"c":3,"a":1}"#,
                r#"{"a":10,"b":"x"}"#,
                r#""custom""#,
            ]
        );
    }

    #[test]
    fn stringify_rejects_cycles() {
        let out = run_logs(
            "const a = {}; a.self = a;\n\
             try { JSON.stringify(a); } catch (e) { console.log(e.name + ': ' + e.message); }",
        );
        assert_eq!(out, vec!["TypeError: Converting circular structure to JSON"]);
    }

    #[test]
    fn parse_builds_values_and_applies_reviver() {
        let out = run_logs(
            "const v = JSON.parse('{\"n\": 2, \"list\": [1, \"two\", null], \"o\": {\"k\": false}}');\n\
             console.log(v.n + 1, v.list.length, v.list[1], v.o.k);\n\
             const r = JSON.parse('{\"a\": 1, \"b\": 2}', (k, v) => k === 'a' ? undefined : v);\n\
             console.log(Object.keys(r).join(','));",
        );
        assert_eq!(out, vec!["3 3 two false", "b"]);
    }

    #[test]
    fn parse_errors_are_syntax_errors() {
        let (result, _) = run_script("JSON.parse('{bad');");
        let message = result.unwrap_err().to_string();
        assert!(message.starts_with("SyntaxError: Unexpected token in JSON"), "{}", message);
    }

    #[test]
    fn format_json_compact_and_pretty() {
        let v = serde_json::json!({ "a": [1], "b": {} });
        assert_eq!(format_json(&v, ""), r#"{"a":[1],"b":{}}"#);
        assert_eq!(format_json(&v, "  "), "{\n  \"a\": [\n    1\n  ],\n  \"b\": {}\n}");
    }
}
