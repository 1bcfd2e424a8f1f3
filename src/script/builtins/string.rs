//! `String` and `String.prototype`. Indices are chars, not UTF-16 units.

use std::rc::Rc;

use super::regexp::{self, as_regexp, byte_offset, char_offset};
use super::{arg, constructor, int_arg, method, Facility};
use crate::script::error::Flow;
use crate::script::format::{is_js_whitespace, relative_index, to_uint32};
use crate::script::interpreter::Interpreter;
use crate::script::value::*;

pub fn init(interp: &mut Interpreter) {
    let proto = interp.realm.string_proto.clone();
    let methods: &[(&str, usize, NativeFn)] = &[
        ("charAt", 1, char_at),
        ("charCodeAt", 1, char_code_at),
        ("codePointAt", 1, char_code_at),
        ("at", 1, at),
        ("indexOf", 1, index_of),
        ("lastIndexOf", 1, last_index_of),
        ("includes", 1, includes),
        ("startsWith", 1, starts_with),
        ("endsWith", 1, ends_with),
        ("slice", 2, slice),
        ("substring", 2, substring),
        ("substr", 2, substr),
        ("toUpperCase", 0, to_upper_case),
        ("toLowerCase", 0, to_lower_case),
        ("toLocaleUpperCase", 0, to_upper_case),
        ("toLocaleLowerCase", 0, to_lower_case),
        ("trim", 0, trim),
        ("trimStart", 0, trim_start),
        ("trimEnd", 0, trim_end),
        ("padStart", 2, pad_start),
        ("padEnd", 2, pad_end),
        ("repeat", 1, repeat),
        ("split", 2, split),
        ("replace", 2, replace),
        ("replaceAll", 2, replace_all),
        ("match", 1, match_),
        ("matchAll", 1, match_all),
        ("search", 1, search),
        ("concat", 1, concat),
        ("localeCompare", 1, locale_compare),
        ("normalize", 0, value_of),
        ("toString", 0, value_of),
        ("valueOf", 0, value_of),
    ];
    for (name, arity, f) in methods {
        method(interp, &proto, name, *arity, *f);
    }
}

fn this_str(interp: &mut Interpreter, this: &Value, name: &str) -> Flow<Rc<str>> {
    if this.is_nullish() {
        return Err(interp.type_error(format!("String.prototype.{} called on null or undefined", name)));
    }
    interp.to_string(this)
}

fn str_arg(interp: &mut Interpreter, args: &[Value], i: usize) -> Flow<Rc<str>> {
    interp.to_string(&arg(args, i))
}

/// Char-indexed substring, clamped.
fn chars_between(s: &str, start: usize, end: usize) -> &str {
    if start >= end {
        return "";
    }
    &s[byte_offset(s, start)..byte_offset(s, end)]
}

fn char_at(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    let s = this_str(interp, this, "charAt")?;
    let i = int_arg(interp, args, 0, 0.0)?;
    let c = (i >= 0.0).then(|| s.chars().nth(i as usize)).flatten();
    Ok(c.map_or_else(|| Value::str(""), |c| c.to_string().into()))
}

fn char_code_at(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    let s = this_str(interp, this, "charCodeAt")?;
    let i = int_arg(interp, args, 0, 0.0)?;
    let c = (i >= 0.0).then(|| s.chars().nth(i as usize)).flatten();
    Ok(c.map_or(f64::NAN, |c| c as u32 as f64).into())
}

fn at(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    let s = this_str(interp, this, "at")?;
    let n = s.chars().count() as f64;
    let i = int_arg(interp, args, 0, 0.0)?;
    let i = if i < 0.0 { n + i } else { i };
    if i < 0.0 || i >= n {
        return Ok(Value::Undefined);
    }
    Ok(s.chars().nth(i as usize).map_or(Value::Undefined, |c| c.to_string().into()))
}

fn index_of(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    let s = this_str(interp, this, "indexOf")?;
    let needle = str_arg(interp, args, 0)?;
    let from = relative_index(int_arg(interp, args, 1, 0.0)?.max(0.0), s.chars().count());
    let start = byte_offset(&s, from);
    let found = s[start..].find(&*needle).map(|b| char_offset(&s, start + b));
    Ok(found.map_or(-1.0, |i| i as f64).into())
}

fn last_index_of(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    let s = this_str(interp, this, "lastIndexOf")?;
    let needle = str_arg(interp, args, 0)?;
    let found = s.rfind(&*needle).map(|b| char_offset(&s, b));
    Ok(found.map_or(-1.0, |i| i as f64).into())
}

fn reject_regexp(interp: &mut Interpreter, v: &Value, name: &str) -> Flow<()> {
    if as_regexp(v).is_some() {
        return Err(interp.type_error(format!(
            "First argument to String.prototype.{} must not be a regular expression",
            name
        )));
    }
    Ok(())
}

fn includes(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    let s = this_str(interp, this, "includes")?;
    reject_regexp(interp, &arg(args, 0), "includes")?;
    let needle = str_arg(interp, args, 0)?;
    let from = byte_offset(&s, int_arg(interp, args, 1, 0.0)?.max(0.0) as usize);
    Ok(s[from..].contains(&*needle).into())
}

fn starts_with(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    let s = this_str(interp, this, "startsWith")?;
    reject_regexp(interp, &arg(args, 0), "startsWith")?;
    let needle = str_arg(interp, args, 0)?;
    let from = byte_offset(&s, int_arg(interp, args, 1, 0.0)?.max(0.0) as usize);
    Ok(s[from..].starts_with(&*needle).into())
}

fn ends_with(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    let s = this_str(interp, this, "endsWith")?;
    reject_regexp(interp, &arg(args, 0), "endsWith")?;
    let needle = str_arg(interp, args, 0)?;
    let n = s.chars().count();
    let end = byte_offset(&s, int_arg(interp, args, 1, n as f64)?.clamp(0.0, n as f64) as usize);
    Ok(s[..end].ends_with(&*needle).into())
}

fn slice(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    let s = this_str(interp, this, "slice")?;
    let n = s.chars().count();
    let start = relative_index(int_arg(interp, args, 0, 0.0)?, n);
    let end = relative_index(int_arg(interp, args, 1, n as f64)?, n);
    Ok(chars_between(&s, start, end).into())
}

fn substring(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    let s = this_str(interp, this, "substring")?;
    let n = s.chars().count() as f64;
    let a = int_arg(interp, args, 0, 0.0)?.clamp(0.0, n) as usize;
    let b = int_arg(interp, args, 1, n)?.clamp(0.0, n) as usize;
    Ok(chars_between(&s, a.min(b), a.max(b)).into())
}

fn substr(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    let s = this_str(interp, this, "substr")?;
    let n = s.chars().count();
    let start = relative_index(int_arg(interp, args, 0, 0.0)?, n);
    let len = int_arg(interp, args, 1, (n - start) as f64)?.clamp(0.0, (n - start) as f64) as usize;
    Ok(chars_between(&s, start, start + len).into())
}

fn to_upper_case(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> Flow<Value> {
    Ok(this_str(interp, this, "toUpperCase")?.to_uppercase().into())
}

fn to_lower_case(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> Flow<Value> {
    Ok(this_str(interp, this, "toLowerCase")?.to_lowercase().into())
}

fn trim(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> Flow<Value> {
    Ok(this_str(interp, this, "trim")?.trim_matches(is_js_whitespace).into())
}

fn trim_start(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> Flow<Value> {
    Ok(this_str(interp, this, "trimStart")?.trim_start_matches(is_js_whitespace).into())
}

fn trim_end(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> Flow<Value> {
    Ok(this_str(interp, this, "trimEnd")?.trim_end_matches(is_js_whitespace).into())
}

fn padding(interp: &mut Interpreter, s: &str, args: &[Value]) -> Flow<String> {
    let target = int_arg(interp, args, 0, 0.0)?;
    let fill = match arg(args, 1) {
        Value::Undefined => " ".into(),
        v => interp.to_string(&v)?,
    };
    let n = s.chars().count();
    if target <= n as f64 || fill.is_empty() {
        return Ok(String::new());
    }
    interp.string_room(s.len() as f64 + (target - n as f64) * fill.len() as f64)?;
    Ok(fill.chars().cycle().take(target as usize - n).collect())
}

fn pad_start(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    let s = this_str(interp, this, "padStart")?;
    let pad = padding(interp, &s, args)?;
    Ok(format!("{}{}", pad, s).into())
}

fn pad_end(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    let s = this_str(interp, this, "padEnd")?;
    let pad = padding(interp, &s, args)?;
    Ok(format!("{}{}", s, pad).into())
}

fn repeat(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    let s = this_str(interp, this, "repeat")?;
    let count = int_arg(interp, args, 0, 0.0)?;
    if count < 0.0 || count.is_infinite() {
        return Err(interp.range_error(format!("Invalid count value: {}", crate::script::format::number_to_string(count))));
    }
    interp.string_room(count * s.len() as f64)?;
    Ok(s.repeat(count as usize).into())
}

fn split(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    let s = this_str(interp, this, "split")?;
    let limit = match arg(args, 1) {
        Value::Undefined => u32::MAX as usize,
        v => to_uint32(interp.to_number(&v)?) as usize,
    };
    let sep = arg(args, 0);
    if let Some(re) = as_regexp(&sep) {
        return regexp::split(interp, re, &s, limit);
    }
    let parts: Vec<Value> = match sep {
        Value::Undefined => vec![Value::Str(s.clone())],
        sep => {
            let sep = interp.to_string(&sep)?;
            if sep.is_empty() {
                s.chars().map(|c| Value::from(c.to_string())).collect()
            } else {
                s.split(&*sep).map(Value::str).collect()
            }
        }
    };
    Ok(interp.new_array(parts.into_iter().take(limit).collect()).into())
}

fn replace(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    let s = this_str(interp, this, "replace")?;
    let pattern = arg(args, 0);
    let replacement = arg(args, 1);
    let out = match as_regexp(&pattern) {
        Some(re) => regexp::replace(interp, re, &s, &replacement)?,
        None => {
            let needle = interp.to_string(&pattern)?;
            regexp::replace_literal(interp, &s, &needle, &replacement, false)?
        }
    };
    Ok(out.into())
}

fn replace_all(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    let s = this_str(interp, this, "replaceAll")?;
    let pattern = arg(args, 0);
    let replacement = arg(args, 1);
    let out = match as_regexp(&pattern) {
        Some(re) => {
            let global = matches!(&re.borrow().kind, ObjectKind::RegExp(data) if data.global());
            if !global {
                return Err(interp.type_error("replaceAll must be called with a global RegExp"));
            }
            regexp::replace(interp, re, &s, &replacement)?
        }
        None => {
            let needle = interp.to_string(&pattern)?;
            regexp::replace_literal(interp, &s, &needle, &replacement, true)?
        }
    };
    Ok(out.into())
}

/// The RegExp argument of `match`/`search`, compiling strings on the fly.
fn coerce_regexp(interp: &mut Interpreter, v: &Value, flags: &str) -> Flow<ObjRef> {
    if let Some(re) = as_regexp(v) {
        return Ok(re.clone());
    }
    let source = match v {
        Value::Undefined => Rc::from(""),
        other => interp.to_string(other)?,
    };
    match regexp::create(interp, &source, flags)? {
        Value::Object(o) => Ok(o),
        _ => Err(interp.type_error("RegExp construction failed")),
    }
}

fn match_(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    let s = this_str(interp, this, "match")?;
    let re = coerce_regexp(interp, &arg(args, 0), "")?;
    regexp::match_string(interp, &re, &s)
}

fn match_all(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    let s = this_str(interp, this, "matchAll")?;
    let re = coerce_regexp(interp, &arg(args, 0), "g")?;
    regexp::match_all(interp, &re, &s)
}

fn search(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    let s = this_str(interp, this, "search")?;
    let re = coerce_regexp(interp, &arg(args, 0), "")?;
    Ok(regexp::search(&re, &s))
}

fn concat(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    let mut out = this_str(interp, this, "concat")?.to_string();
    for a in args {
        out.push_str(&interp.to_string(a)?);
    }
    Ok(out.into())
}

fn locale_compare(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    let s = this_str(interp, this, "localeCompare")?;
    let other = str_arg(interp, args, 0)?;
    let ord = s
        .to_lowercase()
        .cmp(&other.to_lowercase())
        .then_with(|| other.cmp(&s));
    Ok(Value::Number(ord as i8 as f64))
}

fn value_of(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> Flow<Value> {
    match this {
        Value::Str(_) => Ok(this.clone()),
        _ => Err(interp.type_error("String.prototype.valueOf requires that 'this' be a String")),
    }
}

// ─── Constructor ──────────────────────────────────────────────────────────────

fn string_call(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
    match args.first() {
        None => Ok(Value::str("")),
        Some(v) => Ok(Value::Str(interp.to_string(v)?)),
    }
}

/// `new String(x)` yields the primitive; there are no wrapper objects.
fn string_construct(interp: &mut Interpreter, _new_target: &Value, args: &[Value]) -> Flow<Value> {
    string_call(interp, &Value::Undefined, args)
}

fn from_char_code(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
    let mut out = String::with_capacity(args.len());
    for a in args {
        let code = to_uint32(interp.to_number(a)?) & 0x10FFFF;
        out.push(char::from_u32(code).unwrap_or('\u{FFFD}'));
    }
    Ok(out.into())
}

fn install(interp: &mut Interpreter) -> Value {
    let proto = interp.realm.string_proto.clone();
    let ctor = constructor(interp, "String", 1, string_call, string_construct, &proto);
    method(interp, &ctor, "fromCharCode", 1, from_char_code);
    method(interp, &ctor, "fromCodePoint", 1, from_char_code);
    ctor.into()
}

inventory::submit! {
    Facility { name: "String", install }
}

#[cfg(test)]
mod tests {
    use crate::script::builtins::test_support::{eval_logged, run_script};

    #[test]
    fn searching_and_slicing() {
        assert_eq!(eval_logged("'hello world'.indexOf('o')"), "4");
        assert_eq!(eval_logged("'hello world'.indexOf('o', 5)"), "7");
        assert_eq!(eval_logged("'hello world'.lastIndexOf('o')"), "7");
        assert_eq!(eval_logged("'hello'.slice(-3)"), "llo");
        assert_eq!(eval_logged("'hello'.substring(3, 1)"), "el");
        assert_eq!(eval_logged("'hello'.substr(1, 3)"), "ell");
        assert_eq!(eval_logged("'héllo'.charAt(1) + 'héllo'.length"), "é5");
        assert_eq!(eval_logged("'abc'.at(-1) + 'abc'.charCodeAt(0)"), "c97");
        assert_eq!(eval_logged("'😀'.length + ':' + '😀'.charCodeAt(0) + ':' + 'a😀b'.charAt(2)"), "1:128512:b");
        assert_eq!(eval_logged("['abc'.includes('bc'), 'abc'.startsWith('ab'), 'abc'.endsWith('b', 2)].join()"), "true,true,true");
    }

    #[test]
    fn transforming() {
        assert_eq!(eval_logged("'  pad  '.trim() + '|'"), "pad|");
        assert_eq!(eval_logged("'5'.padStart(3, '0') + '5'.padEnd(3, 'ab')"), "0055ab");
        assert_eq!(eval_logged("'ab'.repeat(3)"), "ababab");
        assert_eq!(eval_logged("'MiXeD'.toLowerCase() + 'x'.toUpperCase()"), "mixedX");
        assert_eq!(eval_logged("'a'.concat('b', 1)"), "ab1");
        assert_eq!(eval_logged("String.fromCharCode(72, 105)"), "Hi");
    }

    #[test]
    fn splitting() {
        assert_eq!(eval_logged("'a,b,,c'.split(',').length"), "4");
        assert_eq!(eval_logged("'abc'.split('').join('-')"), "a-b-c");
        assert_eq!(eval_logged("'a1b22c'.split(/\\d+/).join()"), "a,b,c");
        assert_eq!(eval_logged("'a-b'.split(/(-)/).length"), "3");
        assert_eq!(eval_logged("'a b c'.split(' ', 2).join()"), "a,b");
        assert_eq!(eval_logged("'abc'.split().length"), "1");
    }

    #[test]
    fn replacing_and_matching() {
        assert_eq!(eval_logged("'aaa'.replace('a', 'b')"), "baa");
        assert_eq!(eval_logged("'aaa'.replaceAll('a', 'b')"), "bbb");
        assert_eq!(eval_logged("'John Smith'.replace(/(\\w+)\\s(\\w+)/, '$2, $1')"), "Smith, John");
        assert_eq!(eval_logged("'a1b2'.replace(/\\d/g, d => d * 2)"), "a2b4");
        assert_eq!(eval_logged("'x'.replace('x', '[$&]')"), "[x]");
        assert_eq!(eval_logged("'a1b2c3'.match(/\\d/g).join('')"), "123");
        assert_eq!(eval_logged("'abc'.match(/z/)"), "null");
        assert_eq!(eval_logged("[...'a1b2'.matchAll(/\\d/g)].map(m => m.index).join()"), "1,3");
        assert_eq!(eval_logged("'hello'.search(/l+/)"), "2");
        let (result, _) = run_script("'a'.replaceAll(/a/, 'b');");
        assert_eq!(result.unwrap_err().to_string(), "TypeError: replaceAll must be called with a global RegExp");
    }

    #[test]
    fn constructor_returns_primitives() {
        assert_eq!(eval_logged("typeof new String(5)"), "string");
        assert_eq!(eval_logged("String(null) + String([1, 2])"), "null1,2");
    }
}
