//! `RegExp`, backed by the `regex` crate.
//!
//! JavaScript pattern syntax is rewritten into `regex` syntax on creation.
//! Lookaround and backreferences have no equivalent and are rejected with
//! a SyntaxError. Match positions exposed to scripts are char indices.

use std::rc::Rc;

use regex::{Regex, RegexBuilder};

use super::{arg, constructor, method, Facility};
use crate::script::error::Flow;
use crate::script::interpreter::{ErrorKind, Interpreter};
use crate::script::value::*;

// ─── Pattern translation ──────────────────────────────────────────────────────

fn translate(pattern: &str) -> Result<String, String> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() + 8);
    let mut in_class = false;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '\\' => {
                let Some(&next) = chars.get(i + 1) else {
                    return Err("\\ at end of pattern".into());
                };
                i += 2;
                match next {
                    'd' if in_class => out.push_str("0-9"),
                    'd' => out.push_str("[0-9]"),
                    'D' if !in_class => out.push_str("[^0-9]"),
                    'w' if in_class => out.push_str("0-9A-Za-z_"),
                    'w' => out.push_str("[0-9A-Za-z_]"),
                    'W' if !in_class => out.push_str("[^0-9A-Za-z_]"),
                    '1'..='9' if !in_class => return Err("backreferences are not supported".into()),
                    'u' => {
                        let (code, used) = unicode_escape(&chars[i..])?;
                        out.push_str(&format!("\\x{{{:X}}}", code));
                        i += used;
                    }
                    'c' => match chars.get(i) {
                        Some(l) if l.is_ascii_alphabetic() => {
                            out.push_str(&format!("\\x{{{:X}}}", (*l as u32) % 32));
                            i += 1;
                        }
                        _ => out.push_str("\\\\c"),
                    },
                    '0' => out.push_str("\\x{0}"),
                    'k' => {
                        // \k<name> is a named backreference.
                        return Err("backreferences are not supported".into());
                    }
                    c if c.is_ascii_alphanumeric() => {
                        out.push('\\');
                        out.push(c);
                    }
                    c => out.push_str(&regex::escape(&c.to_string())),
                }
                continue;
            }
            '[' if in_class => out.push_str("\\["),
            '[' => {
                if chars.get(i + 1) == Some(&'^') && chars.get(i + 2) == Some(&']') {
                    out.push_str("[\\s\\S]");
                    i += 3;
                    continue;
                }
                if chars.get(i + 1) == Some(&']') {
                    out.push_str("[^\\s\\S]");
                    i += 2;
                    continue;
                }
                in_class = true;
                out.push('[');
                if chars.get(i + 1) == Some(&'^') {
                    out.push('^');
                    i += 1;
                }
                // A leading `]` is a literal in both dialects once escaped.
                if chars.get(i + 1) == Some(&']') {
                    out.push_str("\\]");
                    i += 1;
                }
            }
            ']' if in_class => {
                in_class = false;
                out.push(']');
            }
            '&' | '~' if in_class => {
                out.push('\\');
                out.push(c);
            }
            '(' if !in_class && chars.get(i + 1) == Some(&'?') => {
                let rest: String = chars[i + 2..].iter().take(3).collect();
                if rest.starts_with('=') || rest.starts_with('!') || rest.starts_with("<=") || rest.starts_with("<!") {
                    return Err("lookaround assertions are not supported".into());
                }
                if rest.starts_with('<') {
                    out.push_str("(?P<");
                    i += 3;
                    continue;
                }
                out.push('(');
            }
            '{' if !in_class && !is_quantifier(&chars[i..]) => out.push_str("\\{"),
            '}' if !in_class && !closes_quantifier(&chars[..i]) => out.push_str("\\}"),
            c => out.push(c),
        }
        i += 1;
    }
    if in_class {
        return Err("missing terminating ] for character class".into());
    }
    Ok(out)
}

fn unicode_escape(rest: &[char]) -> Result<(u32, usize), String> {
    if rest.first() == Some(&'{') {
        let end = rest.iter().position(|c| *c == '}').ok_or("invalid Unicode escape")?;
        let hex: String = rest[1..end].iter().collect();
        let code = u32::from_str_radix(&hex, 16).map_err(|_| "invalid Unicode escape")?;
        return Ok((code, end + 1));
    }
    let hex: String = rest.iter().take(4).collect();
    if hex.len() != 4 {
        return Err("invalid Unicode escape".into());
    }
    let code = u32::from_str_radix(&hex, 16).map_err(|_| "invalid Unicode escape")?;
    Ok((code, 4))
}

/// `{n}`, `{n,}` or `{n,m}` starting at `rest[0]`.
fn is_quantifier(rest: &[char]) -> bool {
    let Some(end) = rest.iter().position(|c| *c == '}') else {
        return false;
    };
    let body: String = rest[1..end].iter().collect();
    let mut parts = body.splitn(2, ',');
    let first = parts.next().unwrap_or("");
    let ok_first = !first.is_empty() && first.bytes().all(|b| b.is_ascii_digit());
    let ok_second = parts.next().map_or(true, |s| s.bytes().all(|b| b.is_ascii_digit()));
    ok_first && ok_second
}

fn closes_quantifier(before: &[char]) -> bool {
    match before.iter().rposition(|c| *c == '{') {
        Some(open) => is_quantifier(&before[open..].iter().copied().chain(std::iter::once('}')).collect::<Vec<_>>()),
        None => false,
    }
}

fn compile(pattern: &str, flags: &str) -> Result<Regex, String> {
    let translated = translate(pattern)?;
    RegexBuilder::new(&translated)
        .case_insensitive(flags.contains('i'))
        .multi_line(flags.contains('m'))
        .dot_matches_new_line(flags.contains('s'))
        .build()
        .map_err(|e| match e {
            regex::Error::Syntax(msg) => msg.lines().last().unwrap_or("invalid pattern").trim().to_string(),
            other => other.to_string(),
        })
}

fn valid_flags(flags: &str) -> bool {
    let mut seen = String::new();
    for c in flags.chars() {
        if !"gimsuy".contains(c) || seen.contains(c) {
            return false;
        }
        seen.push(c);
    }
    true
}

/// Builds a RegExp object; invalid input is a SyntaxError.
pub fn create(interp: &mut Interpreter, pattern: &str, flags: &str) -> Flow<Value> {
    if !valid_flags(flags) {
        return Err(interp.throw(
            ErrorKind::Syntax,
            format!("Invalid flags supplied to RegExp constructor '{}'", flags),
        ));
    }
    let regex = match compile(pattern, flags) {
        Ok(regex) => regex,
        Err(reason) => {
            return Err(interp.throw(
                ErrorKind::Syntax,
                format!("Invalid regular expression: /{}/: {}", pattern, reason),
            ))
        }
    };
    let source: Rc<str> = if pattern.is_empty() { "(?:)".into() } else { pattern.into() };
    Ok(new_object(
        ObjectKind::RegExp(RegExpData {
            source,
            flags: flags.into(),
            regex,
            last_index: 0,
        }),
        Some(interp.realm.regexp_proto.clone()),
    )
    .into())
}

pub fn as_regexp(v: &Value) -> Option<&ObjRef> {
    v.as_object().filter(|o| matches!(o.borrow().kind, ObjectKind::RegExp(_)))
}

// ─── Matching ─────────────────────────────────────────────────────────────────

pub(crate) fn byte_offset(s: &str, chars: usize) -> usize {
    s.char_indices().nth(chars).map_or(s.len(), |(b, _)| b)
}

pub(crate) fn char_offset(s: &str, bytes: usize) -> usize {
    s[..bytes].chars().count()
}

/// One successful match, in byte offsets.
pub struct Match {
    pub start: usize,
    pub end: usize,
    pub groups: Vec<Option<String>>,
    pub named: Vec<(String, Option<String>)>,
}

impl Match {
    fn from_captures(regex: &Regex, caps: &regex::Captures<'_>) -> Self {
        let whole = caps.get(0).map_or(0..0, |m| m.range());
        Self {
            start: whole.start,
            end: whole.end,
            groups: (1..caps.len()).map(|i| caps.get(i).map(|m| m.as_str().to_string())).collect(),
            named: regex
                .capture_names()
                .flatten()
                .map(|name| (name.to_string(), caps.name(name).map(|m| m.as_str().to_string())))
                .collect(),
        }
    }
}

fn regex_of(re: &ObjRef) -> Option<(Regex, bool, bool, usize)> {
    match &re.borrow().kind {
        ObjectKind::RegExp(data) => Some((data.regex.clone(), data.global(), data.sticky(), data.last_index)),
        _ => None,
    }
}

fn set_last_index(re: &ObjRef, value: usize) {
    if let ObjectKind::RegExp(data) = &mut re.borrow_mut().kind {
        data.last_index = value;
    }
}

/// `RegExpBuiltinExec`: honours and updates `lastIndex` for `g`/`y`.
pub fn exec_raw(re: &ObjRef, s: &str) -> Option<Match> {
    let (regex, global, sticky, last_index) = regex_of(re)?;
    let uses_last = global || sticky;
    let start_char = if uses_last { last_index } else { 0 };
    if start_char > s.chars().count() {
        set_last_index(re, 0);
        return None;
    }
    let start = byte_offset(s, start_char);
    let found = regex
        .captures_at(s, start)
        .filter(|caps| !sticky || caps.get(0).map_or(false, |m| m.start() == start))
        .map(|caps| Match::from_captures(&regex, &caps));
    if uses_last {
        set_last_index(re, found.as_ref().map_or(0, |m| char_offset(s, m.end)));
    }
    found
}

/// Every match from the start, advancing past empty matches.
fn all_matches(re: &ObjRef, s: &str) -> Vec<Match> {
    let Some((regex, ..)) = regex_of(re) else {
        return Vec::new();
    };
    regex
        .captures_iter(s)
        .map(|caps| Match::from_captures(&regex, &caps))
        .collect()
}

fn match_array(interp: &mut Interpreter, m: &Match, s: &str) -> Value {
    let mut items = vec![Value::str(&s[m.start..m.end])];
    items.extend(
        m.groups
            .iter()
            .map(|g| g.as_deref().map_or(Value::Undefined, Value::str)),
    );
    let arr = interp.new_array(items);
    let groups = if m.named.is_empty() {
        Value::Undefined
    } else {
        let obj = interp.new_plain();
        for (name, v) in &m.named {
            obj.borrow_mut()
                .set_own(name, v.as_deref().map_or(Value::Undefined, Value::str));
        }
        obj.into()
    };
    {
        let mut a = arr.borrow_mut();
        a.set_own("index", char_offset(s, m.start).into());
        a.set_own("input", Value::str(s));
        a.set_own("groups", groups);
    }
    arr.into()
}

/// Expands `$&`, `$1`, `$<name>` and friends in a replacement template.
fn expand(template: &str, m: &Match, s: &str) -> String {
    let mut out = String::new();
    let chars: Vec<char> = template.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] != '$' || i + 1 >= chars.len() {
            out.push(chars[i]);
            i += 1;
            continue;
        }
        match chars[i + 1] {
            '$' => {
                out.push('$');
                i += 2;
            }
            '&' => {
                out.push_str(&s[m.start..m.end]);
                i += 2;
            }
            '`' => {
                out.push_str(&s[..m.start]);
                i += 2;
            }
            '\'' => {
                out.push_str(&s[m.end..]);
                i += 2;
            }
            '<' if !m.named.is_empty() => match chars[i + 2..].iter().position(|c| *c == '>') {
                Some(len) => {
                    let name: String = chars[i + 2..i + 2 + len].iter().collect();
                    if let Some((_, Some(v))) = m.named.iter().find(|(n, _)| *n == name) {
                        out.push_str(v);
                    }
                    i += len + 3;
                }
                None => {
                    out.push('$');
                    i += 1;
                }
            },
            d if d.is_ascii_digit() => {
                let one = d.to_digit(10).unwrap_or(0) as usize;
                let two = chars
                    .get(i + 2)
                    .and_then(|c| c.to_digit(10))
                    .map(|d2| one * 10 + d2 as usize)
                    .filter(|n| *n >= 1 && *n <= m.groups.len());
                let (index, used) = match two {
                    Some(n) => (n, 3),
                    None => (one, 2),
                };
                if index >= 1 && index <= m.groups.len() {
                    if let Some(g) = &m.groups[index - 1] {
                        out.push_str(g);
                    }
                    i += used;
                } else {
                    out.push('$');
                    i += 1;
                }
            }
            _ => {
                out.push('$');
                i += 1;
            }
        }
    }
    out
}

fn replacement_for(interp: &mut Interpreter, m: &Match, s: &str, replacement: &Value) -> Flow<String> {
    if !replacement.is_callable() {
        let template = interp.to_string(replacement)?;
        return Ok(expand(&template, m, s));
    }
    let mut args = vec![Value::str(&s[m.start..m.end])];
    args.extend(m.groups.iter().map(|g| g.as_deref().map_or(Value::Undefined, Value::str)));
    args.push(char_offset(s, m.start).into());
    args.push(Value::str(s));
    let result = interp.call_function(replacement, Value::Undefined, &args)?;
    Ok(interp.to_string(&result)?.to_string())
}

fn splice_matches(interp: &mut Interpreter, s: &str, matches: &[Match], replacement: &Value) -> Flow<String> {
    let mut out = String::with_capacity(s.len());
    let mut last = 0;
    for m in matches {
        out.push_str(&s[last..m.start]);
        out.push_str(&replacement_for(interp, m, s, replacement)?);
        last = m.end;
    }
    out.push_str(&s[last..]);
    Ok(out)
}

/// `String.prototype.replace` / `replaceAll` with a RegExp pattern.
pub fn replace(interp: &mut Interpreter, re: &ObjRef, s: &str, replacement: &Value) -> Flow<String> {
    let global = regex_of(re).map_or(false, |(_, g, ..)| g);
    let matches = if global {
        set_last_index(re, 0);
        all_matches(re, s)
    } else {
        exec_raw(re, s).into_iter().collect()
    };
    splice_matches(interp, s, &matches, replacement)
}

/// Literal-pattern replacement; `all` replaces every occurrence.
pub fn replace_literal(interp: &mut Interpreter, s: &str, pattern: &str, replacement: &Value, all: bool) -> Flow<String> {
    let mut matches = Vec::new();
    let mut from = 0;
    while from <= s.len() {
        let Some(pos) = s[from..].find(pattern).map(|p| p + from) else {
            break;
        };
        matches.push(Match {
            start: pos,
            end: pos + pattern.len(),
            groups: Vec::new(),
            named: Vec::new(),
        });
        if !all {
            break;
        }
        from = pos + pattern.len().max(1);
        // Keep `from` on a char boundary after an empty pattern.
        while from < s.len() && !s.is_char_boundary(from) {
            from += 1;
        }
    }
    splice_matches(interp, s, &matches, replacement)
}

pub fn split(interp: &mut Interpreter, re: &ObjRef, s: &str, limit: usize) -> Flow<Value> {
    let mut parts: Vec<Value> = Vec::new();
    if s.is_empty() {
        let matches_empty = regex_of(re).map_or(false, |(r, ..)| r.is_match(""));
        if !matches_empty {
            parts.push(Value::str(""));
        }
        return Ok(interp.new_array(parts).into());
    }
    let mut last = 0;
    for m in all_matches(re, s) {
        if m.start == m.end && (m.start == 0 || m.start >= s.len()) {
            continue;
        }
        if m.end == last && m.start == m.end {
            continue;
        }
        parts.push(Value::str(&s[last..m.start]));
        parts.extend(m.groups.iter().map(|g| g.as_deref().map_or(Value::Undefined, Value::str)));
        last = m.end;
    }
    parts.push(Value::str(&s[last..]));
    parts.truncate(limit);
    Ok(interp.new_array(parts).into())
}

/// `String.prototype.match`.
pub fn match_string(interp: &mut Interpreter, re: &ObjRef, s: &str) -> Flow<Value> {
    let global = regex_of(re).map_or(false, |(_, g, ..)| g);
    if !global {
        return Ok(match exec_raw(re, s) {
            Some(m) => match_array(interp, &m, s),
            None => Value::Null,
        });
    }
    set_last_index(re, 0);
    let found: Vec<Value> = all_matches(re, s)
        .iter()
        .map(|m| Value::str(&s[m.start..m.end]))
        .collect();
    if found.is_empty() {
        return Ok(Value::Null);
    }
    Ok(interp.new_array(found).into())
}

/// `String.prototype.matchAll`, materialized.
pub fn match_all(interp: &mut Interpreter, re: &ObjRef, s: &str) -> Flow<Value> {
    let global = regex_of(re).map_or(false, |(_, g, ..)| g);
    if !global {
        return Err(interp.type_error("String.prototype.matchAll called with a non-global RegExp argument"));
    }
    let matches = all_matches(re, s);
    let items = matches.iter().map(|m| match_array(interp, m, s)).collect();
    Ok(interp.new_array(items).into())
}

pub fn search(re: &ObjRef, s: &str) -> Value {
    let found = regex_of(re).and_then(|(r, ..)| r.find(s).map(|m| m.start()));
    Value::Number(found.map_or(-1.0, |b| char_offset(s, b) as f64))
}

// ─── Prototype & constructor ──────────────────────────────────────────────────

pub fn init(interp: &mut Interpreter) {
    let proto = interp.realm.regexp_proto.clone();
    method(interp, &proto, "test", 1, test);
    method(interp, &proto, "exec", 1, exec);
    method(interp, &proto, "toString", 0, to_string);
}

fn this_regexp(interp: &mut Interpreter, this: &Value, name: &str) -> Flow<ObjRef> {
    match as_regexp(this) {
        Some(re) => Ok(re.clone()),
        None => Err(interp.type_error(format!(
            "Method RegExp.prototype.{} called on incompatible receiver",
            name
        ))),
    }
}

fn test(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    let re = this_regexp(interp, this, "test")?;
    let s = interp.to_string(&arg(args, 0))?;
    Ok(exec_raw(&re, &s).is_some().into())
}

fn exec(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    let re = this_regexp(interp, this, "exec")?;
    let s = interp.to_string(&arg(args, 0))?;
    Ok(match exec_raw(&re, &s) {
        Some(m) => match_array(interp, &m, &s),
        None => Value::Null,
    })
}

fn to_string(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> Flow<Value> {
    let re = this_regexp(interp, this, "toString")?;
    let text = match &re.borrow().kind {
        ObjectKind::RegExp(data) => format!("/{}/{}", data.source, data.flags),
        _ => String::new(),
    };
    Ok(text.into())
}

fn regexp_call(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
    let (pattern, inherited_flags) = match as_regexp(&arg(args, 0)) {
        Some(re) => match &re.borrow().kind {
            ObjectKind::RegExp(data) => (data.source.to_string(), data.flags.to_string()),
            _ => (String::new(), String::new()),
        },
        None => match arg(args, 0) {
            Value::Undefined => (String::new(), String::new()),
            v => (interp.to_string(&v)?.to_string(), String::new()),
        },
    };
    let flags = match arg(args, 1) {
        Value::Undefined => inherited_flags,
        v => interp.to_string(&v)?.to_string(),
    };
    let pattern = if pattern == "(?:)" { String::new() } else { pattern };
    create(interp, &pattern, &flags)
}

fn regexp_construct(interp: &mut Interpreter, _new_target: &Value, args: &[Value]) -> Flow<Value> {
    regexp_call(interp, &Value::Undefined, args)
}

fn install(interp: &mut Interpreter) -> Value {
    let proto = interp.realm.regexp_proto.clone();
    constructor(interp, "RegExp", 2, regexp_call, regexp_construct, &proto).into()
}

inventory::submit! {
    Facility { name: "RegExp", install }
}

#[cfg(test)]
mod tests {
    use super::translate;
    use crate::script::builtins::test_support::{eval_logged, run_logs, run_script};

    #[test]
    fn translation_rewrites_javascript_only_syntax() {
        assert_eq!(translate(r"\d+\w").unwrap(), "[0-9]+[0-9A-Za-z_]");
        assert_eq!(translate(r"[^]").unwrap(), r"[\s\S]");
        assert_eq!(translate(r"\u0041").unwrap(), r"\x{41}");
        assert_eq!(translate(r"(?<year>\d{4})").unwrap(), r"(?P<year>[0-9]{4})");
        assert_eq!(translate(r"a\/b").unwrap(), "a/b");
        assert_eq!(translate(r"x{").unwrap(), r"x\{");
        assert!(translate(r"(?=a)").is_err());
        assert!(translate(r"(a)\1").is_err());
    }

    #[test]
    fn literals_test_and_exec() {
        let out = run_logs(
            "const re = /(\\w+)@(\\w+)\\.com/i;\n\
             console.log(re.test('Mail: ADA@example.com'));\n\
             const m = re.exec('x ada@example.com');\n\
             console.log(m[0], m[1], m[2], m.index);\n\
             console.log(/a/.exec('bbb'));\n\
             console.log(String(/x+/gi), re.source, re.flags, re.global);",
        );
        assert_eq!(
            out,
            vec!["true", "ada@example.com ada example 2", "null", "/x+/gi (\\w+)@(\\w+)\\.com i false"]
        );
    }

    #[test]
    fn global_exec_walks_last_index() {
        let out = run_logs(
            "const re = /o/g; const s = 'foo boo';\n\
             const seen = [];\n\
             let m;\n\
             while ((m = re.exec(s)) !== null) seen.push(m.index);\n\
             console.log(seen.join(), re.lastIndex);",
        );
        assert_eq!(out, vec!["1,2,5,6 0"]);
    }

    #[test]
    fn named_groups() {
        assert_eq!(eval_logged("'2024-05'.match(/(?<y>\\d+)-(?<m>\\d+)/).groups.m"), "05");
        assert_eq!(eval_logged("'2024-05'.replace(/(?<y>\\d+)-(?<m>\\d+)/, '$<m>/$<y>')"), "05/2024");
    }

    #[test]
    fn constructor_and_errors() {
        assert_eq!(eval_logged("new RegExp('a.c', 'g').test('abc')"), "true");
        assert_eq!(eval_logged("RegExp(/x/g).flags"), "g");
        assert_eq!(eval_logged("new RegExp('').source"), "(?:)");
        let (result, _) = run_script("new RegExp('(', '');");
        assert!(result.unwrap_err().to_string().starts_with("SyntaxError: Invalid regular expression: /(/"));
        let (result, _) = run_script("new RegExp('a', 'q');");
        assert_eq!(
            result.unwrap_err().to_string(),
            "SyntaxError: Invalid flags supplied to RegExp constructor 'q'"
        );
        let (result, _) = run_script("/(?<=a)b/;");
        assert!(result.unwrap_err().to_string().contains("lookaround assertions are not supported"));
    }

    #[test]
    fn sticky_matches_only_at_last_index() {
        assert_eq!(eval_logged("(() => { const r = /b/y; r.lastIndex = 1; return [r.test('abc'), r.test('abc')].join(); })()"), "true,false");
    }
}
