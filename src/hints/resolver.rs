//! Line-oriented type guessing.
//!
//! Given the buffer's lines, the cursor line and the text before the cursor,
//! find the identifier left of the trailing dot and guess its type from the
//! nearest declaration above, falling back to its name.

use once_cell::sync::Lazy;
use regex::Regex;

use super::TypeGuess;

static IDENT_BEFORE_DOT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([A-Za-z_$][\w$]*)\s*\.\s*\w*$").expect("valid regex"));

static ARRAY_VALUE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\[.*\]$").expect("valid regex"));
static STRING_VALUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^['"`].*['"`]$"#).expect("valid regex"));
static NUMBER_VALUE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+(\.\d+)?$").expect("valid regex"));
static FUNCTION_VALUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^function\s*\(").expect("valid regex"));
static OBJECT_VALUE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\{.*\}$").expect("valid regex"));
static BOOLEAN_VALUE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(true|false)$").expect("valid regex"));
static CONSTRUCTED_VALUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^new\s+(Array|String|Number|Object|Boolean)\(").expect("valid regex")
});

const ARRAY_NAMES: &[&str] = &["array", "arr", "list", "items", "elements", "data"];
const STRING_NAMES: &[&str] = &["str", "text", "message", "name", "title", "content"];
const NUMBER_NAMES: &[&str] = &["num", "count", "index", "id", "age", "price"];
const FUNCTION_NAMES: &[&str] = &["func", "fn", "callback"];
const BOOLEAN_NAMES: &[&str] = &["bool", "flag", "is"];

/// Guess for the receiver at the end of `before_cursor`.
pub fn resolve(lines: &[&str], cursor_line: usize, before_cursor: &str) -> TypeGuess {
    let Some(name) = identifier_before_dot(before_cursor) else {
        return TypeGuess::General;
    };
    if let Some(guess) = declared_type(lines, cursor_line, name) {
        return guess;
    }
    classify_name(name)
}

/// The identifier directly left of the last dot, if the text ends in
/// `ident.` or `ident.partial`.
pub fn identifier_before_dot(before_cursor: &str) -> Option<&str> {
    IDENT_BEFORE_DOT
        .captures(before_cursor)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

fn declaration_pattern(name: &str) -> Regex {
    let name = regex::escape(name);
    let pattern = format!(
        r"(?:const|let|var)\s+{name}\s*(?::\s*(?P<ty>.+?)\s*)?=\s*(?P<value>.+)"
    );
    Regex::new(&pattern).expect("escaped identifier forms a valid regex")
}

/// Nearest declaration of `name` at or above `cursor_line`.
fn declared_type(lines: &[&str], cursor_line: usize, name: &str) -> Option<TypeGuess> {
    let pattern = declaration_pattern(name);
    let last = cursor_line.min(lines.len().checked_sub(1)?);
    for line in lines[..=last].iter().rev() {
        let Some(caps) = pattern.captures(line) else {
            continue;
        };
        if let Some(guess) = caps.name("ty").and_then(|t| classify_annotation(t.as_str())) {
            return Some(guess);
        }
        let value = caps.name("value").map_or("", |v| v.as_str());
        return Some(classify_value(value.trim().trim_end_matches(';').trim_end()));
    }
    None
}

/// Type of an annotation, or `None` when the annotation says nothing the
/// hint tables care about.
pub fn classify_annotation(annotation: &str) -> Option<TypeGuess> {
    let t = annotation.trim();
    if t.contains("[]") || t.contains("Array<") || t.contains("ReadonlyArray<") {
        return Some(TypeGuess::Array);
    }
    if t.starts_with('{') {
        return Some(TypeGuess::Object);
    }
    let has = |words: &[&str]| words.iter().any(|w| t.contains(w));
    if has(&["string", "String"]) {
        Some(TypeGuess::String)
    } else if has(&["number", "Number"]) {
        Some(TypeGuess::Number)
    } else if has(&["Function", "=>"]) {
        Some(TypeGuess::Function)
    } else if has(&["object", "Object", "interface"]) {
        Some(TypeGuess::Object)
    } else if has(&["boolean", "Boolean"]) {
        Some(TypeGuess::Boolean)
    } else {
        None
    }
}

/// Type of an initializer expression; anything unrecognised is an Object.
pub fn classify_value(value: &str) -> TypeGuess {
    let v = value.trim();
    if ARRAY_VALUE.is_match(v) {
        TypeGuess::Array
    } else if STRING_VALUE.is_match(v) {
        TypeGuess::String
    } else if NUMBER_VALUE.is_match(v) {
        TypeGuess::Number
    } else if FUNCTION_VALUE.is_match(v) {
        TypeGuess::Function
    } else if OBJECT_VALUE.is_match(v) {
        TypeGuess::Object
    } else if BOOLEAN_VALUE.is_match(v) {
        TypeGuess::Boolean
    } else if let Some(caps) = CONSTRUCTED_VALUE.captures(v) {
        match &caps[1] {
            "Array" => TypeGuess::Array,
            "String" => TypeGuess::String,
            "Number" => TypeGuess::Number,
            "Boolean" => TypeGuess::Boolean,
            _ => TypeGuess::Object,
        }
    } else {
        TypeGuess::Object
    }
}

/// Guess from the identifier alone, by keywords in its lower-cased form.
pub fn classify_name(name: &str) -> TypeGuess {
    let lower = name.to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| lower.contains(w));
    if has(ARRAY_NAMES) {
        TypeGuess::Array
    } else if has(STRING_NAMES) {
        TypeGuess::String
    } else if has(NUMBER_NAMES) {
        TypeGuess::Number
    } else if has(FUNCTION_NAMES) {
        TypeGuess::Function
    } else if has(BOOLEAN_NAMES) {
        TypeGuess::Boolean
    } else {
        TypeGuess::Object
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve_text(text: &str) -> TypeGuess {
        let lines: Vec<&str> = text.split('\n').collect();
        let last = lines.len() - 1;
        resolve(&lines, last, lines[last])
    }

    #[test]
    fn annotation_wins_over_the_name() {
        let src = "const data: string[] = ['a', 'b'];\nconsole.log(1);\ndata.";
        assert_eq!(resolve_text(src), TypeGuess::Array);
        let src = "let title: Array<number> = [];\ntitle.";
        assert_eq!(resolve_text(src), TypeGuess::Array);
    }

    #[test]
    fn undeclared_identifiers_fall_back_to_their_name() {
        assert_eq!(resolve_text("userList."), TypeGuess::Array);
        assert_eq!(resolve_text("pageTitle."), TypeGuess::String);
        assert_eq!(resolve_text("retryCount."), TypeGuess::Number);
        assert_eq!(resolve_text("onDoneCallback."), TypeGuess::Function);
        assert_eq!(resolve_text("thing."), TypeGuess::Object);
    }

    #[test]
    fn no_dot_means_general() {
        assert_eq!(resolve_text("cons"), TypeGuess::General);
        assert_eq!(resolve_text(""), TypeGuess::General);
    }

    #[test]
    fn values_classify_unannotated_declarations() {
        assert_eq!(resolve_text("let x = 'hi';\nx."), TypeGuess::String);
        assert_eq!(resolve_text("var x = 42;\nx.to"), TypeGuess::Number);
        assert_eq!(resolve_text("const x = [1, 2];\nx."), TypeGuess::Array);
        assert_eq!(resolve_text("const x = function (a) {};\nx."), TypeGuess::Function);
        assert_eq!(resolve_text("const x = true;\nx."), TypeGuess::Boolean);
        assert_eq!(resolve_text("const x = new String('a');\nx."), TypeGuess::String);
        assert_eq!(resolve_text("const x = compute();\nx."), TypeGuess::Object);
    }

    #[test]
    fn nearest_declaration_above_the_cursor_wins() {
        let lines = ["let v = 1;", "v = 2;", "let v = 'two';", "v."];
        assert_eq!(resolve(&lines, 3, "v."), TypeGuess::String);
        assert_eq!(resolve(&lines, 1, "v."), TypeGuess::Number);
    }

    #[test]
    fn unknown_annotations_defer_to_the_value() {
        assert_eq!(classify_annotation("User"), None);
        assert_eq!(classify_annotation("{ a: string }"), Some(TypeGuess::Object));
        assert_eq!(classify_annotation("() => void"), Some(TypeGuess::Function));
        assert_eq!(resolve_text("const u: User = [1];\nu."), TypeGuess::Array);
    }

    #[test]
    fn identifier_extraction() {
        assert_eq!(identifier_before_dot("  foo.bar"), Some("foo"));
        assert_eq!(identifier_before_dot("a.b."), Some("b"));
        assert_eq!(identifier_before_dot("x = $el."), Some("$el"));
        assert_eq!(identifier_before_dot("no dot"), None);
    }
}
