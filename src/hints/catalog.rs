//! Static member tables offered by the hint popup.

use super::TypeGuess;
use crate::dialect::Dialect;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HintEntry {
    /// Inserted on accept.
    pub text: &'static str,
    pub description: &'static str,
}

const fn hint(text: &'static str, description: &'static str) -> HintEntry {
    HintEntry { text, description }
}

pub static ARRAY: &[HintEntry] = &[
    hint("push()", "append to the end"),
    hint("pop()", "remove the last element"),
    hint("shift()", "remove the first element"),
    hint("unshift()", "prepend to the start"),
    hint("slice()", "copy a section"),
    hint("splice()", "remove or insert in place"),
    hint("concat()", "join with other arrays"),
    hint("join()", "concatenate into a string"),
    hint("reverse()", "reverse in place"),
    hint("sort()", "sort in place"),
    hint("filter()", "keep matching elements"),
    hint("map()", "transform each element"),
    hint("reduce()", "fold into one value"),
    hint("forEach()", "visit each element"),
    hint("find()", "first matching element"),
    hint("findIndex()", "index of the first match"),
    hint("includes()", "check for a value"),
    hint("indexOf()", "index of a value"),
    hint("length", "number of elements"),
];

pub static STRING: &[HintEntry] = &[
    hint("charAt()", "character at an index"),
    hint("charCodeAt()", "code point at a code point index"),
    hint("concat()", "join with other strings"),
    hint("includes()", "check for a substring"),
    hint("indexOf()", "first index of a substring"),
    hint("lastIndexOf()", "last index of a substring"),
    hint("match()", "match against a regex"),
    hint("replace()", "replace a match"),
    hint("search()", "index of a regex match"),
    hint("slice()", "extract a section"),
    hint("split()", "split into an array"),
    hint("substring()", "characters between two indices"),
    hint("toLowerCase()", "convert to lower case"),
    hint("toUpperCase()", "convert to upper case"),
    hint("trim()", "strip surrounding whitespace"),
    hint("trimStart()", "strip leading whitespace"),
    hint("trimEnd()", "strip trailing whitespace"),
    hint("padStart()", "pad at the start"),
    hint("padEnd()", "pad at the end"),
    hint("startsWith()", "check the prefix"),
    hint("endsWith()", "check the suffix"),
    hint("length", "number of code points ('😀'.length is 1)"),
];

pub static OBJECT: &[HintEntry] = &[
    hint("keys()", "Object.keys(obj) - own keys"),
    hint("values()", "Object.values(obj) - own values"),
    hint("entries()", "Object.entries(obj) - key/value pairs"),
    hint("assign()", "Object.assign(target, ...sources) - copy properties"),
    hint("create()", "Object.create(proto) - new object with a prototype"),
    hint("defineProperty()", "Object.defineProperty(obj, prop, descriptor)"),
    hint("freeze()", "Object.freeze(obj) - make immutable"),
    hint("seal()", "Object.seal(obj) - forbid adding properties"),
    hint("is()", "Object.is(a, b) - same-value comparison"),
    hint("hasOwnProperty()", "hasOwnProperty(prop) - own property check"),
    hint("toString()", "toString() - string form"),
    hint("valueOf()", "valueOf() - primitive value"),
];

pub static NUMBER: &[HintEntry] = &[
    hint("toFixed()", "toFixed(digits) - fixed-point notation"),
    hint("toPrecision()", "toPrecision(precision) - significant digits"),
    hint("toString()", "toString(radix) - string form"),
    hint("valueOf()", "valueOf() - primitive value"),
    hint("toExponential()", "toExponential(fractionDigits) - exponential notation"),
    hint("parseInt()", "parseInt(string, radix) - parse an integer"),
    hint("parseFloat()", "parseFloat(string) - parse a float"),
    hint("isNaN()", "isNaN(value) - check for NaN"),
    hint("isFinite()", "isFinite(value) - check for a finite number"),
    hint("MAX_VALUE", "Number.MAX_VALUE - largest number"),
    hint("MIN_VALUE", "Number.MIN_VALUE - smallest positive number"),
    hint("POSITIVE_INFINITY", "Number.POSITIVE_INFINITY"),
    hint("NEGATIVE_INFINITY", "Number.NEGATIVE_INFINITY"),
];

pub static FUNCTION: &[HintEntry] = &[
    hint("call()", "call with an explicit this"),
    hint("apply()", "call with an argument array"),
    hint("bind()", "fix this and leading arguments"),
    hint("toString()", "source text"),
    hint("length", "number of declared parameters"),
    hint("name", "function name"),
];

pub static BOOLEAN: &[HintEntry] = &[
    hint("toString()", "\"true\" or \"false\""),
    hint("valueOf()", "primitive value"),
];

pub static GENERAL: &[HintEntry] = &[
    hint("console.log()", "print to the output"),
    hint("console.error()", "print an error"),
    hint("console.warn()", "print a warning"),
    hint("console.info()", "print information"),
    hint("setTimeout()", "run later"),
    hint("setInterval()", "run repeatedly"),
    hint("clearTimeout()", "cancel a timeout"),
    hint("clearInterval()", "cancel an interval"),
    hint("JSON.stringify()", "convert to JSON"),
    hint("JSON.parse()", "parse JSON"),
    hint("Math.random()", "random number in [0, 1)"),
    hint("Math.floor()", "round down"),
    hint("Math.ceil()", "round up"),
    hint("Math.round()", "round to nearest"),
    hint("Math.abs()", "absolute value"),
    hint("Math.max()", "largest argument"),
    hint("Math.min()", "smallest argument"),
    hint("Date.now()", "current time in milliseconds"),
    hint("new Date()", "create a date"),
    hint("Array.isArray()", "check for an array"),
    hint("typeof", "type of a value"),
    hint("instanceof", "prototype chain check"),
    hint("try", "guarded block"),
    hint("catch", "handle an error"),
    hint("finally", "always-run block"),
    hint("throw", "raise an error"),
    hint("async", "asynchronous function"),
    hint("await", "wait for a promise"),
    hint("Promise.resolve()", "already fulfilled promise"),
    hint("Promise.reject()", "already rejected promise"),
];

pub static TYPESCRIPT: &[HintEntry] = &[
    hint("interface", "declare an interface"),
    hint("type", "declare a type alias"),
    hint("enum", "declare an enumeration"),
    hint("namespace", "declare a namespace"),
    hint("export", "export a declaration"),
    hint("import", "import a module"),
    hint("extends", "inherit"),
    hint("implements", "implement an interface"),
    hint("readonly", "read-only member"),
    hint("optional", "optional member (name?: T)"),
    hint("union", "union type (A | B)"),
    hint("intersection", "intersection type (A & B)"),
    hint("generic", "generic parameter <T>"),
    hint("keyof", "keys of a type"),
    hint("typeof", "type of a value"),
    hint("infer", "infer within a conditional type"),
    hint("satisfies", "check without widening"),
    hint("as const", "literal, read-only assertion"),
    hint("Partial<T>", "all properties optional"),
    hint("Required<T>", "all properties required"),
    hint("Pick<T, K>", "keep some properties"),
    hint("Omit<T, K>", "drop some properties"),
    hint("Record<K, T>", "map keys to a type"),
    hint("ReturnType<T>", "return type of a function"),
    hint("Parameters<T>", "parameter types of a function"),
];

/// Entries offered for `guess`. TypeScript keywords only join the general
/// table.
pub fn lookup(guess: TypeGuess, dialect: Dialect) -> Vec<HintEntry> {
    let table = match guess {
        TypeGuess::Array => ARRAY,
        TypeGuess::String => STRING,
        TypeGuess::Object => OBJECT,
        TypeGuess::Number => NUMBER,
        TypeGuess::Function => FUNCTION,
        TypeGuess::Boolean => BOOLEAN,
        TypeGuess::General => GENERAL,
    };
    let mut entries = table.to_vec();
    if guess == TypeGuess::General && dialect.is_typed() {
        entries.extend_from_slice(TYPESCRIPT);
    }
    entries
}

/// Entries whose text contains `word`, ignoring case.
pub fn filter(entries: Vec<HintEntry>, word: &str) -> Vec<HintEntry> {
    if word.is_empty() {
        return entries;
    }
    let needle = word.to_lowercase();
    entries
        .into_iter()
        .filter(|e| e.text.to_lowercase().contains(&needle))
        .collect()
}

/// Icon family of a hint, decided by substrings of its text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HintKind {
    Console,
    Builtin,
    Function,
    Variable,
    Control,
    TypeScript,
    Class,
    Module,
    Error,
    General,
}

impl HintKind {
    /// Short badge drawn in front of a hint.
    pub fn badge(self) -> &'static str {
        match self {
            HintKind::Console => ">_",
            HintKind::Builtin => "B",
            HintKind::Function => "ƒ",
            HintKind::Variable => "v",
            HintKind::Control => "↻",
            HintKind::TypeScript => "T",
            HintKind::Class => "C",
            HintKind::Module => "M",
            HintKind::Error => "!",
            HintKind::General => "•",
        }
    }

    pub fn classify(text: &str) -> Self {
        let has = |words: &[&str]| words.iter().any(|w| text.contains(w));
        if has(&["console."]) {
            HintKind::Console
        } else if has(&["Math.", "Date.", "Array.", "String.", "Object.", "Number.", "Boolean."]) {
            HintKind::Builtin
        } else if has(&["function", "async", "await"]) {
            HintKind::Function
        } else if has(&["const", "let", "var"]) {
            HintKind::Variable
        } else if has(&["if", "else", "for", "while"]) {
            HintKind::Control
        } else if has(&["interface", "type", "enum"]) {
            HintKind::TypeScript
        } else if has(&["class", "extends", "implements"]) {
            HintKind::Class
        } else if has(&["import", "export"]) {
            HintKind::Module
        } else if has(&["try", "catch", "throw"]) {
            HintKind::Error
        } else {
            HintKind::General
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filtering_keeps_exactly_the_matching_entries() {
        let all = lookup(TypeGuess::Array, Dialect::JavaScript);
        let kept = filter(all.clone(), "pu");
        let expected: Vec<HintEntry> = all
            .iter()
            .copied()
            .filter(|e| e.text.to_lowercase().contains("pu"))
            .collect();
        assert_eq!(kept, expected);
        assert!(kept.iter().any(|e| e.text == "push()"));
        assert!(kept.iter().all(|e| e.text != "pop()"));
    }

    #[test]
    fn filtering_ignores_case() {
        let kept = filter(lookup(TypeGuess::String, Dialect::JavaScript), "UPPER");
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].text, "toUpperCase()");
    }

    #[test]
    fn typescript_keywords_only_extend_the_general_table() {
        let js = lookup(TypeGuess::General, Dialect::JavaScript);
        let ts = lookup(TypeGuess::General, Dialect::TypeScript);
        assert_eq!(ts.len(), js.len() + TYPESCRIPT.len());
        assert!(ts.iter().any(|e| e.text == "Partial<T>"));
        assert_eq!(
            lookup(TypeGuess::Array, Dialect::TypeScript),
            lookup(TypeGuess::Array, Dialect::JavaScript)
        );
    }

    #[test]
    fn kinds_follow_the_first_matching_rule() {
        assert_eq!(HintKind::classify("console.log()"), HintKind::Console);
        assert_eq!(HintKind::classify("Math.max()"), HintKind::Builtin);
        assert_eq!(HintKind::classify("await"), HintKind::Function);
        assert_eq!(HintKind::classify("as const"), HintKind::Variable);
        assert_eq!(HintKind::classify("interface"), HintKind::TypeScript);
        assert_eq!(HintKind::classify("implements"), HintKind::Class);
        assert_eq!(HintKind::classify("import"), HintKind::Module);
        assert_eq!(HintKind::classify("catch"), HintKind::Error);
        assert_eq!(HintKind::classify("push()"), HintKind::General);
    }
}
