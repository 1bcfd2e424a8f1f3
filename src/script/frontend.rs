//! Source parsing through `swc_ecma_parser`.
//!
//! Both the interpreter and the TypeScript stripper parse here. Offsets
//! handed out by [`Parsed`] are byte offsets into the original text.

use std::ops::Range;

use swc_common::{sync::Lrc, BytePos, FileName, SourceMap, Span, Spanned, GLOBALS};
use swc_ecma_ast::{EsVersion, Module};
use swc_ecma_parser::{error::Error, lexer::Lexer, EsConfig, Parser, StringInput, Syntax, TsConfig};

use super::error::SyntaxError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Grammar {
    JavaScript,
    TypeScript,
}

impl Grammar {
    fn syntax(self) -> Syntax {
        match self {
            Grammar::JavaScript => Syntax::Es(EsConfig::default()),
            Grammar::TypeScript => Syntax::Typescript(TsConfig {
                tsx: false,
                dts: false,
                ..Default::default()
            }),
        }
    }
}

/// A parsed program plus what is needed to map its spans back to text.
pub struct Parsed<'a> {
    pub module: Module,
    /// Errors the parser recovered from, in source order.
    pub recovered: Vec<SyntaxError>,
    src: &'a str,
    start: BytePos,
}

impl<'a> Parsed<'a> {
    pub fn offset(&self, pos: BytePos) -> usize {
        (pos.0.saturating_sub(self.start.0) as usize).min(self.src.len())
    }

    pub fn range(&self, span: Span) -> Range<usize> {
        self.offset(span.lo)..self.offset(span.hi)
    }

    pub fn text(&self, span: Span) -> &'a str {
        let src: &'a str = self.src;
        src.get(self.range(span)).unwrap_or_default()
    }

    pub fn error_at(&self, span: Span, message: impl Into<String>) -> SyntaxError {
        located(self.src, self.offset(span.lo), message)
    }
}

/// 1-based line and column (in chars) of a byte offset.
pub fn position(src: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(src.len());
    let before = src.get(..offset).unwrap_or(src);
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    let line = before.matches('\n').count() + 1;
    let column = before[line_start..].chars().count() + 1;
    (line, column)
}

pub fn located(src: &str, offset: usize, message: impl Into<String>) -> SyntaxError {
    let (line, column) = position(src, offset);
    SyntaxError {
        message: message.into(),
        line,
        column,
    }
}

/// Parses `src` with module goal, so top-level `await` is accepted.
/// Import and export declarations are left for the caller to reject.
pub fn parse(src: &str, grammar: Grammar) -> Result<Parsed<'_>, SyntaxError> {
    let cm: Lrc<SourceMap> = Default::default();
    GLOBALS.set(&Default::default(), || {
        let fm = cm.new_source_file(FileName::Anon, src.to_string());
        let start = fm.start_pos;
        let convert = |e: Error| located(src, (e.span().lo.0.saturating_sub(start.0)) as usize, e.kind().msg());

        let lexer = Lexer::new(grammar.syntax(), EsVersion::Es2022, StringInput::from(&*fm), None);
        let mut parser = Parser::new_from(lexer);
        let result = parser.parse_module();
        let mut recovered: Vec<SyntaxError> = parser.take_errors().into_iter().map(&convert).collect();
        recovered.sort_by_key(|e| (e.line, e.column));
        match result {
            Ok(module) => Ok(Parsed {
                module,
                recovered,
                src,
                start,
            }),
            Err(e) => Err(convert(e)),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_count_chars_from_one() {
        let src = "let a = 1;\nlet é = ;";
        assert_eq!(position(src, 0), (1, 1));
        assert_eq!(position(src, src.find(';').unwrap_or(0)), (1, 10));
        assert_eq!(position(src, src.rfind(';').unwrap_or(0)), (2, 9));
    }

    #[test]
    fn spans_map_back_to_text() {
        let src = "const greeting = 'hi';\nfunction f() { return 1 }";
        let parsed = parse(src, Grammar::JavaScript).unwrap();
        assert_eq!(parsed.text(parsed.module.body[1].span()), "function f() { return 1 }");
        assert!(parsed.recovered.is_empty());
    }

    fn fails(src: &str, grammar: Grammar) -> bool {
        parse(src, grammar).map_or(true, |p| !p.recovered.is_empty())
    }

    #[test]
    fn type_syntax_needs_the_typescript_grammar() {
        assert!(!fails("let n: number = 1;", Grammar::TypeScript));
        assert!(fails("let n: number = 1;", Grammar::JavaScript));
        let err = match parse("let x = 1;\nlet y = ;", Grammar::JavaScript) {
            Ok(parsed) => parsed.recovered.into_iter().next(),
            Err(e) => Some(e),
        };
        assert_eq!(err.map(|e| e.line), Some(2));
    }
}
