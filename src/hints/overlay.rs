//! Hint session state machine.
//!
//! The overlay is either closed or holds one [`HintSession`]. Opening a new
//! session replaces the old one. The popup in `code_panel::hint_popup` only
//! draws the session and forwards input here as [`OverlayEvent`]s.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::catalog::{self, HintEntry};
use super::resolver;
use super::TypeGuess;
use crate::dialect::Dialect;
use crate::editor::EditorSurface;

pub const DEFAULT_MAX_VISIBLE: usize = 8;

static AFTER_DOT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.\s*$").expect("valid regex"));
static LEADING_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\w*$").expect("valid regex"));
static PARTIAL_MEMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.\s*\w+$").expect("valid regex"));
static MEMBER_TAIL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.(\s*[\w$]*)$").expect("valid regex"));

/// Whether the text before `cursor_col` on `line` asks for hints: it ends
/// in a dot, or it is a lone word at the start of the line.
pub fn should_show_hints(line: &str, cursor_col: usize) -> bool {
    let before: String = line.chars().take(cursor_col).collect();
    AFTER_DOT.is_match(&before) || LEADING_WORD.is_match(&before)
}

/// Run of word characters directly before the cursor.
pub fn current_word(before_cursor: &str) -> &str {
    let start = before_cursor
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_alphanumeric() || *c == '_' || *c == '$')
        .last()
        .map_or(before_cursor.len(), |(i, _)| i);
    &before_cursor[start..]
}

/// Char range an accepted hint replaces: from just after the last dot to
/// the cursor, or the partial word when the line has no trailing member.
pub fn replacement_span(editor: &impl EditorSurface) -> (usize, usize) {
    let before = editor.before_cursor();
    let cursor = editor.cursor();
    let tail = match MEMBER_TAIL.captures(&before) {
        Some(caps) => caps[1].chars().count(),
        None => current_word(&before).chars().count(),
    };
    (cursor - tail, cursor)
}

#[derive(Clone, Debug, PartialEq)]
pub struct HintSession {
    pub guess: TypeGuess,
    /// Visible entries, at most `max_visible`.
    pub entries: Vec<HintEntry>,
    /// Matches before the visible cap.
    pub total: usize,
    pub selected: usize,
    /// Char range an accept would replace when the session opened. The
    /// commit recomputes it against the live buffer.
    pub span: (usize, usize),
}

impl HintSession {
    pub fn selected_entry(&self) -> Option<&HintEntry> {
        self.entries.get(self.selected)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverlayEvent {
    Next,
    Previous,
    /// Enter or Tab.
    Accept,
    /// Escape.
    Dismiss,
    Hover(usize),
    Click(usize),
    OutsideClick,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OverlayOutcome {
    /// No session was open; the event belongs to the editor.
    Ignored,
    SelectionMoved,
    Closed,
    /// The buffer was edited and the cursor now sits after `text`.
    Committed { text: &'static str, cursor: usize },
}

impl OverlayOutcome {
    pub fn changed_buffer(&self) -> bool {
        matches!(self, OverlayOutcome::Committed { .. })
    }
}

pub struct HintOverlay {
    session: Option<HintSession>,
    max_visible: usize,
}

impl Default for HintOverlay {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_VISIBLE)
    }
}

impl HintOverlay {
    pub fn new(max_visible: usize) -> Self {
        Self {
            session: None,
            max_visible: max_visible.max(1),
        }
    }

    pub fn session(&self) -> Option<&HintSession> {
        self.session.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    pub fn close(&mut self) {
        self.session = None;
    }

    /// Re-evaluates the cursor context and opens, replaces or closes the
    /// session. `explicit` is set for a keyboard request, which may open
    /// the general table on an empty word.
    pub fn trigger(&mut self, editor: &impl EditorSurface, dialect: Dialect, explicit: bool) -> bool {
        let pos = editor.cursor_position();
        let line = editor.line(pos.line).unwrap_or_default();
        let before = editor.before_cursor();
        let word = current_word(&before);

        let wanted = if should_show_hints(line, pos.column) {
            AFTER_DOT.is_match(&before) || explicit || !word.is_empty()
        } else {
            self.is_open() && PARTIAL_MEMBER.is_match(&before)
        };
        if !wanted {
            self.close();
            return false;
        }

        let lines = editor.lines();
        let guess = resolver::resolve(&lines, pos.line, &before);
        let matches = catalog::filter(catalog::lookup(guess, dialect), word);
        debug!(?guess, word, matches = matches.len(), "hint trigger");
        if matches.is_empty() {
            self.close();
            return false;
        }

        let total = matches.len();
        let entries = matches.into_iter().take(self.max_visible).collect();
        self.session = Some(HintSession {
            guess,
            entries,
            total,
            selected: 0,
            span: replacement_span(editor),
        });
        true
    }

    pub fn handle(&mut self, event: OverlayEvent, editor: &mut impl EditorSurface) -> OverlayOutcome {
        let Some(session) = self.session.as_mut() else {
            return OverlayOutcome::Ignored;
        };
        let len = session.entries.len();
        match event {
            OverlayEvent::Next => {
                session.selected = (session.selected + 1) % len;
                OverlayOutcome::SelectionMoved
            }
            OverlayEvent::Previous => {
                session.selected = (session.selected + len - 1) % len;
                OverlayOutcome::SelectionMoved
            }
            OverlayEvent::Hover(i) if i < len => {
                session.selected = i;
                OverlayOutcome::SelectionMoved
            }
            OverlayEvent::Hover(_) => OverlayOutcome::SelectionMoved,
            OverlayEvent::Accept => {
                let text = session.selected_entry().map(|e| e.text);
                self.commit(text, editor)
            }
            OverlayEvent::Click(i) if i < len => {
                let text = session.entries[i].text;
                self.commit(Some(text), editor)
            }
            OverlayEvent::Click(_) | OverlayEvent::Dismiss | OverlayEvent::OutsideClick => {
                self.close();
                OverlayOutcome::Closed
            }
        }
    }

    /// Replaces the span under the cursor as it is now; the buffer may have
    /// changed since the session opened.
    fn commit(&mut self, text: Option<&'static str>, editor: &mut impl EditorSurface) -> OverlayOutcome {
        self.session = None;
        let Some(text) = text else {
            return OverlayOutcome::Closed;
        };
        let (start, end) = replacement_span(editor);
        let cursor = editor.replace_range(start, end, text);
        editor.set_cursor(cursor);
        debug!(text, "hint committed");
        OverlayOutcome::Committed { text, cursor }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::CodeBuffer;

    #[test]
    fn trailing_dot_always_shows_hints() {
        for before in ["xs.", "a.b.", "  foo(1).", "x .  ", "const v = obj.", "."] {
            let line = format!("{}rest of line", before);
            assert!(should_show_hints(&line, before.chars().count()), "{:?}", before);
        }
        assert!(should_show_hints("cons", 4));
        assert!(!should_show_hints("const x = 1", 11));
    }

    #[test]
    fn current_word_stops_at_non_word_chars() {
        assert_eq!(current_word("xs.pu"), "pu");
        assert_eq!(current_word("xs."), "");
        assert_eq!(current_word("  cons"), "cons");
        assert_eq!(current_word("$el"), "$el");
    }

    #[test]
    fn dot_opens_a_typed_session() {
        let buffer = CodeBuffer::new("const items = [1, 2];\nitems.");
        let mut overlay = HintOverlay::default();
        assert!(overlay.trigger(&buffer, Dialect::JavaScript, false));
        let session = overlay.session().unwrap();
        assert_eq!(session.guess, TypeGuess::Array);
        assert_eq!(session.entries.len(), DEFAULT_MAX_VISIBLE);
        assert_eq!(session.total, catalog::ARRAY.len());
        assert_eq!(session.span, (28, 28));
    }

    #[test]
    fn arrow_keys_wrap_around() {
        let mut buffer = CodeBuffer::new("flag.");
        let mut overlay = HintOverlay::default();
        assert!(overlay.trigger(&buffer, Dialect::JavaScript, false));
        let last = overlay.session().unwrap().entries.len() - 1;

        overlay.handle(OverlayEvent::Previous, &mut buffer);
        assert_eq!(overlay.session().unwrap().selected, last);
        overlay.handle(OverlayEvent::Next, &mut buffer);
        assert_eq!(overlay.session().unwrap().selected, 0);
        for _ in 0..last {
            overlay.handle(OverlayEvent::Next, &mut buffer);
        }
        assert_eq!(overlay.session().unwrap().selected, last);
        overlay.handle(OverlayEvent::Next, &mut buffer);
        assert_eq!(overlay.session().unwrap().selected, 0);
    }

    #[test]
    fn accept_replaces_the_partial_member() {
        let mut buffer = CodeBuffer::new("const arr = [];\narr.pu");
        let mut overlay = HintOverlay::default();
        // A partial member only refreshes a session that is already open.
        assert!(!overlay.trigger(&buffer, Dialect::JavaScript, false));
        buffer.set_cursor(buffer.text.chars().count() - 2);
        assert!(overlay.trigger(&buffer, Dialect::JavaScript, false));
        buffer.set_cursor(buffer.text.chars().count());
        assert!(overlay.trigger(&buffer, Dialect::JavaScript, false));
        assert_eq!(overlay.session().unwrap().entries[0].text, "push()");

        let outcome = overlay.handle(OverlayEvent::Accept, &mut buffer);
        assert!(outcome.changed_buffer());
        assert_eq!(buffer.text, "const arr = [];\narr.push()");
        assert_eq!(buffer.cursor(), buffer.text.chars().count());
        assert!(!overlay.is_open());
    }

    #[test]
    fn accept_uses_the_text_typed_after_the_session_opened() {
        let mut buffer = CodeBuffer::new("const arr = [];\narr.");
        let mut overlay = HintOverlay::default();
        assert!(overlay.trigger(&buffer, Dialect::JavaScript, false));
        let end = buffer.text.chars().count();
        let cursor = buffer.replace_range(end, end, "p");
        buffer.set_cursor(cursor);

        overlay.handle(OverlayEvent::Accept, &mut buffer);
        assert_eq!(buffer.text, "const arr = [];\narr.push()");
        assert_eq!(buffer.cursor(), buffer.text.chars().count());
    }

    #[test]
    fn clicking_elsewhere_in_the_editor_re_evaluates_the_session() {
        let mut buffer = CodeBuffer::new("const s = 'a';\ns.tr");
        let mut overlay = HintOverlay::default();
        buffer.set_cursor(buffer.text.chars().count() - 2);
        assert!(overlay.trigger(&buffer, Dialect::JavaScript, false));
        buffer.set_cursor(buffer.text.chars().count());
        assert!(overlay.trigger(&buffer, Dialect::JavaScript, false));
        assert_eq!(overlay.session().unwrap().guess, TypeGuess::String);
        buffer.set_cursor(8);
        assert!(!overlay.trigger(&buffer, Dialect::JavaScript, false));
        assert!(!overlay.is_open());
    }

    #[test]
    fn whitespace_after_the_dot_is_replaced() {
        let mut buffer = CodeBuffer::new("const arr = [];\narr.  ");
        let mut overlay = HintOverlay::default();
        assert!(overlay.trigger(&buffer, Dialect::JavaScript, false));
        assert_eq!(overlay.session().unwrap().span, (20, 22));
        overlay.handle(OverlayEvent::Accept, &mut buffer);
        assert_eq!(buffer.text, "const arr = [];\narr.push()");
    }

    #[test]
    fn click_commits_and_escape_dismisses() {
        let mut buffer = CodeBuffer::new("cons");
        let mut overlay = HintOverlay::default();
        assert!(overlay.trigger(&buffer, Dialect::JavaScript, false));
        assert_eq!(overlay.session().unwrap().guess, TypeGuess::General);
        let outcome = overlay.handle(OverlayEvent::Click(1), &mut buffer);
        assert_eq!(
            outcome,
            OverlayOutcome::Committed {
                text: "console.error()",
                cursor: 15
            }
        );
        assert_eq!(buffer.text, "console.error()");

        let mut buffer = CodeBuffer::new("x.");
        assert!(overlay.trigger(&buffer, Dialect::JavaScript, false));
        assert_eq!(overlay.handle(OverlayEvent::Dismiss, &mut buffer), OverlayOutcome::Closed);
        assert_eq!(overlay.handle(OverlayEvent::Next, &mut buffer), OverlayOutcome::Ignored);
        assert_eq!(buffer.text, "x.");
    }

    #[test]
    fn empty_lines_need_an_explicit_request() {
        let buffer = CodeBuffer::new("let a = 1;\n");
        let mut overlay = HintOverlay::default();
        assert!(!overlay.trigger(&buffer, Dialect::TypeScript, false));
        assert!(overlay.trigger(&buffer, Dialect::TypeScript, true));
        let session = overlay.session().unwrap();
        assert_eq!(session.total, catalog::GENERAL.len() + catalog::TYPESCRIPT.len());
    }

    #[test]
    fn no_matches_closes_the_session() {
        let buffer = CodeBuffer::new("x.");
        let mut overlay = HintOverlay::default();
        assert!(overlay.trigger(&buffer, Dialect::JavaScript, false));
        let buffer = CodeBuffer::new("zzzz");
        assert!(!overlay.trigger(&buffer, Dialect::JavaScript, false));
        assert!(!overlay.is_open());
    }
}
