//! The editor capability surface the hint overlay works against.
//!
//! Cursors are char indices into the whole text. Positions are 0-based
//! line and column, with columns counted in chars.

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

pub trait EditorSurface {
    fn text(&self) -> &str;
    fn set_text(&mut self, text: String);
    /// Cursor as a char index.
    fn cursor(&self) -> usize;
    fn set_cursor(&mut self, index: usize);
    /// Replaces the chars in `start..end` and returns the char index just
    /// past the inserted text.
    fn replace_range(&mut self, start: usize, end: usize, replacement: &str) -> usize;

    fn line_count(&self) -> usize {
        self.text().split('\n').count()
    }

    fn line(&self, line: usize) -> Option<&str> {
        self.text().split('\n').nth(line)
    }

    fn lines(&self) -> Vec<&str> {
        self.text().split('\n').collect()
    }

    fn cursor_position(&self) -> Position {
        position_of(self.text(), self.cursor())
    }

    /// Text of the cursor's line up to the cursor.
    fn before_cursor(&self) -> String {
        let pos = self.cursor_position();
        self.line(pos.line)
            .map(|l| l.chars().take(pos.column).collect())
            .unwrap_or_default()
    }
}

/// Line and column of the char at `index`; past-the-end clamps to the end.
pub fn position_of(text: &str, index: usize) -> Position {
    let mut pos = Position::default();
    for c in text.chars().take(index) {
        if c == '\n' {
            pos.line += 1;
            pos.column = 0;
        } else {
            pos.column += 1;
        }
    }
    pos
}

/// Char index of `pos`; columns past the end of a line clamp to it.
pub fn index_of(text: &str, pos: Position) -> usize {
    let mut index = 0;
    for (n, line) in text.split('\n').enumerate() {
        let len = line.chars().count();
        if n == pos.line {
            return index + pos.column.min(len);
        }
        index += len + 1;
    }
    text.chars().count()
}

fn byte_offset(text: &str, char_index: usize) -> usize {
    text.char_indices()
        .nth(char_index)
        .map_or(text.len(), |(b, _)| b)
}

/// Plain in-memory buffer. The UI keeps one and lends its `String` to the
/// `TextEdit` each frame.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CodeBuffer {
    pub text: String,
    pub cursor: usize,
}

impl CodeBuffer {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let cursor = text.chars().count();
        Self { text, cursor }
    }

    #[cfg(test)]
    pub fn with_cursor(text: impl Into<String>, cursor: usize) -> Self {
        let mut buffer = Self::new(text);
        buffer.set_cursor(cursor);
        buffer
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

impl EditorSurface for CodeBuffer {
    fn text(&self) -> &str {
        &self.text
    }

    fn set_text(&mut self, text: String) {
        self.text = text;
        self.cursor = self.cursor.min(self.text.chars().count());
    }

    fn cursor(&self) -> usize {
        self.cursor
    }

    fn set_cursor(&mut self, index: usize) {
        self.cursor = index.min(self.text.chars().count());
    }

    fn replace_range(&mut self, start: usize, end: usize, replacement: &str) -> usize {
        let (start, end) = (start.min(end), start.max(end));
        let from = byte_offset(&self.text, start);
        let to = byte_offset(&self.text, end);
        self.text.replace_range(from..to, replacement);
        let after = start + replacement.chars().count();
        self.cursor = after;
        after
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_round_trip_through_indices() {
        let text = "let a = 1;\nconst bé = 'x';\n\nend";
        let pos = position_of(text, 14);
        assert_eq!(pos, Position::new(1, 3));
        assert_eq!(index_of(text, pos), 14);
        assert_eq!(index_of(text, Position::new(2, 9)), 27);
        assert_eq!(index_of(text, Position::new(9, 0)), text.chars().count());
    }

    #[test]
    fn before_cursor_is_limited_to_the_current_line() {
        let buffer = CodeBuffer::with_cursor("const xs = [];\nxs.pu", 20);
        assert_eq!(buffer.cursor_position(), Position::new(1, 5));
        assert_eq!(buffer.before_cursor(), "xs.pu");
        assert_eq!(buffer.line(0), Some("const xs = [];"));
        assert_eq!(buffer.line_count(), 2);
    }

    #[test]
    fn replace_range_moves_the_cursor_after_the_insertion() {
        let mut buffer = CodeBuffer::with_cursor("xs.pu + 1", 5);
        let after = buffer.replace_range(3, 5, "push()");
        assert_eq!(buffer.text, "xs.push() + 1");
        assert_eq!(after, 9);
        assert_eq!(buffer.cursor(), 9);
    }

    #[test]
    fn cursor_is_clamped_to_the_text() {
        let mut buffer = CodeBuffer::new("héllo");
        assert_eq!(buffer.cursor(), 5);
        buffer.set_cursor(99);
        assert_eq!(buffer.cursor(), 5);
        buffer.set_text("hi".into());
        assert_eq!(buffer.cursor(), 2);
    }
}
