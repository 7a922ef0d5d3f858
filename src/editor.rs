//! Editor widget contract and line/column selection handling

use serde::{Deserialize, Serialize};

/// Zero-based selection span; start == end is a collapsed cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Selection {
    pub start_line: usize,
    pub start_col: usize,
    pub end_line: usize,
    pub end_col: usize,
}

impl Selection {
    pub fn new(start_line: usize, start_col: usize, end_line: usize, end_col: usize) -> Self {
        Self {
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }

    pub fn cursor(line: usize, col: usize) -> Self {
        Self::new(line, col, line, col)
    }

    /// Whole lines `first..=last`
    pub fn lines(first: usize, last: usize) -> Self {
        Self::new(first, 0, last, usize::MAX)
    }

    /// True when the selection covers at least one character
    pub fn spans_text(&self) -> bool {
        (self.start_line, self.start_col) != (self.end_line, self.end_col)
    }

    /// `startLine:endLine` form expected by the format service
    pub fn line_range(&self) -> String {
        let (first, last) = if self.start_line <= self.end_line {
            (self.start_line, self.end_line)
        } else {
            (self.end_line, self.start_line)
        };
        format!("{first}:{last}")
    }

    /// Build from character offsets into `text`
    pub fn from_char_offsets(text: &str, start: usize, end: usize) -> Self {
        let (start_line, start_col) = line_col_at(text, start);
        let (end_line, end_col) = line_col_at(text, end);
        Self::new(start_line, start_col, end_line, end_col)
    }

    /// Character offsets of both ends in `text`, clamped to the text
    pub fn to_char_offsets(&self, text: &str) -> (usize, usize) {
        (
            char_offset_at(text, self.start_line, self.start_col),
            char_offset_at(text, self.end_line, self.end_col),
        )
    }
}

fn line_col_at(text: &str, offset: usize) -> (usize, usize) {
    let mut line = 0;
    let mut col = 0;
    for ch in text.chars().take(offset) {
        if ch == '\n' {
            line += 1;
            col = 0;
        } else {
            col += 1;
        }
    }
    (line, col)
}

fn char_offset_at(text: &str, line: usize, col: usize) -> usize {
    let mut offset = 0;
    for (index, content) in text.split('\n').enumerate() {
        let len = content.chars().count();
        if index == line {
            return offset + col.min(len);
        }
        offset += len + 1;
    }
    // Past the last line: end of text
    text.chars().count()
}

/// What the orchestrator needs from the text editor
pub trait Editor {
    fn text(&self) -> String;
    fn set_text(&mut self, text: String);
    fn selection(&self) -> Selection;
    fn set_selection(&mut self, selection: Selection);
}

/// Plain in-memory editor used by the CLI and tests
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextBuffer {
    text: String,
    selection: Selection,
}

impl TextBuffer {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            selection: Selection::default(),
        }
    }
}

impl Editor for TextBuffer {
    fn text(&self) -> String {
        self.text.clone()
    }

    fn set_text(&mut self, text: String) {
        self.text = text;
    }

    fn selection(&self) -> Selection {
        self.selection
    }

    fn set_selection(&mut self, selection: Selection) {
        self.selection = selection;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapsed_cursor_does_not_span() {
        assert!(!Selection::cursor(3, 4).spans_text());
        assert!(Selection::new(3, 4, 3, 5).spans_text());
        assert!(Selection::new(1, 0, 2, 0).spans_text());
    }

    #[test]
    fn test_whole_line_selection() {
        let selection = Selection::lines(1, 1);
        assert!(selection.spans_text());
        assert_eq!(selection.line_range(), "1:1");
        assert_eq!(selection.to_char_offsets("ab\ncde\n"), (3, 6));
    }

    #[test]
    fn test_line_range_is_ordered() {
        assert_eq!(Selection::new(2, 0, 5, 1).line_range(), "2:5");
        assert_eq!(Selection::new(5, 1, 2, 0).line_range(), "2:5");
    }

    #[test]
    fn test_offsets_to_line_col() {
        let text = "ab\ncde\n\nf";
        assert_eq!(Selection::from_char_offsets(text, 0, 0), Selection::cursor(0, 0));
        assert_eq!(Selection::from_char_offsets(text, 3, 5), Selection::new(1, 0, 1, 2));
        assert_eq!(Selection::from_char_offsets(text, 7, 8), Selection::new(2, 0, 3, 0));
    }

    #[test]
    fn test_line_col_to_offsets_clamps() {
        let text = "ab\ncde\n\nf";
        assert_eq!(Selection::new(1, 0, 1, 2).to_char_offsets(text), (3, 5));
        // Column past end of line clamps to line end
        assert_eq!(Selection::cursor(0, 10).to_char_offsets(text), (2, 2));
        // Line past end of text clamps to text end
        assert_eq!(Selection::cursor(9, 0).to_char_offsets(text), (9, 9));
    }

    #[test]
    fn test_multibyte_characters_counted_as_chars() {
        let text = "é\nü";
        assert_eq!(Selection::from_char_offsets(text, 3, 3), Selection::cursor(1, 1));
        assert_eq!(Selection::cursor(1, 1).to_char_offsets(text), (3, 3));
    }
}
