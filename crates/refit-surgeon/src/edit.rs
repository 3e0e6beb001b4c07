//! Byte-range edits over one source string, applied back to front.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Replace `[start, end)` of the source the edit set was built for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextEdit {
    pub start: usize,
    pub end: usize,
    pub replacement: String,
    pub label: String,
    /// Orders insertions at the same offset; lower lands first.
    #[serde(default)]
    pub priority: i32,
}

impl TextEdit {
    pub fn replace(start: usize, end: usize, replacement: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            start,
            end,
            replacement: replacement.into(),
            label: label.into(),
            priority: 0,
        }
    }

    pub fn insert(at: usize, text: impl Into<String>, label: impl Into<String>) -> Self {
        Self::replace(at, at, text, label)
    }

    pub fn delete(start: usize, end: usize, label: impl Into<String>) -> Self {
        Self::replace(start, end, "", label)
    }

    pub fn with_priority(self, priority: i32) -> Self {
        Self { priority, ..self }
    }

    fn is_insertion(&self) -> bool {
        self.start == self.end
    }

    /// Net change in line count.
    fn line_delta(&self, source: &str) -> isize {
        let removed = source[self.start..self.end].matches('\n').count() as isize;
        self.replacement.matches('\n').count() as isize - removed
    }
}

/// Lines after `after_line` (1-based, pre-edit numbering) move by `delta`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineShift {
    pub after_line: usize,
    pub delta: isize,
}

#[derive(Debug, Clone, Error, Serialize)]
pub enum EditConflict {
    #[error("Edit '{b_label}' [{b_start}..{b_end}) overlaps '{a_label}' [{a_start}..{a_end})")]
    Overlapping {
        a_label: String,
        a_start: usize,
        a_end: usize,
        b_label: String,
        b_start: usize,
        b_end: usize,
    },
    #[error("Edit '{label}' [{start}..{end}) is outside a source of {source_len} bytes")]
    OutOfBounds {
        label: String,
        start: usize,
        end: usize,
        source_len: usize,
    },
}

/// Sorted, non-overlapping edits. Insertions may share an offset.
#[derive(Debug, Clone)]
pub struct EditSet {
    edits: Vec<TextEdit>,
}

impl EditSet {
    pub fn new(mut edits: Vec<TextEdit>, source_len: usize) -> Result<Self, EditConflict> {
        if let Some(bad) = edits.iter().find(|e| e.start > e.end || e.end > source_len) {
            return Err(EditConflict::OutOfBounds {
                label: bad.label.clone(),
                start: bad.start,
                end: bad.end,
                source_len,
            });
        }
        edits.sort_by_key(|e| (e.start, e.end, e.priority));

        let clash = edits.windows(2).find(|w| {
            let shared_point = w[0].is_insertion() && w[1].is_insertion() && w[0].start == w[1].start;
            !shared_point && w[0].end > w[1].start
        });
        if let Some([a, b]) = clash {
            return Err(EditConflict::Overlapping {
                a_label: a.label.clone(),
                a_start: a.start,
                a_end: a.end,
                b_label: b.label.clone(),
                b_start: b.start,
                b_end: b.end,
            });
        }
        Ok(Self { edits })
    }

    /// The edited text. Later offsets are replaced first so earlier ones stay valid.
    pub fn apply(&self, source: &str) -> String {
        self.edits.iter().rev().fold(source.to_string(), |mut text, edit| {
            text.replace_range(edit.start..edit.end, &edit.replacement);
            text
        })
    }

    /// Line movements caused by this set, in pre-edit coordinates.
    pub fn line_shifts(&self, source: &str) -> Vec<LineShift> {
        let mut shifts = Vec::new();
        for edit in &self.edits {
            let delta = edit.line_delta(source);
            if delta == 0 {
                continue;
            }
            // the line holding `end` moves as a whole only when `end` starts it
            let lines_before_end = source[..edit.end].matches('\n').count();
            let starts_line = edit.end == 0 || source.as_bytes()[edit.end - 1] == b'\n';
            let after_line = if starts_line { lines_before_end } else { lines_before_end + 1 };
            shifts.push(LineShift { after_line, delta });
        }
        shifts
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TextEdit> {
        self.edits.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_edit() {
        let source = "int x = 42;";
        let edits = vec![TextEdit::replace(8, 10, "ANSWER", "name literal")];
        let edit_set = EditSet::new(edits, source.len()).unwrap();
        assert_eq!(edit_set.apply(source), "int x = ANSWER;");
    }

    #[test]
    fn test_insertion_at_same_point() {
        let source = "ab";
        let edits = vec![
            TextEdit::insert(1, "X", "insert1"),
            TextEdit::insert(1, "Y", "insert2").with_priority(1),
        ];
        let edit_set = EditSet::new(edits, source.len()).unwrap();
        // Reverse application inserts Y first, then X in front of it.
        assert_eq!(edit_set.apply(source), "aXYb");
    }

    #[test]
    fn test_overlapping_edits_rejected() {
        let source = "return a && b;";
        let edits = vec![
            TextEdit::replace(3, 8, "X", "edit1"),
            TextEdit::replace(5, 10, "Y", "edit2"),
        ];
        match EditSet::new(edits, source.len()).unwrap_err() {
            EditConflict::Overlapping { .. } => {}
            other => panic!("Expected Overlapping, got {:?}", other),
        }
    }

    #[test]
    fn test_out_of_bounds_rejected() {
        let source = "hello";
        let edits = vec![TextEdit::replace(3, 10, "X", "oob")];
        match EditSet::new(edits, source.len()).unwrap_err() {
            EditConflict::OutOfBounds { .. } => {}
            other => panic!("Expected OutOfBounds, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_edit_set() {
        let source = "class A {}";
        let edit_set = EditSet::new(vec![], source.len()).unwrap();
        assert_eq!(edit_set.apply(source), source);
        assert!(edit_set.line_shifts(source).is_empty());
    }

    #[test]
    fn test_growing_and_shrinking_edits_compose() {
        let source = "a + bb + c";
        let edits = vec![
            TextEdit::replace(9, 10, "gamma", "grow last"),
            TextEdit::replace(0, 1, "alpha", "grow first"),
            TextEdit::replace(4, 6, "b", "shrink middle"),
        ];
        let edit_set = EditSet::new(edits, source.len()).unwrap();
        assert_eq!(edit_set.apply(source), "alpha + b + gamma");
        assert_eq!(edit_set.iter().next().unwrap().label, "grow first");
    }

    #[test]
    fn test_line_shifts() {
        let source = "a\nb\nc\nd\n";
        let edits = vec![
            // two new lines in front of line 2
            TextEdit::insert(2, "x\ny\n", "grow"),
            // drop line 3 ("c\n")
            TextEdit::delete(4, 6, "shrink"),
            // same-line edit, no movement
            TextEdit::replace(6, 7, "D", "rename"),
        ];
        let edit_set = EditSet::new(edits, source.len()).unwrap();
        let shifts = edit_set.line_shifts(source);
        assert_eq!(
            shifts,
            vec![
                LineShift { after_line: 1, delta: 2 },
                LineShift { after_line: 3, delta: -1 },
            ]
        );
        assert_eq!(edit_set.apply(source), "a\nx\ny\nb\nD\n");
    }
}
