//! Carries record line numbers through earlier edits to the same file.

use refit_common::fs_utils::file_key;
use refit_surgeon::{DefectRecord, LineShift};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Per file, the shift batches of every applied edit, oldest first.
#[derive(Debug, Default)]
pub struct LineMap {
    batches: HashMap<PathBuf, Vec<Vec<LineShift>>>,
}

impl LineMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the shifts of one applied rewrite. Each batch is in the
    /// coordinates of the file as it was just before that rewrite.
    pub fn record(&mut self, file: &Path, shifts: &[LineShift]) {
        if shifts.is_empty() {
            return;
        }
        self.batches
            .entry(file_key(file))
            .or_default()
            .push(shifts.to_vec());
    }

    pub fn remap(&self, file: &Path, line: usize) -> usize {
        let Some(batches) = self.batches.get(&file_key(file)) else {
            return line;
        };
        batches.iter().fold(line, |line, batch| {
            let delta: isize = batch
                .iter()
                .filter(|s| line > s.after_line)
                .map(|s| s.delta)
                .sum();
            (line as isize + delta).max(1) as usize
        })
    }

    /// `record` with its start and end lines moved to current coordinates.
    pub fn remap_record(&self, record: &DefectRecord) -> DefectRecord {
        let mut moved = record.clone();
        moved.start_line = self.remap(&record.file, record.start_line);
        if let Some(end) = record.end_line {
            moved.end_line = Some(self.remap(&record.file, end).max(moved.start_line));
        }
        moved
    }
}
