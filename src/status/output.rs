// src/status/output.rs

use std::collections::VecDeque;

use chrono::Local;

/// One appended line of human-readable progress narration.
#[derive(Debug, Clone)]
pub struct OutputLine {
    /// Monotonic position in the log, never reused. This is the cursor the
    /// incremental streaming endpoint advances through.
    pub seq: u64,
    pub source: String,
    pub text: String,
    /// `[HH:MM:SS] [source] text`, frozen at append time.
    pub formatted: String,
}

/// Bounded, append-only line buffer. Oldest lines are evicted first once the
/// cap is exceeded. Not internally synchronized; the tracker owns the lock.
#[derive(Debug)]
pub struct OutputLog {
    lines: VecDeque<OutputLine>,
    max_lines: usize,
    next_seq: u64,
}

impl OutputLog {
    pub fn new(max_lines: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            max_lines: max_lines.max(1),
            next_seq: 0,
        }
    }

    pub fn append(&mut self, text: &str, source: &str) -> OutputLine {
        let timestamp = Local::now().format("%H:%M:%S");
        let line = OutputLine {
            seq: self.next_seq,
            source: source.to_string(),
            text: text.to_string(),
            formatted: format!("[{}] [{}] {}", timestamp, source, text),
        };
        self.next_seq += 1;

        self.lines.push_back(line.clone());
        while self.lines.len() > self.max_lines {
            self.lines.pop_front();
        }
        line
    }

    /// Last `n` lines in append order; the whole log when `n` exceeds its
    /// length, empty for `n == 0`.
    pub fn recent(&self, n: usize) -> Vec<String> {
        let skip = self.lines.len().saturating_sub(n);
        self.lines.iter().skip(skip).map(|l| l.formatted.clone()).collect()
    }

    /// Lines appended after `cursor`, in order, plus the new cursor value.
    /// Lines evicted before the caller catches up are gone; the caller just
    /// resumes from whatever is still buffered.
    pub fn since(&self, cursor: u64) -> (Vec<String>, u64) {
        let lines: Vec<String> = self
            .lines
            .iter()
            .filter(|l| l.seq >= cursor)
            .map(|l| l.formatted.clone())
            .collect();
        (lines, self.next_seq)
    }

    /// Cursor positioned past everything currently in the log.
    pub fn cursor(&self) -> u64 {
        self.next_seq
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_formats_with_source_tag() {
        let mut log = OutputLog::new(10);
        let line = log.append("cloning repo", "git");
        assert!(line.formatted.contains("[git] cloning repo"));
        assert_eq!(line.seq, 0);
        assert_eq!(log.append("next", "system").seq, 1);
    }

    #[test]
    fn eviction_is_fifo_and_capped() {
        let mut log = OutputLog::new(1000);
        for i in 0..1005 {
            log.append(&format!("line {}", i), "system");
        }
        assert_eq!(log.len(), 1000);
        let recent = log.recent(1000);
        assert_eq!(recent.len(), 1000);
        // The first five lines are gone; the window starts at line 5.
        assert!(recent[0].ends_with("line 5"));
        assert!(recent[999].ends_with("line 1004"));
    }

    #[test]
    fn recent_handles_degenerate_counts() {
        let mut log = OutputLog::new(10);
        log.append("a", "system");
        log.append("b", "system");
        assert!(log.recent(0).is_empty());
        assert_eq!(log.recent(50).len(), 2);
        assert!(log.recent(50)[0].ends_with("a"));
    }

    #[test]
    fn since_returns_only_new_lines() {
        let mut log = OutputLog::new(10);
        log.append("one", "system");
        let cursor = log.cursor();
        log.append("two", "system");
        log.append("three", "system");

        let (lines, next) = log.since(cursor);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("two"));
        assert!(lines[1].ends_with("three"));

        let (empty, _) = log.since(next);
        assert!(empty.is_empty());
    }

    #[test]
    fn clear_empties_but_keeps_sequence() {
        let mut log = OutputLog::new(10);
        log.append("a", "system");
        let cursor = log.cursor();
        log.clear();
        assert!(log.is_empty());
        // Sequence numbers keep advancing so stream cursors stay valid.
        assert_eq!(log.append("b", "system").seq, cursor);
    }
}
