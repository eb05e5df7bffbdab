//! Follow mode: a cancellable stream of scroll-back snapshots.

use super::mux::Multiplexer;
use crate::error::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Longest single sleep while waiting for the next poll, so cancellation is
/// noticed promptly without ever interrupting a capture.
const CANCEL_CHECK: Duration = Duration::from_millis(100);

/// Lazily polls a session's scroll-back.
///
/// Each item is a full snapshot of the trailing lines. The stream ends when
/// `cancel` is set (checked only between polls) or the session disappears.
/// It never writes to the session.
pub struct Snapshots<'a> {
    mux: &'a dyn Multiplexer,
    session: String,
    lines: usize,
    interval: Duration,
    cancel: &'a AtomicBool,
    started: bool,
    finished: bool,
}

impl<'a> Snapshots<'a> {
    pub(crate) fn new(
        mux: &'a dyn Multiplexer,
        session: String,
        lines: usize,
        interval: Duration,
        cancel: &'a AtomicBool,
    ) -> Self {
        Self {
            mux,
            session,
            lines,
            interval,
            cancel,
            started: false,
            finished: false,
        }
    }

    fn wait_for_next_poll(&self) {
        let deadline = Instant::now() + self.interval;
        while !self.cancel.load(Ordering::SeqCst) {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep((deadline - now).min(CANCEL_CHECK));
        }
    }
}

impl Iterator for Snapshots<'_> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        if self.started {
            self.wait_for_next_poll();
        }
        self.started = true;

        if self.cancel.load(Ordering::SeqCst) {
            self.finished = true;
            return None;
        }

        match self.mux.capture(&self.session, self.lines) {
            Ok(Some(snapshot)) => Some(Ok(snapshot)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

/// Lines of `next` that were not already visible at the end of `prev`.
///
/// Finds the longest suffix of `prev` that is a prefix of `next` and returns
/// what follows it. Unrelated snapshots (a redrawn screen) yield all of
/// `next`.
pub fn new_lines<'n>(prev: &str, next: &'n str) -> Vec<&'n str> {
    let prev: Vec<&str> = prev.lines().collect();
    let next: Vec<&'n str> = next.lines().collect();

    let max_overlap = prev.len().min(next.len());
    let overlap = (0..=max_overlap)
        .rev()
        .find(|&k| prev[prev.len() - k..] == next[..k])
        .unwrap_or(0);

    next[overlap..].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_lines_after_scroll() {
        let prev = "a\nb\nc";
        let next = "b\nc\nd\ne";
        assert_eq!(new_lines(prev, next), vec!["d", "e"]);
    }

    #[test]
    fn test_new_lines_unchanged() {
        assert!(new_lines("a\nb", "a\nb").is_empty());
    }

    #[test]
    fn test_new_lines_from_nothing() {
        assert_eq!(new_lines("", "x\ny"), vec!["x", "y"]);
    }

    #[test]
    fn test_new_lines_redraw() {
        assert_eq!(new_lines("a\nb", "x\ny"), vec!["x", "y"]);
    }

    #[test]
    fn test_new_lines_append_without_scroll() {
        assert_eq!(new_lines("a\nb", "a\nb\nc"), vec!["c"]);
    }
}
