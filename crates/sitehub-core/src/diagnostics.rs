//! Opt-in per-request phase timing diagnostics.
//!
//! A request-handling thread calls [`RequestStats::start`] when it picks up
//! a request, brackets interesting phases with [`RequestStats::mark_start`]
//! and [`RequestStats::mark_end`], and calls [`RequestStats::finish`] before
//! returning the thread to the pool. `finish` logs a summary and always
//! clears the thread-local slot, so timings can never leak into the next
//! request served by the same pooled thread.
//!
//! While the global flag is off every call is a cheap no-op.

use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::debug;

static ENABLED: AtomicBool = AtomicBool::new(false);

thread_local! {
    static CURRENT: RefCell<Option<RequestTimer>> = const { RefCell::new(None) };
}

#[derive(Debug)]
struct RequestTimer {
    uri: String,
    started: Instant,
    open: Vec<(String, Instant)>,
    phases: Vec<(String, Duration)>,
}

/// Thread-local accumulator of named phase timings for one in-flight request.
pub struct RequestStats;

impl RequestStats {
    /// Enable or disable collection process-wide.
    pub fn set_enabled(enabled: bool) {
        ENABLED.store(enabled, Ordering::Relaxed);
    }

    /// Whether collection is currently enabled.
    pub fn is_enabled() -> bool {
        ENABLED.load(Ordering::Relaxed)
    }

    /// Whether the calling thread has an open timing record.
    pub fn is_active() -> bool {
        CURRENT.with(|c| c.borrow().is_some())
    }

    /// Begin a timing record for the given request URI.
    ///
    /// Replaces any record a previous request failed to finish.
    pub fn start(uri: &str) {
        if !Self::is_enabled() {
            return;
        }
        CURRENT.with(|c| {
            *c.borrow_mut() = Some(RequestTimer {
                uri: uri.to_string(),
                started: Instant::now(),
                open: Vec::new(),
                phases: Vec::new(),
            });
        });
    }

    /// Mark the beginning of a named phase.
    pub fn mark_start(name: &str) {
        if !Self::is_enabled() {
            return;
        }
        CURRENT.with(|c| {
            if let Some(timer) = c.borrow_mut().as_mut() {
                timer.open.push((name.to_string(), Instant::now()));
            }
        });
    }

    /// Mark the end of a named phase, recording its duration.
    ///
    /// An end without a matching start is ignored.
    pub fn mark_end(name: &str) {
        if !Self::is_enabled() {
            return;
        }
        CURRENT.with(|c| {
            if let Some(timer) = c.borrow_mut().as_mut() {
                if let Some(pos) = timer.open.iter().rposition(|(n, _)| n == name) {
                    let (name, begun) = timer.open.swap_remove(pos);
                    timer.phases.push((name, begun.elapsed()));
                }
            }
        });
    }

    /// Log the accumulated summary and clear the thread-local record.
    ///
    /// The slot is cleared even when nothing was recorded or the logger is
    /// filtered out.
    pub fn finish() {
        let timer = CURRENT.with(|c| c.borrow_mut().take());
        let Some(timer) = timer else {
            return;
        };

        let total = timer.started.elapsed();
        let phases = timer
            .phases
            .iter()
            .map(|(name, d)| format!("{name}={}ms", d.as_millis()))
            .collect::<Vec<_>>()
            .join(" ");

        debug!(
            uri = %timer.uri,
            total_ms = total.as_millis() as u64,
            %phases,
            "Request timing summary"
        );
    }
}
