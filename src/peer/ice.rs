use crate::logger::{log, warn};
use crate::peer::types::IceCandidate;
use std::collections::VecDeque;
use std::fmt::Display;
use std::future::Future;

/// Remote candidates received before the remote description was applied.
/// FIFO; owned by the negotiator for the lifetime of one call.
#[derive(Debug, Default)]
pub struct CandidateQueue {
    pending: VecDeque<IceCandidate>,
}

/// Outcome of one drain
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    pub applied: usize,
    pub failed: usize,
}

impl CandidateQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, candidate: IceCandidate) {
        self.pending.push_back(candidate);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Applies every queued candidate in receipt order and leaves the queue empty.
    /// A failing candidate is reported and the rest are still applied.
    pub async fn drain_into<F, Fut, E>(&mut self, mut apply: F) -> DrainReport
    where
        F: FnMut(IceCandidate) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: Display,
    {
        let pending = std::mem::take(&mut self.pending);
        let mut report = DrainReport::default();

        for candidate in pending {
            log(&format!("Applying pending candidate: {}", candidate.candidate));
            match apply(candidate).await {
                Ok(()) => report.applied += 1,
                Err(e) => {
                    warn(&format!("Failed to apply pending candidate: {e}"));
                    report.failed += 1;
                }
            }
        }
        report
    }

    /// Drops everything without applying it; returns how many were dropped.
    pub fn discard(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }
}

/// host / srflx / prflx / relay, read from the candidate line
pub fn candidate_type(candidate: &IceCandidate) -> &'static str {
    let mut fields = candidate.candidate.split_whitespace();
    while let Some(field) = fields.next() {
        if field == "typ" {
            return match fields.next() {
                Some("host") => "host",
                Some("srflx") => "srflx",
                Some("prflx") => "prflx",
                Some("relay") => "relay",
                _ => "unknown",
            };
        }
    }
    "unknown"
}
