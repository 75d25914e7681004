//! Thread-safe mailbox between players and the tick driver.

use std::sync::{Arc, Mutex, PoisonError};

use crate::model::{PlayerId, Submission};

/// Cloneable handle players push their choices into.
///
/// The tick driver drains it at the tick boundary, so every submission
/// lands in exactly one tick.
#[derive(Debug, Clone, Default)]
pub struct SubmissionInbox {
    pending: Arc<Mutex<Vec<Submission>>>,
}

impl SubmissionInbox {
    /// Create an empty inbox.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a choice made `timestamp` seconds into the sequence.
    pub fn push(&self, player: PlayerId, extraction: f64, timestamp: f64) {
        self.lock().push(Submission {
            player,
            extraction,
            timestamp,
        });
    }

    /// Take everything queued so far, oldest first.
    #[must_use]
    pub fn drain(&self) -> Vec<Submission> {
        let mut drained = std::mem::take(&mut *self.lock());
        drained.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        drained
    }

    /// Number of queued submissions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // A panicking producer cannot leave a Vec half-pushed, so a poisoned
    // lock still guards consistent data.
    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Submission>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_drain_clears_and_orders() {
        let inbox = SubmissionInbox::new();
        inbox.push(1, 2.0, 0.5);
        inbox.push(2, 1.0, 0.2);
        assert_eq!(inbox.len(), 2);

        let drained = inbox.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].player, 2);
        assert!(inbox.is_empty());
    }

    #[test]
    fn test_concurrent_producers() {
        let inbox = SubmissionInbox::new();
        let handles: Vec<_> = (0..4)
            .map(|p| {
                let inbox = inbox.clone();
                thread::spawn(move || {
                    for i in 0..100 {
                        inbox.push(p, 1.0, f64::from(i));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(inbox.drain().len(), 400);
    }
}
