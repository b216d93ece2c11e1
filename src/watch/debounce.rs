// src/watch/debounce.rs

//! Quiet-period batching for one watch subscription.
//!
//! ```text
//!   Idle --change--> Debouncing --deadline--> Triggering --complete--> Idle
//!                     ^   |                      |
//!                     +---+ change re-arms       | changes held as next batch
//!                                                v
//!                                  complete with held changes -> Debouncing
//! ```
//!
//! The state machine is driven with explicit instants so it can be tested
//! without timers; [`crate::watch::subscription::run_subscription`] drives it
//! with `tokio::time`.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebounceState {
    Idle,
    Debouncing {
        deadline: Instant,
        batch: BTreeSet<PathBuf>,
    },
    /// The bound task is running; `next` collects changes seen meanwhile.
    Triggering { next: BTreeSet<PathBuf> },
}

#[derive(Debug, Clone)]
pub struct Debouncer {
    quiet: Duration,
    state: DebounceState,
}

impl Debouncer {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            state: DebounceState::Idle,
        }
    }

    pub fn state(&self) -> &DebounceState {
        &self.state
    }

    /// Record a change seen at `now`.
    pub fn on_change(&mut self, path: PathBuf, now: Instant) {
        let deadline = now + self.quiet;
        match &mut self.state {
            DebounceState::Idle => {
                self.state = DebounceState::Debouncing {
                    deadline,
                    batch: BTreeSet::from([path]),
                };
            }
            DebounceState::Debouncing {
                deadline: current,
                batch,
            } => {
                *current = deadline;
                batch.insert(path);
            }
            DebounceState::Triggering { next } => {
                next.insert(path);
            }
        }
    }

    /// Pending deadline, if debouncing.
    pub fn deadline(&self) -> Option<Instant> {
        match &self.state {
            DebounceState::Debouncing { deadline, .. } => Some(*deadline),
            _ => None,
        }
    }

    /// If the quiet period has elapsed at `now`, move to `Triggering` and
    /// return the flushed batch.
    pub fn poll_flush(&mut self, now: Instant) -> Option<Vec<PathBuf>> {
        match &self.state {
            DebounceState::Debouncing { deadline, .. } if now >= *deadline => {
                let previous = std::mem::replace(
                    &mut self.state,
                    DebounceState::Triggering {
                        next: BTreeSet::new(),
                    },
                );
                match previous {
                    DebounceState::Debouncing { batch, .. } => Some(batch.into_iter().collect()),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    /// The triggered invocation finished at `now`.
    pub fn on_trigger_complete(&mut self, now: Instant) {
        let previous = std::mem::replace(&mut self.state, DebounceState::Idle);
        if let DebounceState::Triggering { next } = previous {
            if !next.is_empty() {
                self.state = DebounceState::Debouncing {
                    deadline: now + self.quiet,
                    batch: next,
                };
            }
        } else {
            // Completion outside Triggering is a no-op.
            self.state = previous;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUIET: Duration = Duration::from_millis(100);

    fn p(s: &str) -> PathBuf {
        PathBuf::from(s)
    }

    #[test]
    fn rapid_changes_flush_as_one_batch() {
        let start = Instant::now();
        let mut d = Debouncer::new(QUIET);

        d.on_change(p("a.scss"), start);
        d.on_change(p("b.scss"), start + Duration::from_millis(30));
        d.on_change(p("a.scss"), start + Duration::from_millis(60));

        // Each change re-armed the deadline.
        assert_eq!(d.deadline(), Some(start + Duration::from_millis(160)));
        assert_eq!(d.poll_flush(start + Duration::from_millis(150)), None);

        let batch = d.poll_flush(start + Duration::from_millis(160)).unwrap();
        assert_eq!(batch, vec![p("a.scss"), p("b.scss")]);
        assert!(matches!(d.state(), DebounceState::Triggering { .. }));
        assert_eq!(d.poll_flush(start + Duration::from_secs(5)), None);
    }

    #[test]
    fn changes_during_trigger_become_next_batch() {
        let start = Instant::now();
        let mut d = Debouncer::new(QUIET);

        d.on_change(p("a.scss"), start);
        d.poll_flush(start + QUIET).unwrap();

        d.on_change(p("c.scss"), start + Duration::from_millis(120));
        assert_eq!(d.deadline(), None);

        let done = start + Duration::from_millis(400);
        d.on_trigger_complete(done);
        assert_eq!(d.deadline(), Some(done + QUIET));
        assert_eq!(d.poll_flush(done + QUIET), Some(vec![p("c.scss")]));
    }

    #[test]
    fn completion_without_pending_changes_returns_to_idle() {
        let start = Instant::now();
        let mut d = Debouncer::new(QUIET);

        d.on_change(p("a.scss"), start);
        d.poll_flush(start + QUIET).unwrap();
        d.on_trigger_complete(start + QUIET);

        assert_eq!(d.state(), &DebounceState::Idle);

        // A stray completion is ignored.
        d.on_trigger_complete(start + QUIET);
        assert_eq!(d.state(), &DebounceState::Idle);
    }
}
