//! Acquisition state machine: one fetch per refresh, bounded retries on empty or failed data
//!
//! The controller owns no timers and performs no I/O. The runtime asks it what
//! to do next (`start`, `retry_due`, `resolve`) and carries out the resulting
//! fetch or sleep. Every fetch is issued under a ticket carrying the refresh
//! sequence; results for a superseded sequence are discarded.

use super::source::FetchError;
use crate::analytics::normalizer::RawRecord;
use serde::Serialize;
use std::time::Duration;

pub const DEFAULT_MAX_RETRIES: u32 = 5;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(3_000);

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AcquisitionState {
    Idle,
    Loading { attempt: u32 },
    Retrying { attempt: u32, max_retries: u32 },
    Ready,
    Empty,
    Failed { reason: String },
}

impl AcquisitionState {
    /// Ready, Empty or Failed: nothing more happens until the next refresh
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AcquisitionState::Ready | AcquisitionState::Empty | AcquisitionState::Failed { .. }
        )
    }

    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            AcquisitionState::Loading { .. } | AcquisitionState::Retrying { .. }
        )
    }

    pub fn label(&self) -> String {
        match self {
            AcquisitionState::Idle => "Idle".to_string(),
            AcquisitionState::Loading { attempt: 0 } => "Loading".to_string(),
            AcquisitionState::Loading { attempt } => format!("Loading (retry {})", attempt),
            AcquisitionState::Retrying {
                attempt,
                max_retries,
            } => format!("Retrying {}/{}", attempt, max_retries),
            AcquisitionState::Ready => "Ready".to_string(),
            AcquisitionState::Empty => "No data".to_string(),
            AcquisitionState::Failed { reason } => format!("Failed: {}", reason),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the initial fetch; total fetches are at most `max_retries + 1`
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

/// Identity of one issued fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    pub sequence: u64,
    pub attempt: u32,
}

/// What the runtime must do after a fetch resolves
#[derive(Debug)]
pub enum Step {
    /// Non-empty payload: normalize and install it
    Install(Vec<RawRecord>),
    /// Sleep `delay`, then call `retry_due(sequence)`
    ScheduleRetry { sequence: u64, delay: Duration },
    /// Retry budget spent; state is already Empty or Failed
    Exhausted,
    /// Result belongs to a superseded refresh (or a cancelled one)
    Discard,
}

#[derive(Debug)]
pub struct AcquisitionController {
    policy: RetryPolicy,
    state: AcquisitionState,
    attempt: u32,
    sequence: u64,
    in_flight: Option<u64>,
    retry_pending: Option<u64>,
}

impl AcquisitionController {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            state: AcquisitionState::Idle,
            attempt: 0,
            sequence: 0,
            in_flight: None,
            retry_pending: None,
        }
    }

    pub fn state(&self) -> &AcquisitionState {
        &self.state
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Begin a refresh. Supersedes any in-flight fetch or pending retry and
    /// resets the attempt counter.
    pub fn start(&mut self) -> Ticket {
        self.sequence += 1;
        self.attempt = 0;
        self.retry_pending = None;
        self.issue()
    }

    /// A retry timer fired. Returns the ticket to fetch under, or `None` if the
    /// timer belongs to a superseded or cancelled refresh.
    pub fn retry_due(&mut self, sequence: u64) -> Option<Ticket> {
        if self.retry_pending != Some(sequence) || sequence != self.sequence {
            return None;
        }
        self.retry_pending = None;
        Some(self.issue())
    }

    pub fn resolve(&mut self, ticket: Ticket, result: Result<Vec<RawRecord>, FetchError>) -> Step {
        if ticket.sequence != self.sequence || self.in_flight != Some(ticket.sequence) {
            log::debug!(
                "Discarding result for sequence {} (current {})",
                ticket.sequence,
                self.sequence
            );
            return Step::Discard;
        }
        self.in_flight = None;

        let failure = match result {
            Ok(raw) if !raw.is_empty() => {
                self.state = AcquisitionState::Ready;
                return Step::Install(raw);
            }
            Ok(_) => None,
            Err(e) => Some(e.to_string()),
        };

        if self.attempt < self.policy.max_retries {
            self.attempt += 1;
            self.retry_pending = Some(self.sequence);
            self.state = AcquisitionState::Retrying {
                attempt: self.attempt,
                max_retries: self.policy.max_retries,
            };
            match &failure {
                Some(reason) => log::warn!(
                    "⚠️  Fetch failed ({}), retry {}/{} in {:?}",
                    reason,
                    self.attempt,
                    self.policy.max_retries,
                    self.policy.delay
                ),
                None => log::info!(
                    "📭 Empty response, retry {}/{} in {:?}",
                    self.attempt,
                    self.policy.max_retries,
                    self.policy.delay
                ),
            }
            return Step::ScheduleRetry {
                sequence: self.sequence,
                delay: self.policy.delay,
            };
        }

        self.state = match failure {
            Some(reason) => {
                log::error!("❌ Fetch failed after {} retries: {}", self.attempt, reason);
                AcquisitionState::Failed { reason }
            }
            None => {
                log::info!("📭 No transactions after {} retries", self.attempt);
                AcquisitionState::Empty
            }
        };
        Step::Exhausted
    }

    /// Drop any in-flight fetch or pending retry. Installed data stays.
    pub fn cancel(&mut self) {
        self.in_flight = None;
        self.retry_pending = None;
        if self.state.is_busy() {
            self.state = AcquisitionState::Idle;
        }
    }

    fn issue(&mut self) -> Ticket {
        self.in_flight = Some(self.sequence);
        self.state = AcquisitionState::Loading {
            attempt: self.attempt,
        };
        Ticket {
            sequence: self.sequence,
            attempt: self.attempt,
        }
    }
}
