//! Rule-based error classification.
//!
//! Turns a raw failure into a user-facing diagnostic by matching the error
//! text against an ordered table of known problems for the phase it
//! occurred in, falling back to a generic per-phase code plus a
//! report-issue suggestion. Pure lookup; no state, no concurrency.

use regex::Regex;

use crate::error::Error;

const REPORT_ISSUE: &str =
    "If the error is unexpected, please open an issue to report it";

/// Where in the session lifecycle an error surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    PortForward,
    Watch,
    Cleanup,
}

/// Stable machine-readable code for a classified error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    PortAllocationFailed,
    ForwardConnectionFailed,
    ForwardTimedOut,
    InvalidResourceVersion,
    WatchInterrupted,
    PortForwardUnknown,
    WatchUnknown,
    CleanupUnknown,
}

/// A classified error ready to surface to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub code: StatusCode,
    pub message: String,
    pub suggestions: Vec<String>,
}

impl Diagnostic {
    /// Message plus suggestions joined the way they are shown to users:
    /// `"<message>. <suggestion> or <suggestion>."`
    pub fn user_message(&self) -> String {
        if self.suggestions.is_empty() {
            return self.message.clone();
        }
        format!("{}. {}.", self.message, self.suggestions.join(" or "))
    }
}

struct Problem {
    pattern: Regex,
    code: StatusCode,
    suggestions: Vec<String>,
}

/// Classifies an error against the known-problem table for a phase.
pub fn classify(phase: Phase, err: &Error) -> Diagnostic {
    let message = err.to_string();
    for problem in known_problems(phase) {
        if problem.pattern.is_match(&message) {
            return Diagnostic {
                code: problem.code,
                message,
                suggestions: problem.suggestions,
            };
        }
    }
    Diagnostic {
        code: unknown_code(phase),
        message,
        suggestions: vec![REPORT_ISSUE.to_string()],
    }
}

fn unknown_code(phase: Phase) -> StatusCode {
    match phase {
        Phase::PortForward => StatusCode::PortForwardUnknown,
        Phase::Watch => StatusCode::WatchUnknown,
        Phase::Cleanup => StatusCode::CleanupUnknown,
    }
}

/// Ordered per-phase problem table. Patterns are matched against the
/// rendered error text, first hit wins.
fn known_problems(phase: Phase) -> Vec<Problem> {
    match phase {
        Phase::PortForward => vec![
            Problem {
                pattern: Regex::new(r"no available local port").unwrap(),
                code: StatusCode::PortAllocationFailed,
                suggestions: vec![
                    "Free local ports by closing applications listening on them".to_string(),
                    "widen the port scan window in the session settings".to_string(),
                ],
            },
            Problem {
                pattern: Regex::new(r"not ready after").unwrap(),
                code: StatusCode::ForwardTimedOut,
                suggestions: vec![
                    "Check that the pod is healthy and the cluster is reachable".to_string(),
                ],
            },
            Problem {
                pattern: Regex::new(r"forward session failed").unwrap(),
                code: StatusCode::ForwardConnectionFailed,
                suggestions: vec![
                    "Check cluster connectivity and that the target pod still exists".to_string(),
                ],
            },
            Problem {
                pattern: Regex::new(r"invalid resource version").unwrap(),
                code: StatusCode::InvalidResourceVersion,
                suggestions: Vec::new(),
            },
        ],
        Phase::Watch => vec![Problem {
            pattern: Regex::new(r"watch source error|watch event type").unwrap(),
            code: StatusCode::WatchInterrupted,
            suggestions: vec![
                "The watch will not be retried automatically; restart the session".to_string(),
            ],
        }],
        Phase::Cleanup => Vec::new(),
    }
}
