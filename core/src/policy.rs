//! Which response statuses count as success for each verb.

use crate::http::HttpMethod;

/// Result of checking a status against the policy table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusOutcome {
    Accepted,
    /// The target was already gone. Only DELETE maps a status here.
    Absent,
    Rejected,
}

struct VerbPolicy {
    accepted: &'static [u16],
    absent: &'static [u16],
}

const fn policy(method: HttpMethod) -> VerbPolicy {
    match method {
        HttpMethod::Get => VerbPolicy {
            accepted: &[200],
            absent: &[],
        },
        HttpMethod::Post | HttpMethod::Patch | HttpMethod::Put => VerbPolicy {
            accepted: &[200, 201],
            absent: &[],
        },
        HttpMethod::Delete => VerbPolicy {
            accepted: &[204],
            absent: &[404],
        },
    }
}

/// Statuses that count as a successful `method` call.
pub fn accepted_statuses(method: HttpMethod) -> &'static [u16] {
    policy(method).accepted
}

pub fn classify(method: HttpMethod, status: u16) -> StatusOutcome {
    let verb = policy(method);
    if verb.accepted.contains(&status) {
        StatusOutcome::Accepted
    } else if verb.absent.contains(&status) {
        StatusOutcome::Absent
    } else {
        StatusOutcome::Rejected
    }
}
