//! Pure pass/fail classification of a captured runner log against an
//! experiment's include/exclude markers.

/// The runner's log prefix for "the main body of this step executed". Each
/// experiment marker is prefixed with this before substring search, so a
/// marker names a step that actually ran, not an arbitrary log substring.
pub const RAN_MARKER: &str = "\u{2b50} Run Main ";

/// Outcome of evaluating one experiment's assertions against one log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub passed: bool,
    /// Include markers that never appeared in the log.
    pub missing: Vec<String>,
    /// Exclude markers that did appear in the log.
    pub forbidden: Vec<String>,
}

impl Verdict {
    /// Human-readable failure reason, None when passed.
    pub fn detail(&self) -> Option<String> {
        if self.passed {
            return None;
        }
        let mut parts = Vec::new();
        if !self.missing.is_empty() {
            parts.push(format!("expected step(s) never ran: {}", self.missing.join(", ")));
        }
        if !self.forbidden.is_empty() {
            parts.push(format!("forbidden step(s) ran: {}", self.forbidden.join(", ")));
        }
        Some(parts.join("; "))
    }
}

/// Pass iff every include marker's ran-pattern occurs in the log AND no
/// exclude marker's ran-pattern does. Absent lists are vacuously satisfied.
/// Deterministic, no I/O.
pub fn evaluate(log: &str, includes: &[String], excludes: &[String]) -> Verdict {
    let missing: Vec<String> = includes
        .iter()
        .filter(|marker| !log.contains(&ran_pattern(marker)))
        .cloned()
        .collect();
    let forbidden: Vec<String> = excludes
        .iter()
        .filter(|marker| log.contains(&ran_pattern(marker)))
        .cloned()
        .collect();
    Verdict {
        passed: missing.is_empty() && forbidden.is_empty(),
        missing,
        forbidden,
    }
}

fn ran_pattern(marker: &str) -> String {
    format!("{RAN_MARKER}{marker}")
}
