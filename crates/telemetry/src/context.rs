//! Ambient correlation context: which session is this process serving?

use std::env;
use std::process;

/// Environment variable set by the session-capture hooks.
pub const SESSION_ID_ENV: &str = "CLAUDE_SESSION_ID";

/// Where the session id came from. Analyses exclude the pid fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionIdSource {
    Environment,
    PidFallback,
}

impl SessionIdSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionIdSource::Environment => "environment",
            SessionIdSource::PidFallback => "pid_fallback",
        }
    }
}

/// Current session id for event correlation: the hook-provided identifier
/// when present, otherwise a process-id fallback that is explicitly marked
/// so downstream analyses can exclude it.
pub fn current_session_id() -> (String, SessionIdSource) {
    match env::var(SESSION_ID_ENV) {
        Ok(id) if !id.is_empty() => (id, SessionIdSource::Environment),
        _ => (
            format!("pid_{}", process::id()),
            SessionIdSource::PidFallback,
        ),
    }
}

/// True when running under a capture hook.
pub fn is_hook_triggered() -> bool {
    env::var(SESSION_ID_ENV).map(|v| !v.is_empty()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pid_fallback_is_marked() {
        // The test environment does not set the hook variable.
        if env::var(SESSION_ID_ENV).is_err() {
            let (id, source) = current_session_id();
            assert!(id.starts_with("pid_"));
            assert_eq!(source, SessionIdSource::PidFallback);
            assert!(!is_hook_triggered());
        }
    }

    #[test]
    fn source_strings() {
        assert_eq!(SessionIdSource::Environment.as_str(), "environment");
        assert_eq!(SessionIdSource::PidFallback.as_str(), "pid_fallback");
    }
}
