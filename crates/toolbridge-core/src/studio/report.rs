//! Fleet initialization policy and outcome

use serde::Serialize;

/// What a studio does when one of its connections fails to initialize
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InitPolicy {
    /// Log the failure and keep initializing the rest
    #[default]
    Isolate,
    /// Stop at the first failure and clean up the whole fleet
    AbortFleet,
}

/// Outcome of [`Studio::initialize_all`](super::Studio::initialize_all)
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InitReport {
    /// Names of connections that are ready, in registration order
    pub ready: Vec<String>,
    /// Names of connections that failed, with the error message
    pub failed: Vec<(String, String)>,
}

impl InitReport {
    pub fn all_ready(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn is_failed(&self, name: &str) -> bool {
        self.failed.iter().any(|(failed, _)| failed == name)
    }
}
