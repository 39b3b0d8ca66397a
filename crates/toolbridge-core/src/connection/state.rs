//! Connection lifecycle state

use std::fmt;

use parking_lot::RwLock;

/// Lifecycle of a connection
///
/// `Uninitialized -> Initializing -> Ready -> Closed`, or
/// `Initializing -> Failed`. `Closed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Uninitialized,
    Initializing,
    Ready,
    Closed,
    Failed,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Uninitialized => "uninitialized",
            ConnectionState::Initializing => "initializing",
            ConnectionState::Ready => "ready",
            ConnectionState::Closed => "closed",
            ConnectionState::Failed => "failed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared, lock-protected state owned by a connection
#[derive(Debug)]
pub struct StateCell(RwLock<ConnectionState>);

impl StateCell {
    pub fn new() -> Self {
        Self(RwLock::new(ConnectionState::Uninitialized))
    }

    pub fn get(&self) -> ConnectionState {
        *self.0.read()
    }

    pub fn set(&self, state: ConnectionState) {
        *self.0.write() = state;
    }

    /// Move to `Initializing`, only from `Uninitialized`
    ///
    /// Returns the state that blocked the transition otherwise. The cell
    /// becomes `Failed` when the returned guard is dropped without
    /// [`InitGuard::ready`], including when the initializing future is
    /// cancelled.
    pub fn begin_initializing(&self) -> Result<InitGuard<'_>, ConnectionState> {
        let mut state = self.0.write();
        match *state {
            ConnectionState::Uninitialized => {
                *state = ConnectionState::Initializing;
                Ok(InitGuard { cell: self, armed: true })
            }
            other => Err(other),
        }
    }
}

/// An initialization in progress
#[must_use = "dropping the guard marks the connection failed"]
pub struct InitGuard<'a> {
    cell: &'a StateCell,
    armed: bool,
}

impl InitGuard<'_> {
    /// Mark the connection `Ready`
    pub fn ready(mut self) {
        self.armed = false;
        self.cell.set(ConnectionState::Ready);
    }
}

impl Drop for InitGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.cell.set(ConnectionState::Failed);
        }
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_initializing_guards() {
        let cell = StateCell::new();
        let guard = cell.begin_initializing().unwrap();
        assert_eq!(cell.get(), ConnectionState::Initializing);
        assert_eq!(cell.begin_initializing().err(), Some(ConnectionState::Initializing));
        guard.ready();
        assert_eq!(cell.get(), ConnectionState::Ready);

        cell.set(ConnectionState::Failed);
        assert_eq!(cell.begin_initializing().err(), Some(ConnectionState::Failed));
        assert_eq!(cell.get(), ConnectionState::Failed);

        cell.set(ConnectionState::Closed);
        assert_eq!(cell.begin_initializing().err(), Some(ConnectionState::Closed));
    }

    #[test]
    fn test_dropped_guard_marks_failed() {
        let cell = StateCell::new();
        drop(cell.begin_initializing().unwrap());
        assert_eq!(cell.get(), ConnectionState::Failed);
        assert!(cell.begin_initializing().is_err());
    }
}
