use std::fmt;

use serde::Serialize;

/// Lifecycle state of one plugin instance.
///
/// Transitions are driven exclusively by the manager; a plugin cannot move
/// itself except into `Failed` via a reported error or contained panic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PluginState {
    /// Instantiated and known to the manager, lifecycle not yet driven.
    Registered,
    /// `initialize_resources` is running.
    Initializing,
    /// Resources set up, not yet started.
    Initialized,
    /// `startup_tasks` is running.
    Starting,
    /// Fully operational and reachable via `get_plugin`.
    Active,
    /// `cleanup_tasks` is running.
    Stopping,
    /// Gracefully shut down.
    Stopped,
    /// A hook failed, timed out, or panicked; the captured error is kept on
    /// the manager entry.
    Failed,
}

impl PluginState {
    pub fn name(&self) -> &'static str {
        match self {
            PluginState::Registered => "registered",
            PluginState::Initializing => "initializing",
            PluginState::Initialized => "initialized",
            PluginState::Starting => "starting",
            PluginState::Active => "active",
            PluginState::Stopping => "stopping",
            PluginState::Stopped => "stopped",
            PluginState::Failed => "failed",
        }
    }

    /// Whether the state machine permits `self -> next`. Any state may
    /// transition to `Failed`.
    pub fn can_transition_to(self, next: PluginState) -> bool {
        use PluginState::*;
        if next == Failed {
            return true;
        }
        matches!(
            (self, next),
            (Registered, Initializing)
                | (Initializing, Initialized)
                | (Initialized, Starting)
                | (Starting, Active)
                | (Active, Stopping)
                | (Stopping, Stopped)
        )
    }
}

impl fmt::Display for PluginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
