use std::collections::HashMap;

use serde::Serialize;

use crate::event::unix_timestamp;

/// A plugin's self-reported health, filled in by its `check_health` hook.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub healthy: bool,
    pub message: String,
    /// How many checks in a row have reported unhealthy; maintained by the
    /// manager, not by the plugin.
    pub consecutive_failures: u32,
    /// Unix timestamp of this check.
    pub checked_at: i64,
    /// Free-form labels, e.g. connection counts or endpoint addresses.
    pub details: HashMap<String, String>,
}

impl Default for HealthReport {
    fn default() -> Self {
        Self {
            healthy: true,
            message: "ok".to_string(),
            consecutive_failures: 0,
            checked_at: unix_timestamp(),
            details: HashMap::new(),
        }
    }
}

impl HealthReport {
    pub fn mark_unhealthy(&mut self, message: impl Into<String>) {
        self.healthy = false;
        self.message = message.into();
    }

    pub fn set_detail(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.details.insert(key.into(), value.into());
    }
}

/// One plugin's report, tagged with its identity.
#[derive(Debug, Clone, Serialize)]
pub struct PluginHealth {
    pub name: String,
    pub instance_id: String,
    pub report: HealthReport,
}

/// The process-wide verdict: healthy iff every plugin reports healthy.
#[derive(Debug, Clone, Serialize)]
pub struct SystemHealth {
    pub healthy: bool,
    pub checked_at: i64,
    pub plugins: Vec<PluginHealth>,
}

impl SystemHealth {
    /// Fold per-plugin reports into one verdict.
    pub fn from_reports(plugins: Vec<PluginHealth>) -> Self {
        Self {
            healthy: plugins.iter().all(|p| p.report.healthy),
            checked_at: unix_timestamp(),
            plugins,
        }
    }

    /// The plugins currently reporting a problem.
    pub fn unhealthy_plugins(&self) -> Vec<&PluginHealth> {
        self.plugins.iter().filter(|p| !p.report.healthy).collect()
    }
}
