//! Process-supervisor integration.
//!
//! The gateway never restarts itself; it asks the external process manager
//! to do so and keeps serving in the meantime.

use crate::config::SupervisorConfig;
use std::process::Command;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Why a restart is being requested; selects the configured process slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartReason {
    /// Credential delivery failed after linking.
    DeliveryFailure,
    /// Session setup failed before a code was issued.
    SetupFailure,
    /// The last-resort handler caught an unhandled fault.
    Fault,
}

/// Fire-and-forget restart requests plus the process-wide fault handler.
pub struct Supervisor {
    config: SupervisorConfig,
}

impl Supervisor {
    pub fn new(config: SupervisorConfig) -> Arc<Self> {
        Arc::new(Self { config })
    }

    /// Ask the process manager to restart the app configured for `reason`.
    ///
    /// Fire-and-forget: the child is spawned and never awaited. A missing
    /// process name means the slot is disabled; spawn failures are logged
    /// and swallowed.
    pub fn request_restart(&self, reason: RestartReason) {
        let process = match reason {
            RestartReason::DeliveryFailure => self.config.delivery_process.as_deref(),
            RestartReason::SetupFailure => self.config.fallback_process.as_deref(),
            RestartReason::Fault => self.config.guard_process.as_deref(),
        };
        let Some(name) = process else {
            return;
        };

        info!(process = %name, ?reason, "Requesting supervisor restart");
        if let Err(e) = Command::new("pm2").args(["restart", name]).spawn() {
            warn!(process = %name, error = %e, "Failed to spawn restart command");
        }
    }

    /// Install the process-wide last-resort fault handler.
    ///
    /// Chains onto the existing panic hook: logs the fault and requests the
    /// guard restart, then defers to the previous hook. The handler itself
    /// never exits the process; a panicking session task dies alone.
    pub fn install_fault_handler(self: &Arc<Self>) {
        let supervisor = Arc::clone(self);
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            error!("Unhandled fault: {}", info);
            supervisor.request_restart(RestartReason::Fault);
            previous(info);
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unconfigured_slots_are_noops() {
        let supervisor = Supervisor::new(SupervisorConfig::default());
        supervisor.request_restart(RestartReason::DeliveryFailure);
        supervisor.request_restart(RestartReason::SetupFailure);
        supervisor.request_restart(RestartReason::Fault);
    }

    #[test]
    fn test_spawn_failure_is_swallowed() {
        // pm2 is not installed in the test environment; the spawn error
        // must not escape.
        let supervisor = Supervisor::new(SupervisorConfig {
            delivery_process: Some("pair-gateway".into()),
            fallback_process: None,
            guard_process: None,
        });
        supervisor.request_restart(RestartReason::DeliveryFailure);
    }
}
