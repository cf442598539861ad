use crate::error::{DetectorError, DetectorResult};
use crate::host::Host;

/// One-time start-up gate: the host must run an event loop and offer
/// long-task observation. Subscribe-time rejection is checked separately
/// when the runtime registers its observers.
pub fn probe<H: Host + ?Sized>(host: &H) -> DetectorResult<()> {
    if !host.has_event_loop() {
        return Err(DetectorError::environment(
            "host cannot run timers or report visibility and refreshes",
        ));
    }
    if !host.supports_long_tasks() {
        return Err(DetectorError::unsupported(
            "host has no long-task observer, lag detection disabled",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimulatedHost;

    #[test]
    fn full_host_passes() {
        assert!(probe(&SimulatedHost::new()).is_ok());
    }

    #[test]
    fn missing_event_loop_is_environment_unavailable() {
        let host = SimulatedHost::new().without_event_loop();
        assert!(matches!(
            probe(&host),
            Err(DetectorError::EnvironmentUnavailable(_))
        ));
    }

    #[test]
    fn missing_long_tasks_is_unsupported() {
        let host = SimulatedHost::new().without_long_tasks();
        assert!(matches!(
            probe(&host),
            Err(DetectorError::CapabilityUnsupported(_))
        ));
    }
}
