//! Failure injection consulted by the status collectors.
//!
//! The demo walkthrough needs a way to fake an outage without touching the
//! host. Probes never look at UI state; the controller derives a
//! [`FaultInjection`] value from the current demo phase and hands it to the
//! status dispatch.

/// Demo walkthrough phase, toggled by the hidden key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DemoPhase {
    #[default]
    Normal,
    Broken,
    Fixed,
}

/// Faults the probe layer should pretend to observe.
#[derive(Debug, Clone, Copy, Default)]
pub struct FaultInjection {
    pub postgres_down: bool,
}

impl FaultInjection {
    pub fn for_phase(phase: DemoPhase) -> Self {
        Self {
            postgres_down: phase == DemoPhase::Broken,
        }
    }

    /// Whether the injection forces the named service down.
    pub fn forces_down(&self, service: &str) -> bool {
        self.postgres_down && service == "PostgreSQL"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broken_phase_forces_postgres_down() {
        let inj = FaultInjection::for_phase(DemoPhase::Broken);
        assert!(inj.forces_down("PostgreSQL"));
        assert!(!inj.forces_down("MySQL"));
    }

    #[test]
    fn other_phases_inject_nothing() {
        assert!(!FaultInjection::for_phase(DemoPhase::Normal).forces_down("PostgreSQL"));
        assert!(!FaultInjection::for_phase(DemoPhase::Fixed).forces_down("PostgreSQL"));
    }
}
