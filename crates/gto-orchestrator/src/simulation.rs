use gto_core::*;

use crate::SimulationSpec;

/// Simulation lifecycle. Transitions only move forward:
/// `Pending → Running → (Completed | Failed | Cancelled)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimulationStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl SimulationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// The orchestrator's record of one simulation.
///
/// The strategy table itself lives alongside in the handle; this record is
/// the cheap-to-clone read model behind the status and list surfaces.
#[derive(Debug, Clone)]
pub struct Simulation {
    pub id: ID<Sim>,
    pub spec: SimulationSpec,
    pub status: SimulationStatus,
    pub iterations_completed: Epoch,
    pub current_exploitability: Option<f64>,
    pub created_at: u64,
    pub updated_at: u64,
    pub started_at: Option<u64>,
    pub completed_at: Option<u64>,
    /// Running but unable to dispatch (broker outage).
    pub stalled: bool,
    /// Artifact reference of the latest checkpoint.
    pub checkpoint: Option<String>,
    /// Why the simulation failed, when it did.
    pub error: Option<String>,
}

impl Simulation {
    pub fn new(id: ID<Sim>, spec: SimulationSpec) -> Self {
        Self {
            id,
            spec,
            status: SimulationStatus::Pending,
            iterations_completed: 0,
            current_exploitability: None,
            created_at: now(),
            updated_at: now(),
            started_at: None,
            completed_at: None,
            stalled: false,
            checkpoint: None,
            error: None,
        }
    }

    /// Applies a forward transition; anything else is refused so a
    /// terminal status can never regress.
    pub fn transition(&mut self, next: SimulationStatus) -> bool {
        use SimulationStatus::*;
        let legal = matches!(
            (self.status, next),
            (Pending, Running)
                | (Pending, Cancelled)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Cancelled)
        );
        if legal {
            self.status = next;
            self.updated_at = now();
            match next {
                Running => self.started_at = Some(now()),
                Completed | Failed | Cancelled => self.completed_at = Some(now()),
                _ => {}
            }
        }
        legal
    }

    /// Fraction of the iteration budget burned, for progress bars.
    pub fn progress_percentage(&self) -> f64 {
        match self.status {
            SimulationStatus::Completed => 100.0,
            _ => {
                100.0 * self.iterations_completed as f64
                    / self.spec.solver.max_iterations.max(1) as f64
            }
        }
    }

    /// Naive remaining-walltime estimate from observed throughput.
    pub fn estimated_time_remaining(&self) -> Option<u64> {
        let started = self.started_at?;
        if self.status != SimulationStatus::Running || self.iterations_completed == 0 {
            return None;
        }
        let elapsed = now().saturating_sub(started);
        let per_wave = elapsed as f64 / self.iterations_completed as f64;
        let left = self
            .spec
            .solver
            .max_iterations
            .saturating_sub(self.iterations_completed);
        Some((per_wave * left as f64) as u64)
    }

    pub fn convergence_time_seconds(&self) -> f64 {
        match (self.started_at, self.completed_at) {
            (Some(a), Some(b)) => b.saturating_sub(a) as f64,
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SolverConfig;
    use gto_cfr::TaskKind;
    use gto_kernel::GameConfig;

    fn simulation() -> Simulation {
        Simulation::new(
            ID::default(),
            SimulationSpec {
                kind: TaskKind::Preflop,
                name: None,
                description: None,
                game: GameConfig::default(),
                solver: SolverConfig::default(),
            },
        )
    }

    #[test]
    fn lifecycle_only_moves_forward() {
        let mut sim = simulation();
        assert!(sim.transition(SimulationStatus::Running));
        assert!(sim.transition(SimulationStatus::Completed));
        assert!(!sim.transition(SimulationStatus::Running));
        assert!(!sim.transition(SimulationStatus::Cancelled));
        assert_eq!(sim.status, SimulationStatus::Completed);
    }

    #[test]
    fn pending_can_be_cancelled_but_not_completed() {
        let mut sim = simulation();
        assert!(!sim.transition(SimulationStatus::Completed));
        assert!(sim.transition(SimulationStatus::Cancelled));
        assert!(sim.status.is_terminal());
    }

    #[test]
    fn progress_tracks_the_budget() {
        let mut sim = simulation();
        sim.spec.solver.max_iterations = 200;
        sim.iterations_completed = 50;
        assert_eq!(sim.progress_percentage(), 25.0);
    }
}
