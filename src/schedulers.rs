use crate::prelude::*;

pub mod prelude {
    pub use super::{
        Scheduler,
        PriorityScheme,
        MigrationDegree,
    };
    pub use super::gedf::GEDF;
    pub use super::gdm::GDM;
    pub use super::gfifo::GFIFO;
    pub use super::gllf::GLLF;
    pub use super::edzl::EDZL;
    pub use super::llref::LLREF;
    pub use super::pd2::PD2;
    pub use super::uedf::UEDF;
}

pub mod helpers;

pub mod gedf;
pub mod gdm;
pub mod gfifo;
pub mod gllf;
pub mod edzl;
pub mod llref;
pub mod pd2;
pub mod uedf;

use crate::simulation::{ScheduleDecision, SimModel};

/// Priority model a policy falls under. Classification metadata only; the
/// engine never branches on it.
#[derive(Clone, Copy)]
#[derive(Debug)]
#[derive(PartialEq, Eq)]
pub enum PriorityScheme {
    Static,
    JobLevelDynamic,
    UnrestrictedDynamic,
}

/// How freely a policy moves jobs between cores. Restricted means no
/// migration mid-execution; Full permits any.
#[derive(Clone, Copy)]
#[derive(Debug)]
#[derive(PartialEq, Eq)]
pub enum MigrationDegree {
    Partitioned,
    Restricted,
    Full,
}

/// A global scheduling policy.
///
/// The engine calls `schedule` at every event with a read-only view of the
/// world; the policy answers with a core assignment and the next time it
/// wants to be consulted. Policies may keep private state between calls
/// (plane maps, budgets, validity flags), owned exclusively by the engine
/// they are bound to.
pub trait Scheduler {
    fn priority_scheme(&self) -> PriorityScheme;

    fn migration_degree(&self) -> MigrationDegree;

    fn name(&self) -> &'static str;

    /// Called once by `SimModel::reset` before the run starts.
    fn init(&mut self, _task_set: &[Task], _cores: usize) {}

    /// Assign active jobs to cores and pick the next decision time, which
    /// must lie strictly after `model.time`.
    fn schedule(&mut self, model: &SimModel) -> ScheduleDecision;
}

// =============================================================================

#[test]
fn policies_declare_their_classification() {
    let policies: Vec<Box<dyn Scheduler>> = vec![
        Box::new(GEDF),
        Box::new(GDM),
        Box::new(GFIFO),
        Box::new(GLLF::new()),
        Box::new(EDZL),
        Box::new(LLREF::new()),
        Box::new(PD2::new(true)),
        Box::new(UEDF::new()),
    ];
    let expected = [
        ("GEDF", PriorityScheme::JobLevelDynamic, MigrationDegree::Full),
        ("GDM", PriorityScheme::Static, MigrationDegree::Full),
        ("GFIFO", PriorityScheme::Static, MigrationDegree::Restricted),
        ("GLLF", PriorityScheme::JobLevelDynamic, MigrationDegree::Full),
        ("EDZL", PriorityScheme::JobLevelDynamic, MigrationDegree::Full),
        ("LLREF", PriorityScheme::UnrestrictedDynamic, MigrationDegree::Full),
        ("PD2", PriorityScheme::UnrestrictedDynamic, MigrationDegree::Full),
        ("UEDF", PriorityScheme::UnrestrictedDynamic, MigrationDegree::Full),
    ];
    for (policy, (name, scheme, degree)) in policies.iter().zip(expected) {
        assert_eq!(policy.name(), name);
        assert_eq!(policy.priority_scheme(), scheme);
        assert_eq!(policy.migration_degree(), degree);
    }
}
