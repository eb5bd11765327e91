//! Combat use cases: the queue worker and the synchronous fight endpoint.

mod manual;
mod worker;

pub use manual::{ManualFight, ManualFightError};
pub use worker::{CombatWorker, CombatWorkerConfig, Disposition, WorkerState};
