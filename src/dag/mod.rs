// src/dag/mod.rs

//! DAG representation and scheduling.
//!
//! - [`plan`] resolves a stage sequence (plus `after` edges) into a
//!   validated, acyclic plan.
//! - [`registry`] maps task names to their configured units of work.
//! - [`graph`] holds the adjacency lists of a plan.
//! - [`scheduler`] contains the per-run state machine that decides
//!   which tasks are ready to run, and when dependents can be scheduled.
//! - [`task_info`] provides task metadata and scheduled task types.
//! - [`scheduler_step`] defines the result type for scheduler steps.
//! - [`state_manager`] manages per-run state transitions.

pub mod graph;
pub mod plan;
pub mod registry;
pub mod scheduler;
pub mod scheduler_step;
pub mod state_manager;
pub mod task_info;

pub use graph::DagGraph;
pub use plan::{ConcurrencyClass, PlannedTask, StagePlan};
pub use registry::{RegisteredTask, TaskRegistry};
pub use scheduler::Scheduler;
pub use scheduler_step::SchedulerStep;
pub use task_info::{ScheduledTask, TaskRunState};
