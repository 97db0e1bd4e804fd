//! The deployment task pipeline.
//!
//! [`TaskList::build`] picks and orders the [`Step`]s for an environment,
//! and [`Executor`] runs them one at a time against a [`RunContext`]. The
//! relative order is fixed:
//!
//! build → archive → connect → upload → backup → remove-remote → unzip →
//! clean-local → disconnect

mod context;
mod executor;
mod step;
mod task_list;

pub use context::{Capabilities, RunContext};
pub use executor::{Executor, ExecutorState, RunSummary};
pub use step::Step;
pub use task_list::TaskList;
