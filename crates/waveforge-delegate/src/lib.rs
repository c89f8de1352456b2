//! Delegate abstraction for waveforge
//!
//! A delegate is the external worker that carries out a task, a quality check or a
//! repair. The orchestrator only sees the [`DelegateExecutor`] trait; budget
//! enforcement wraps any implementation through [`BudgetedDelegate`], and quality
//! responses are reduced to a [`DelegateVerdict`] by [`VerdictParser`].

mod budget;
mod budgeted;
mod dry_run;
mod types;
mod verdict;

pub use budget::BudgetTracker;
pub use budgeted::BudgetedDelegate;
pub use dry_run::DryRunDelegate;
pub use types::{DelegateContext, DelegateExecutor, DelegateOutput, InvocationPurpose};
pub use verdict::{DelegateVerdict, VerdictParser};
pub use waveforge_utils::error::DelegateError;
