//! Workflow orchestration over a [`BackendContract`](crate::backend::BackendContract)
//!
//! - [`JobCompletionWaiter`] polls a background job until it stops running.
//! - [`OperationSequencer`] runs trigger -> wait for job -> refresh versions.
//! - [`DiskStateController`] runs disk action -> refresh disks, and boot
//!   extension.
//! - [`Completion`] adapts any operation to done/fail/always handlers.
//!
//! All of these only await; none of them spawn tasks or threads.

pub mod completion;
pub mod disks;
pub mod sequencer;
pub mod waiter;

pub use completion::Completion;
pub use disks::DiskStateController;
pub use sequencer::{OperationSequencer, VersionWorkflow, WorkflowReport, WorkflowState};
pub use waiter::{JobCompletionWaiter, PollPolicy, WaitOutcome};
