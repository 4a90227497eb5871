//! Task execution: one task's pipeline from resolution to the final output file.
//!
//! Split into focused submodules:
//! - [`context`] - Shared state of a running task and record persistence helpers
//! - [`resolution`] - Stream selection and output naming
//! - [`transfer`] - Concurrent stream retrieval with sibling cancellation
//! - [`orchestration`] - Top-level task lifecycle
//! - [`finalization`] - Terminal status, events and cleanup

mod context;
mod finalization;
mod orchestration;
mod resolution;
mod transfer;


pub(crate) use context::DownloadTaskContext;
pub(crate) use orchestration::run_download_task;
