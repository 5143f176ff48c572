//! # ht-dispatch
//!
//! Batch job dispatch for Hivetune: splits a token stream into jobs, submits
//! each to the execution substrate as a detached asynchronous task with its
//! resource grant, streams live output to an observer, and collects one
//! result per job in submission order.
//!
//! One job's failure never cancels its siblings; discovery and allocation
//! errors are the only ones that abort a batch, and they do so before any
//! job is submitted.

mod command;
mod dispatcher;
mod local;

pub use command::{split_commands, DEFAULT_JOB_MARKER_SUFFIX};
pub use dispatcher::{spawn_log_observer, JobDispatcher, JobHandle};
pub use local::LocalProcessSubstrate;
