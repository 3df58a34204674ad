//! # stoat-exec
//!
//! Asynchronous execution of compiled graphs: a fixed worker pool
//! draining one FIFO queue, with idle tracking and sentinel shutdown.

pub mod queue;

pub use queue::{CompletionCallback, ExecutableGraph, GraphExecutionQueue};
