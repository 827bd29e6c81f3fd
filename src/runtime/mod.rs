//! Single-writer pipeline runtime and event stream APIs.

/// Event stream types emitted by the runtime.
pub mod events;
/// Handle and pipeline loop implementation.
pub mod handle;
