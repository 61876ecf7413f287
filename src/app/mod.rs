// LogTab - app/mod.rs
//
// Application layer: the live tail worker, the display buffer, and the
// coordinator that ties them to a job's lifecycle.
// Dependencies: core, platform (reveal only), util.
// Must NOT depend on: ui.

pub mod buffer;
pub mod coordinator;
pub mod diagnostics;
pub mod tail;
