// LogTab - lib.rs
//
// Library entry point. The coordinator and its building blocks are usable
// from any host; `main.rs` is the command-line one.

pub mod app;
pub mod core;
pub mod platform;
pub mod ui;
pub mod util;
