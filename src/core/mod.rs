// LogTab - core/mod.rs
//
// Core business logic layer: classification, sanitization, status summary.
// Dependencies: util, regex, chrono, html-escape.
// Must NOT depend on: ui, platform, app, or perform any I/O.

pub mod classify;
pub mod markup;
pub mod model;
pub mod summary;
