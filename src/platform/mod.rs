// LogTab - platform/mod.rs
//
// Platform abstraction layer.
// Dependencies: util, core (pattern compilation), directories, toml.
// Must NOT depend on: app, ui.

pub mod config;
pub mod fs;
