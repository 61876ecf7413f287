// LogTab - ui/mod.rs
//
// UI layer: presentation only.
// Dependencies: app (render notices), core (markup), util.
// Must NOT depend on: platform, direct file I/O.

pub mod console;
pub mod theme;
