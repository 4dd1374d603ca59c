// StockScan - platform/mod.rs
//
// Platform abstraction layer: OS path resolution and config.toml loading.
// Dependencies: standard library, directories crate, core vocabulary types.
// Must NOT depend on: app.

pub mod config;
