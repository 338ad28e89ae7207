//! Presence tracker CLI library.
//!
//! This crate provides the `pt` command-line interface over the tracker
//! services: ingest, zone administration, queries and export.

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands, RangeArgs, ZoneAction};
pub use config::Config;
