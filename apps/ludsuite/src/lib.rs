//! # LUD Suite
//!
//! HTTP API, CLI and configuration around `ludsuite-core`.

pub mod api;
pub mod cli;
pub mod config;
