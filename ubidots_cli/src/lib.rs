//! Ubidots command line client library
//!
//! Configuration loading and payload assembly for the `ubidots` binary.

pub mod config;
pub mod payload;
