//! Mediaconv - image and video conversion engine
//!
//! This library crate exposes the conversion engine for the binary and for
//! integration testing.

pub mod archive;
pub mod config;
pub mod context;
pub mod conversion;
pub mod events;
pub mod geometry;
pub mod persistence;
pub mod transcode;

pub use context::Context;
