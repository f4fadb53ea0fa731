//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the podcast hub core:
//! - Logging and tracing infrastructure
//! - Configuration management (endpoints, cache, retry and pagination constants)
//! - Event bus system
//! - Shared loading state
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that the other `core-*` crates
//! depend on. It establishes the logging conventions, the configuration
//! surface, and the event broadcasting used throughout the system.

pub mod config;
pub mod error;
pub mod events;
pub mod loading;
pub mod logging;

pub use error::{Error, Result};
pub use loading::{LoadingGuard, LoadingTracker};
