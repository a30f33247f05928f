//! Core domain models for policy compilation
//!
//! This module defines the fundamental data structures that represent
//! pipeline configurations, security policies, and compilation requests.

pub mod config;
pub mod policy;
pub mod request;

pub use config::*;
pub use policy::*;
pub use request::*;
