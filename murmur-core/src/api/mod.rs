// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Murmur API Layer
//!
//! High-level handle for embedding the tracing core in an application.
//!
//! # Module Structure
//!
//! - [`error`] - Error types for the API layer
//! - [`config`] - Configuration types
//! - [`murmur`] - Main orchestrator

#[cfg(feature = "testing")]
pub mod config;
#[cfg(not(feature = "testing"))]
mod config;

#[cfg(feature = "testing")]
pub mod error;
#[cfg(not(feature = "testing"))]
mod error;

#[cfg(feature = "testing")]
pub mod murmur;
#[cfg(not(feature = "testing"))]
mod murmur;

pub use config::MurmurConfig;
pub use error::{MurmurError, MurmurResult};
pub use murmur::{Murmur, PROTOCOL_VERSION};
