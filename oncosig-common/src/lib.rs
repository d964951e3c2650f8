//! Shared types for the oncosig resistance decision engine
//!
//! Home of everything the engine shares with its collaborators: the clinical
//! vocabulary (signal kinds, risk levels, actions), the site-keyed
//! configuration surface, the engine event types, and the event dispatcher.

pub mod config;
pub mod error;
pub mod events;
pub mod model;

pub use error::{Error, Result};
