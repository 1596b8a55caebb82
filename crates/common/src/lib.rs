//! Shared types for the clinic-admin workspace

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
