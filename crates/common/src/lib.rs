//! Types shared by the HubSpot integration crates and service

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
