//! CSRF token models shared by the coordinator and credential stores.

pub mod secret;
pub mod token;

pub use secret::*;
pub use token::*;
