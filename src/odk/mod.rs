//! Access to attachments stored in the external ODK Aggregate database.

pub mod client;
pub mod locator;
pub mod query;

pub use client::*;
pub use locator::*;
pub use query::*;
