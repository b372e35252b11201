//! Extends a Control Tower landing zone with AWS Config in additional regions.
//!
//! `provision_stacksets` handles the custom resource that creates or removes the
//! Config and conformance-pack StackSets; `lifecycle_event` adds newly vended
//! accounts to the Config StackSet.

pub mod api;
pub mod cfn_response;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod organization;
pub mod parameters;
pub mod poll;
pub mod provision;
pub mod stackset;

#[cfg(test)]
pub(crate) mod fakes;

pub use error::{ApiError, ConfigError, EventError, ResponseError};
