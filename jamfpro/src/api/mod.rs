//! Jamf Pro API client

pub mod auth;
pub mod buildings;
pub mod client;
pub mod common;
pub mod error;

pub use buildings::Building;
pub use client::{Client, HttpSettings};
pub use common::CreateResponse;
pub use error::ApiError;
