//! HTTP transport for card and Google Pay tokenization.
//!
//! Implements [`tokenization::network::TokenNetworkApiClient`] on top of
//! `reqwest`, and wires a configured client into a
//! [`tokenization::repository::TokenRepository`].
//!
//! # Modules
//!
//! - [`constants`] - Base URLs, endpoint paths and header names
//! - [`client`] - The HTTP token client
//! - [`error`] - Client construction errors

pub mod client;
pub mod constants;
pub mod error;

pub use client::{HttpTokenClient, repository_from_config};
pub use error::HttpClientError;
