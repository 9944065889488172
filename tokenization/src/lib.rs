#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Core types and request pipeline for card and Google Pay tokenization.
//!
//! Raw card details or a Google Pay payload go in; an opaque token with card
//! metadata, or a typed error, comes out. Every attempt is reported to an
//! analytics logger along the way.
//!
//! # Overview
//!
//! A [`TokenRepository`](repository::TokenRepository) validates card details
//! locally, maps them into the wire request, hands the request to a
//! [`TokenNetworkApiClient`](network::TokenNetworkApiClient), and maps the
//! outcome into [`TokenDetails`](response::TokenDetails) or a
//! [`TokenRequestError`](error::TokenRequestError). The HTTP client lives in
//! the `tokenization-http` crate; this crate stays transport-agnostic.
//!
//! # Modules
//!
//! - [`card`] - Card details, scheme detection and the Luhn checksum
//! - [`config`] - Client configuration and environment selection
//! - [`error`] - Error codes and the request error type
//! - [`logging`] - Analytics events, sinks and the lifecycle logger
//! - [`network`] - Network client trait and its four-way outcome
//! - [`repository`] - The request orchestrator
//! - [`request`] - Request bodies sent to the service
//! - [`response`] - Service response bodies and domain token details
//! - [`validation`] - Local card validation
//!
//! # Feature Flags
//!
//! - `config` - TOML configuration loading with environment variable expansion
//! - `telemetry` - Enables tracing instrumentation and the tracing event sink

pub mod card;
pub mod config;
pub mod error;
pub mod logging;
pub mod network;
pub mod repository;
pub mod request;
pub mod response;
pub mod validation;
