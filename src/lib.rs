//! Credential and token-lifecycle service for the link shortener.
//!
//! Verifies passwords, mints access/refresh token pairs, rotates and revokes
//! refresh tokens, and answers stateless "is this access token valid" calls.

pub mod auth;
pub mod configuration;
pub mod error;
pub mod logger;
pub mod middleware;
pub mod routes;
pub mod session;
pub mod startup;
pub mod store;
pub mod telemetry;
pub mod validators;
