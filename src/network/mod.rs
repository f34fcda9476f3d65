//! HTTP networking module
//!
//! Provides the HTTP client the concrete search providers are built on.

mod client;
mod user_agent;

pub use client::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use user_agent::generate_user_agent;
