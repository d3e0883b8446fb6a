//! HTTP networking module
//!
//! Provides the HTTP client used for search calls, image downloads and uploads.

mod client;
mod user_agent;

pub use client::HttpClient;
