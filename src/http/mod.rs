//! HTTP client module for utc

pub mod client;
pub use client::HttpClient;
