//! UTC - Universal Test Catalog
//!
//! Orchestrates web, performance, API and network security testing tools
//! against a single target URL. The security suite (headers, TLS grading,
//! HAR capture, containerized baseline scan) runs in-process and records a
//! JSON summary next to each check's artifact.

pub mod artifacts;
pub mod capture;
pub mod config;
pub mod container;
pub mod error;
pub mod http;
pub mod models;
pub mod poll;
pub mod report;
pub mod runners;
pub mod scanner;
pub mod server;
