//! Shared utilities for AEM modules

pub mod client;
pub mod config_text;
pub mod connection;
pub mod credentials;
pub mod packmgr_xml;
pub mod security;

pub use client::{AemClient, HttpClientError, HttpResponse};
pub use connection::ConnectionSpec;
