//! Network edge for outpost.
//!
//! This crate provides the HTTP fetch pipeline behind the proxy's caching
//! policies, and the `Network` trait the policy engine is written against.

pub mod fetch;

pub use fetch::{FetchClient, FetchConfig, FetchedResponse, Network, UrlError, canonicalize};

pub use reqwest::{Method, StatusCode, header};
