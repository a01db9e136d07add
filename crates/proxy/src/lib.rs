//! Client-resident caching proxy for outpost.
//!
//! Sits between an application's outbound requests and the network,
//! classifies each request, and applies a per-class caching policy over the
//! versioned durable store:
//!
//! - API calls pass straight through and are never served stale
//! - images are served from the store once seen and refreshed only on miss
//! - shell and static assets return instantly from the store while a
//!   background task refreshes them for later requests
//!
//! The install/activate lifecycle precaches the shell manifest under a new
//! store generation and discards superseded generations on takeover.

pub mod classify;
pub mod lifecycle;
pub mod manifest;
pub mod policy;
pub mod proxy;
pub mod request;

#[cfg(test)]
pub(crate) mod testing;

pub use classify::{Classifier, RequestClass};
pub use lifecycle::{ActivationReport, LifecycleManager, LifecycleState};
pub use manifest::{Manifest, PopulateFailure, PopulateReport, populate};
pub use policy::{Executed, PolicyEngine};
pub use proxy::Proxy;
pub use request::{ProxyRequest, ProxyResponse, ResourceKind, ServedFrom};
