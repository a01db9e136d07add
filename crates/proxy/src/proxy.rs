//! Owned proxy state and the request handler boundary.
//!
//! One `Proxy` is constructed per process and handed to the external
//! dispatcher, which calls [`Proxy::handle`] once per intercepted request and
//! gets exactly one response back. No ambient globals: configuration, store,
//! and lifecycle all live here.

use std::sync::Arc;

use crate::classify::Classifier;
use crate::lifecycle::{ActivationReport, LifecycleManager};
use crate::manifest::{Manifest, PopulateReport};
use crate::policy::PolicyEngine;
use crate::request::{ProxyRequest, ProxyResponse};
use outpost_client::Network;
use outpost_core::{Error, ProxyConfig, StoreDb};
use url::Url;

/// The proxy: lifecycle gate, classifier, and policy engine over one shared
/// store and network.
pub struct Proxy {
    classifier: Classifier,
    engine: PolicyEngine,
    lifecycle: LifecycleManager,
    network: Arc<dyn Network>,
}

impl Proxy {
    /// Assemble a proxy from configuration, an opened store, and a network.
    pub fn new(config: &ProxyConfig, store: StoreDb, network: Arc<dyn Network>) -> Result<Self, Error> {
        let origin = Url::parse(&config.origin).map_err(|e| Error::InvalidUrl(format!("{}: {e}", config.origin)))?;

        let classifier = Classifier::new(config.api_path_prefixes.clone(), &config.image_path_patterns)?;
        let engine =
            PolicyEngine::new(store.clone(), Arc::clone(&network), config.store_version_tag.clone(), origin.clone());
        let lifecycle = LifecycleManager::new(
            store,
            Arc::clone(&network),
            config.store_version_tag.clone(),
            Manifest::new(config.manifest.clone()),
            origin,
        );

        Ok(Self { classifier, engine, lifecycle, network })
    }

    /// Precache the manifest under this build's store version.
    pub async fn install(&self) -> Result<PopulateReport, Error> {
        self.lifecycle.install().await
    }

    /// Take over interception and discard superseded store versions.
    pub async fn activate(&self) -> Result<ActivationReport, Error> {
        self.lifecycle.activate().await
    }

    /// Answer one intercepted request.
    ///
    /// Requests arriving before activation (or after supersession), and
    /// requests the classifier bypasses, are forwarded to the network
    /// untouched. Everything else goes through the matched policy. Background
    /// refreshes spawned by a policy are detached here; the caller never
    /// waits on them.
    pub async fn handle(&self, req: ProxyRequest) -> Result<ProxyResponse, Error> {
        if !self.lifecycle.is_active() {
            return self.forward(&req).await;
        }

        let Some(class) = self.classifier.classify(&req) else {
            return self.forward(&req).await;
        };

        let executed = self.engine.execute(class, &req).await?;
        drop(executed.refresh);
        Ok(executed.response)
    }

    async fn forward(&self, req: &ProxyRequest) -> Result<ProxyResponse, Error> {
        let resp = self.network.fetch(&req.method, &req.url).await?;
        Ok(ProxyResponse::from_network(resp))
    }

    /// Number of background refreshes that have run to completion.
    pub fn completed_refreshes(&self) -> u64 {
        self.engine.completed_refreshes()
    }

    pub fn lifecycle(&self) -> &LifecycleManager {
        &self.lifecycle
    }
}
