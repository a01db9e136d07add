//! Install / activate / runtime state machine.
//!
//! One manager exists per proxy instance, so activation is serialized by
//! construction. A new build's manager takes over immediately on activation
//! rather than waiting for existing sessions to end: faster rollout of fixes
//! is worth imperfect version consistency within an already-open session.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use crate::manifest::{Manifest, PopulateReport, populate};
use outpost_client::Network;
use outpost_core::{Error, StoreDb};
use url::Url;

/// Lifecycle states, in takeover order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LifecycleState {
    Installing = 0,
    Waiting = 1,
    Activating = 2,
    Active = 3,
    Superseded = 4,
}

impl LifecycleState {
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleState::Installing => "Installing",
            LifecycleState::Waiting => "Waiting",
            LifecycleState::Activating => "Activating",
            LifecycleState::Active => "Active",
            LifecycleState::Superseded => "Superseded",
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => LifecycleState::Installing,
            1 => LifecycleState::Waiting,
            2 => LifecycleState::Activating,
            3 => LifecycleState::Active,
            _ => LifecycleState::Superseded,
        }
    }
}

/// Outcome of an activation's version cleanup.
///
/// `leftover` holds stale versions whose deletion failed; they are retried
/// opportunistically by the next activation rather than failing this one.
#[derive(Debug, Clone, Default)]
pub struct ActivationReport {
    pub deleted: Vec<String>,
    pub leftover: Vec<String>,
}

/// Drives one store generation through install, activation, and takeover.
pub struct LifecycleManager {
    state: AtomicU8,
    version: String,
    store: StoreDb,
    network: Arc<dyn Network>,
    manifest: Manifest,
    origin: Url,
}

impl LifecycleManager {
    pub fn new(store: StoreDb, network: Arc<dyn Network>, version: impl Into<String>, manifest: Manifest, origin: Url) -> Self {
        Self {
            state: AtomicU8::new(LifecycleState::Installing as u8),
            version: version.into(),
            store,
            network,
            manifest,
            origin,
        }
    }

    pub fn state(&self) -> LifecycleState {
        LifecycleState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn is_active(&self) -> bool {
        self.state() == LifecycleState::Active
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    fn set_state(&self, state: LifecycleState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    fn expect_state(&self, expected: LifecycleState, action: &'static str) -> Result<(), Error> {
        let current = self.state();
        if current != expected {
            return Err(Error::InvalidTransition { action, state: current.name() });
        }
        Ok(())
    }

    /// Register the new store version and precache the manifest.
    ///
    /// Partial manifest failure never fails the install; the report carries
    /// what was and wasn't captured. Transitions Installing -> Waiting.
    pub async fn install(&self) -> Result<PopulateReport, Error> {
        self.expect_state(LifecycleState::Installing, "install")?;

        self.store.register_version(&self.version).await?;
        let report = populate(&self.store, self.network.as_ref(), &self.version, &self.manifest, &self.origin).await;

        tracing::info!(
            "installed store version {}: {}/{} manifest items captured",
            self.version,
            report.stored,
            report.attempted
        );

        self.set_state(LifecycleState::Waiting);
        Ok(report)
    }

    /// Take over immediately and discard superseded store versions.
    ///
    /// Cleanup is best-effort: enumeration or deletion failures are logged
    /// and reported, never fatal. Whatever survives is retried by the next
    /// activation, since cleanup always targets every version but our own.
    /// Transitions Waiting -> Activating -> Active.
    pub async fn activate(&self) -> Result<ActivationReport, Error> {
        self.expect_state(LifecycleState::Waiting, "activate")?;
        self.set_state(LifecycleState::Activating);

        let mut report = ActivationReport::default();

        match self.store.list_versions().await {
            Ok(versions) => {
                for stale in versions.into_iter().filter(|v| *v != self.version) {
                    match self.store.delete_version(&stale).await {
                        Ok(entries) => {
                            tracing::info!("discarded store version {stale} ({entries} entries)");
                            report.deleted.push(stale);
                        }
                        Err(err) => {
                            tracing::warn!("failed to discard store version {stale}: {err}");
                            report.leftover.push(stale);
                        }
                    }
                }
            }
            Err(err) => {
                tracing::warn!("version enumeration failed, deferring cleanup: {err}");
            }
        }

        self.set_state(LifecycleState::Active);
        tracing::info!("store version {} active", self.version);
        Ok(report)
    }

    /// Observe whether a newer activation has discarded this version, and if
    /// so transition to Superseded.
    pub async fn check_superseded(&self) -> Result<bool, Error> {
        if self.state() == LifecycleState::Active && !self.store.has_version(&self.version).await? {
            tracing::info!("store version {} superseded", self.version);
            self.set_state(LifecycleState::Superseded);
        }
        Ok(self.state() == LifecycleState::Superseded)
    }
}
