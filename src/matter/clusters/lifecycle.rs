//! Per-endpoint server lifecycle for clusters with a minimal and a fully
//! configurable implementation.
//!
//! Each managed cluster type gets one [`ServerLifecycle`]: a slot holding at
//! most one constructed server variant, created by the endpoint init callback
//! and torn down by the shutdown callback. The lifecycle is a context object
//! owned by the composition root; notification sites receive a reference to it.

use std::fmt::Debug;
use std::sync::Arc;

use log::{error, info, warn};
use parking_lot::Mutex;

use crate::matter::data_model::DataModelProvider;
use crate::matter::ids::{ClusterId, EndptId, ROOT_ENDPOINT};
use crate::matter::registry::{ClusterRegistration, ClusterServer, ServerRegistry};

/// A cluster type whose server implementation is chosen per endpoint from the
/// optional features enabled on it.
pub trait ManagedCluster: 'static {
    const CLUSTER_ID: ClusterId;
    const NAME: &'static str;

    /// Enablement snapshot taken once per init call.
    type Snapshot: Debug;
    /// Configuration shared by both variants, fixed at lifecycle creation.
    type Context: Send + Sync;
    type Minimal: ClusterServer + 'static;
    type Full: ClusterServer + 'static;

    fn snapshot(provider: &dyn DataModelProvider, endpoint: EndptId) -> Self::Snapshot;

    /// Whether the snapshot needs the fully configurable variant. Must be pure.
    fn requires_full(snapshot: &Self::Snapshot) -> bool;

    fn build_minimal(
        endpoint: EndptId,
        snapshot: Self::Snapshot,
        context: &Self::Context,
    ) -> Self::Minimal;

    fn build_full(endpoint: EndptId, snapshot: Self::Snapshot, context: &Self::Context)
    -> Self::Full;
}

/// The constructed server held by a slot.
pub enum ServerVariant<M, F> {
    Minimal(Arc<M>),
    Full(Arc<F>),
}

impl<M, F> Clone for ServerVariant<M, F> {
    fn clone(&self) -> Self {
        match self {
            ServerVariant::Minimal(s) => ServerVariant::Minimal(s.clone()),
            ServerVariant::Full(s) => ServerVariant::Full(s.clone()),
        }
    }
}

impl<M: ClusterServer + 'static, F: ClusterServer + 'static> ServerVariant<M, F> {
    pub fn is_full(&self) -> bool {
        matches!(self, ServerVariant::Full(_))
    }

    fn registration(&self) -> ClusterRegistration {
        match self {
            ServerVariant::Minimal(s) => ClusterRegistration::new(s),
            ServerVariant::Full(s) => ClusterRegistration::new(s),
        }
    }

    fn endpoint(&self) -> EndptId {
        match self {
            ServerVariant::Minimal(s) => s.endpoint(),
            ServerVariant::Full(s) => s.endpoint(),
        }
    }
}

type Slot<C> = Option<ServerVariant<<C as ManagedCluster>::Minimal, <C as ManagedCluster>::Full>>;

/// Owns the single live server instance of cluster type `C`.
///
/// State per slot: `Empty -> Constructed -> Registered -> Unregistered -> Empty`.
/// A registration failure rolls the construction back, so the slot never holds
/// a server the registry does not know about.
pub struct ServerLifecycle<C: ManagedCluster> {
    slot: Mutex<Slot<C>>,
    provider: Arc<dyn DataModelProvider>,
    registry: Arc<dyn ServerRegistry>,
    context: C::Context,
}

impl<C: ManagedCluster> ServerLifecycle<C> {
    pub fn new(
        provider: Arc<dyn DataModelProvider>,
        registry: Arc<dyn ServerRegistry>,
        context: C::Context,
    ) -> Self {
        Self {
            slot: Mutex::new(None),
            provider,
            registry,
            context,
        }
    }

    /// Endpoint init callback.
    ///
    /// # Panics
    /// If `endpoint` is not the root endpoint: the cluster is a node-wide
    /// singleton and attaching it elsewhere is a programming error.
    pub fn init_callback(&self, endpoint: EndptId) {
        assert_eq!(
            endpoint,
            ROOT_ENDPOINT,
            "{} cluster must live on the root endpoint",
            C::NAME
        );

        let mut slot = self.slot.lock();
        if let Some(previous) = slot.take() {
            warn!(
                "{} server already constructed on endpoint {}, replacing it",
                C::NAME,
                previous.endpoint()
            );
            self.unregister(&previous);
        }

        let snapshot = C::snapshot(self.provider.as_ref(), endpoint);
        let variant = if C::requires_full(&snapshot) {
            info!(
                "Creating fully configurable {} server on endpoint {} ({:?})",
                C::NAME,
                endpoint,
                snapshot
            );
            ServerVariant::Full(Arc::new(C::build_full(endpoint, snapshot, &self.context)))
        } else {
            info!(
                "Creating {} server on endpoint {} ({:?})",
                C::NAME,
                endpoint,
                snapshot
            );
            ServerVariant::Minimal(Arc::new(C::build_minimal(
                endpoint,
                snapshot,
                &self.context,
            )))
        };

        match self.registry.register(variant.registration()) {
            Ok(()) => *slot = Some(variant),
            Err(e) => {
                error!(
                    "Failed to register {} on endpoint {} - Error: {}",
                    C::NAME,
                    endpoint,
                    e
                );
                // Rolled back: `variant` is dropped here and the slot stays empty.
            }
        }
    }

    /// Endpoint shutdown callback. A no-op for any endpoint other than the
    /// root endpoint, and when nothing is constructed.
    pub fn shutdown_callback(&self, endpoint: EndptId) {
        if endpoint != ROOT_ENDPOINT {
            return;
        }

        let Some(variant) = self.slot.lock().take() else {
            return;
        };
        self.unregister(&variant);
        info!("{} server on endpoint {} shut down", C::NAME, endpoint);
    }

    /// The currently constructed variant, if any.
    pub fn active(&self) -> Option<ServerVariant<C::Minimal, C::Full>> {
        self.slot.lock().clone()
    }

    pub fn is_constructed(&self) -> bool {
        self.slot.lock().is_some()
    }

    pub fn is_full(&self) -> bool {
        self.slot.lock().as_ref().is_some_and(|v| v.is_full())
    }

    pub fn context(&self) -> &C::Context {
        &self.context
    }

    fn unregister(&self, variant: &ServerVariant<C::Minimal, C::Full>) {
        let endpoint = variant.endpoint();
        if let Err(e) = self.registry.unregister(endpoint, C::CLUSTER_ID) {
            error!(
                "Failed to unregister {} on endpoint {} - Error: {}",
                C::NAME,
                endpoint,
                e
            );
        }
    }
}
