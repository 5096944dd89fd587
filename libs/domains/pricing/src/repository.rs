use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::PricingResult;
use crate::models::{PaymentMethod, Service};

/// Read access to the pricing catalog
///
/// Inactive records are never returned: an inactive service or payment method
/// reads as `None`, and a returned service only carries its active methods.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PricingCatalog: Send + Sync {
    /// Get a service with its modifiers and active methods
    async fn get_service(&self, id: Uuid) -> PricingResult<Option<Service>>;

    /// Get the service owning an active method
    async fn get_service_for_method(&self, method_id: Uuid) -> PricingResult<Option<Service>>;

    /// Get an active payment method
    async fn get_payment_method(&self, id: Uuid) -> PricingResult<Option<PaymentMethod>>;
}

/// Serializable dump of a whole catalog
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    #[serde(default)]
    pub services: Vec<Service>,
    #[serde(default)]
    pub payment_methods: Vec<PaymentMethod>,
}

#[derive(Debug, Default)]
struct CatalogState {
    services: HashMap<Uuid, Service>,
    method_owners: HashMap<Uuid, Uuid>,
    payment_methods: HashMap<Uuid, PaymentMethod>,
}

/// In-memory implementation of PricingCatalog (for the CLI and tests)
#[derive(Debug, Default, Clone)]
pub struct InMemoryCatalog {
    state: Arc<RwLock<CatalogState>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn from_snapshot(snapshot: CatalogSnapshot) -> Self {
        let catalog = Self::new();
        for service in snapshot.services {
            catalog.insert_service(service).await;
        }
        for payment in snapshot.payment_methods {
            catalog.insert_payment_method(payment).await;
        }
        catalog
    }

    /// Insert or replace a service, re-indexing its methods
    pub async fn insert_service(&self, service: Service) {
        let mut state = self.state.write().await;

        if let Some(previous) = state.services.get(&service.id) {
            let stale: Vec<Uuid> = previous.methods.iter().map(|m| m.id).collect();
            for method_id in stale {
                state.method_owners.remove(&method_id);
            }
        }
        for method in &service.methods {
            state.method_owners.insert(method.id, service.id);
        }

        tracing::debug!(
            service_id = %service.id,
            methods = service.methods.len(),
            "Loaded service into catalog"
        );
        state.services.insert(service.id, service);
    }

    pub async fn insert_payment_method(&self, payment: PaymentMethod) {
        let mut state = self.state.write().await;
        state.payment_methods.insert(payment.id, payment);
    }

    pub async fn service_count(&self) -> usize {
        self.state.read().await.services.len()
    }
}

fn active_view(service: &Service) -> Option<Service> {
    service.active.then(|| Service {
        methods: service.methods.iter().filter(|m| m.active).cloned().collect(),
        ..service.clone()
    })
}

#[async_trait]
impl PricingCatalog for InMemoryCatalog {
    async fn get_service(&self, id: Uuid) -> PricingResult<Option<Service>> {
        let state = self.state.read().await;
        Ok(state.services.get(&id).and_then(active_view))
    }

    async fn get_service_for_method(&self, method_id: Uuid) -> PricingResult<Option<Service>> {
        let state = self.state.read().await;
        let service = state
            .method_owners
            .get(&method_id)
            .and_then(|owner| state.services.get(owner))
            .and_then(active_view)
            .filter(|s| s.methods.iter().any(|m| m.id == method_id));
        Ok(service)
    }

    async fn get_payment_method(&self, id: Uuid) -> PricingResult<Option<PaymentMethod>> {
        let state = self.state.read().await;
        Ok(state.payment_methods.get(&id).filter(|p| p.active).cloned())
    }
}
