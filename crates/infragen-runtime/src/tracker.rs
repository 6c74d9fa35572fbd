//! Single-writer handle for one request.

use crate::store::{RequestStore, StoreError};
use chrono::Utc;
use infragen_core::{ProvisionRequest, RequestId, Transition};
use std::sync::Arc;

/// Owns the right to move one request through its lifecycle.
///
/// Created at intake and moved into the worker task. It is deliberately not
/// `Clone`, so a request only ever has one writer; everyone else reads
/// through the store.
pub struct RequestTracker {
    store: Arc<dyn RequestStore>,
    request: ProvisionRequest,
}

impl RequestTracker {
    /// Insert a new request and take ownership of its updates.
    pub async fn create(
        store: Arc<dyn RequestStore>,
        request: ProvisionRequest,
    ) -> Result<Self, StoreError> {
        store.insert(request.clone()).await?;
        Ok(Self { store, request })
    }

    pub fn id(&self) -> &RequestId {
        &self.request.request_id
    }

    /// Latest state written by this tracker.
    pub fn request(&self) -> &ProvisionRequest {
        &self.request
    }

    pub async fn apply(&mut self, transition: Transition) -> Result<&ProvisionRequest, StoreError> {
        let name = transition.name();
        self.request = self
            .store
            .update(&self.request.request_id, transition, Utc::now())
            .await?;
        tracing::debug!(
            request_id = %self.request.request_id,
            transition = name,
            status = %self.request.status,
            "request updated"
        );
        Ok(&self.request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryRequestStore;
    use infragen_core::{RequestMetadata, RequestStatus};

    #[tokio::test]
    async fn test_tracker_writes_through_store() {
        let store: Arc<dyn RequestStore> = Arc::new(InMemoryRequestStore::new());
        let request = ProvisionRequest::new(
            RequestId::generate(),
            "a bucket",
            RequestMetadata::new("alice"),
            Utc::now(),
        );
        let mut tracker = RequestTracker::create(store.clone(), request).await.unwrap();
        tracker.apply(Transition::BeginParsing).await.unwrap();
        tracker
            .apply(Transition::Fail("parser unavailable".into()))
            .await
            .unwrap();

        let stored = store.get(tracker.id()).await.unwrap().unwrap();
        assert_eq!(stored.status, RequestStatus::Failed);
        assert_eq!(stored.error.as_deref(), Some("parser unavailable"));
        assert_eq!(&stored, tracker.request());
    }
}
