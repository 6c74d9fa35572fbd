//! Request storage.
//!
//! [`RequestStore`] is the only shared mutable state of the service. The
//! in-memory implementation keeps everything in a `HashMap` behind a
//! `RwLock`; a durable backend only has to implement the same four methods.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use infragen_core::{LifecycleError, ProvisionRequest, RequestId, Transition};
use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("request {0} not found")]
    NotFound(RequestId),

    #[error("request {0} already exists")]
    Duplicate(RequestId),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("request store lock poisoned")]
    Poisoned,
}

/// Which requests to list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestFilter {
    pub requester: Option<String>,
    pub limit: Option<usize>,
}

impl RequestFilter {
    pub fn requester(mut self, requester: impl Into<String>) -> Self {
        self.requester = Some(requester.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn matches(&self, request: &ProvisionRequest) -> bool {
        self.requester
            .as_deref()
            .is_none_or(|requester| request.metadata.requester == requester)
    }
}

/// A finite, newest-first snapshot of matching requests. Consumed once.
#[derive(Debug)]
pub struct RequestCursor {
    inner: std::vec::IntoIter<ProvisionRequest>,
}

impl RequestCursor {
    pub fn new(requests: Vec<ProvisionRequest>) -> Self {
        Self {
            inner: requests.into_iter(),
        }
    }
}

impl Iterator for RequestCursor {
    type Item = ProvisionRequest;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for RequestCursor {}

#[async_trait]
pub trait RequestStore: Send + Sync {
    async fn insert(&self, request: ProvisionRequest) -> Result<(), StoreError>;

    /// Apply a transition to a stored request and return the new state.
    async fn update(
        &self,
        id: &RequestId,
        transition: Transition,
        at: DateTime<Utc>,
    ) -> Result<ProvisionRequest, StoreError>;

    async fn get(&self, id: &RequestId) -> Result<Option<ProvisionRequest>, StoreError>;

    async fn list(&self, filter: &RequestFilter) -> Result<RequestCursor, StoreError>;
}

#[derive(Debug, Default)]
struct Entries {
    requests: HashMap<RequestId, (u64, ProvisionRequest)>,
    next_sequence: u64,
}

/// Process-local request store.
#[derive(Debug, Default)]
pub struct InMemoryRequestStore {
    entries: RwLock<Entries>,
}

impl InMemoryRequestStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RequestStore for InMemoryRequestStore {
    async fn insert(&self, request: ProvisionRequest) -> Result<(), StoreError> {
        let mut entries = self.entries.write().map_err(|_| StoreError::Poisoned)?;
        if entries.requests.contains_key(&request.request_id) {
            return Err(StoreError::Duplicate(request.request_id));
        }
        let sequence = entries.next_sequence;
        entries.next_sequence += 1;
        entries
            .requests
            .insert(request.request_id.clone(), (sequence, request));
        Ok(())
    }

    async fn update(
        &self,
        id: &RequestId,
        transition: Transition,
        at: DateTime<Utc>,
    ) -> Result<ProvisionRequest, StoreError> {
        let mut entries = self.entries.write().map_err(|_| StoreError::Poisoned)?;
        let (_, request) = entries
            .requests
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        request.apply(transition, at)?;
        Ok(request.clone())
    }

    async fn get(&self, id: &RequestId) -> Result<Option<ProvisionRequest>, StoreError> {
        let entries = self.entries.read().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.requests.get(id).map(|(_, request)| request.clone()))
    }

    async fn list(&self, filter: &RequestFilter) -> Result<RequestCursor, StoreError> {
        let entries = self.entries.read().map_err(|_| StoreError::Poisoned)?;
        let mut matching: Vec<&(u64, ProvisionRequest)> = entries
            .requests
            .values()
            .filter(|(_, request)| filter.matches(request))
            .collect();
        // Newest first; insertion order breaks ties between equal timestamps.
        matching.sort_by(|(a_seq, a), (b_seq, b)| {
            b.created_at.cmp(&a.created_at).then(b_seq.cmp(a_seq))
        });

        let limit = filter.limit.unwrap_or(usize::MAX);
        Ok(RequestCursor::new(
            matching
                .into_iter()
                .take(limit)
                .map(|(_, request)| request.clone())
                .collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use infragen_core::{RequestMetadata, RequestStatus};

    fn request(requester: &str) -> ProvisionRequest {
        ProvisionRequest::new(
            RequestId::generate(),
            "a bucket",
            RequestMetadata::new(requester),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_insert_get_update() {
        let store = InMemoryRequestStore::new();
        let req = request("alice");
        let id = req.request_id.clone();
        store.insert(req.clone()).await.unwrap();

        assert_eq!(
            store.insert(req).await,
            Err(StoreError::Duplicate(id.clone()))
        );

        let updated = store
            .update(&id, Transition::BeginParsing, Utc::now())
            .await
            .unwrap();
        assert_eq!(updated.status, RequestStatus::Parsing);
        assert_eq!(
            store.get(&id).await.unwrap().unwrap().status,
            RequestStatus::Parsing
        );
    }

    #[tokio::test]
    async fn test_update_refuses_illegal_transition() {
        let store = InMemoryRequestStore::new();
        let req = request("alice");
        let id = req.request_id.clone();
        store.insert(req).await.unwrap();

        let err = store
            .update(&id, Transition::BeginCreatingPr, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Lifecycle(_)));
        assert_eq!(
            store.get(&id).await.unwrap().unwrap().status,
            RequestStatus::Queued
        );
    }

    #[tokio::test]
    async fn test_update_unknown_request() {
        let store = InMemoryRequestStore::new();
        let id = RequestId::from("req-000000000000");
        assert_eq!(
            store
                .update(&id, Transition::BeginParsing, Utc::now())
                .await
                .unwrap_err(),
            StoreError::NotFound(id)
        );
    }

    #[tokio::test]
    async fn test_list_newest_first_with_filter_and_limit() {
        let store = InMemoryRequestStore::new();
        let mut ids = Vec::new();
        for requester in ["alice", "bob", "alice", "alice"] {
            let req = request(requester);
            ids.push(req.request_id.clone());
            store.insert(req).await.unwrap();
        }

        let listed: Vec<RequestId> = store
            .list(&RequestFilter::default().requester("alice").limit(2))
            .await
            .unwrap()
            .map(|r| r.request_id)
            .collect();
        assert_eq!(listed, vec![ids[3].clone(), ids[2].clone()]);

        let cursor = store.list(&RequestFilter::default()).await.unwrap();
        assert_eq!(cursor.len(), 4);
    }
}
