//! Ordered record of backend calls within a single inbound request.
//!
//! Append-only; indices reflect backend execution order and are never
//! reordered or truncated.

use super::response::{BackendRequest, BackendResponse};
use crate::config::Backend;
use crate::error::GatewayError;
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct HistoryEntry {
    backend: Arc<Backend>,
    request: BackendRequest,
    response: BackendResponse,
}

impl HistoryEntry {
    pub fn backend(&self) -> &Arc<Backend> {
        &self.backend
    }

    pub fn request(&self) -> &BackendRequest {
        &self.request
    }

    pub fn response(&self) -> &BackendResponse {
        &self.response
    }

    /// An omitted entry still executes for side effects but is excluded
    /// from status/body composition.
    pub fn omit(&self) -> bool {
        self.backend
            .response
            .as_ref()
            .is_some_and(|response| response.omit)
    }
}

#[derive(Debug, Clone, Default)]
pub struct History {
    entries: Vec<HistoryEntry>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(
        &mut self,
        backend: Arc<Backend>,
        request: BackendRequest,
        response: BackendResponse,
    ) {
        self.entries.push(HistoryEntry {
            backend,
            request,
            response,
        });
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&HistoryEntry> {
        self.entries.get(index)
    }

    pub fn last(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn non_omit(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter().filter(|entry| !entry.omit())
    }

    pub fn non_omit_count(&self) -> usize {
        self.non_omit().count()
    }

    pub fn single_response(&self) -> bool {
        self.non_omit_count() == 1
    }

    pub fn multiple_responses(&self) -> bool {
        self.non_omit_count() > 1
    }

    /// Every recorded status is < 400.
    pub fn all_ok(&self) -> bool {
        self.entries.iter().all(|entry| entry.response.ok())
    }

    /// Serialized form queried by the resolver: an object wrapping the
    /// `responses` array, so paths like `responses[0].body` resolve.
    pub fn to_json(&self) -> Result<Value, GatewayError> {
        let mut responses = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            responses.push(entry.response.to_json()?);
        }
        Ok(serde_json::json!({ "responses": responses }))
    }
}
