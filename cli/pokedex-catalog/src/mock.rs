//! In-memory catalog client for tests.
//!
//! Available with the `tests` feature so that downstream crates can drive the
//! pager, cache and aggregator without a network.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::client::ClientTrait;
use crate::error::CatalogClientError;
use crate::types::{EntityDetail, EntityId, ListEntry, SpeciesInfo};

// Arc allows you to push things into the client from outside the client if necessary
// Mutex allows you to share across threads (necessary because of tokio)
type MockField<T> = Arc<Mutex<T>>;

/// A request observed by a [MockClient].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Page { limit: u32, offset: u32 },
    Detail(EntityId),
    Species(EntityId),
}

/// Scripted outcome of one mocked request.
#[derive(Debug, Clone)]
enum Scripted<T> {
    Ok(T),
    /// Fails with a [CatalogClientError::Decode] mentioning this message.
    Fail(String),
}

#[derive(Debug, Default)]
struct MockResponses {
    pages: VecDeque<Scripted<Vec<ListEntry>>>,
    details: HashMap<EntityId, Scripted<EntityDetail>>,
    species: HashMap<EntityId, Scripted<SpeciesInfo>>,
}

/// A catalog client that can be seeded with mock responses.
///
/// Page responses are consumed in order. Detail and species responses are
/// keyed by entity id and may be served any number of times. Every request
/// is recorded, see [MockClient::calls].
#[derive(Debug, Default, Clone)]
pub struct MockClient {
    responses: MockField<MockResponses>,
    calls: MockField<Vec<MockCall>>,
    latency: Option<Duration>,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every response, so that concurrent callers overlap.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Push a new page into the list of page responses
    pub fn push_page_response(&self, entries: Vec<ListEntry>) {
        self.lock_responses().pages.push_back(Scripted::Ok(entries));
    }

    /// Push a failing page into the list of page responses
    pub fn push_page_error(&self, message: impl Into<String>) {
        self.lock_responses()
            .pages
            .push_back(Scripted::Fail(message.into()));
    }

    pub fn insert_detail(&self, detail: EntityDetail) {
        self.lock_responses()
            .details
            .insert(detail.id, Scripted::Ok(detail));
    }

    pub fn fail_detail(&self, id: EntityId, message: impl Into<String>) {
        self.lock_responses()
            .details
            .insert(id, Scripted::Fail(message.into()));
    }

    pub fn insert_species(&self, id: EntityId, species: SpeciesInfo) {
        self.lock_responses()
            .species
            .insert(id, Scripted::Ok(species));
    }

    pub fn fail_species(&self, id: EntityId, message: impl Into<String>) {
        self.lock_responses()
            .species
            .insert(id, Scripted::Fail(message.into()));
    }

    /// All requests received so far, in arrival order.
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().expect("couldn't acquire mock lock").clone()
    }

    pub fn page_calls(&self) -> usize {
        self.count_calls(|call| matches!(call, MockCall::Page { .. }))
    }

    pub fn detail_calls(&self, id: EntityId) -> usize {
        self.count_calls(|call| call == &MockCall::Detail(id))
    }

    pub fn species_calls(&self, id: EntityId) -> usize {
        self.count_calls(|call| call == &MockCall::Species(id))
    }

    fn count_calls(&self, predicate: impl Fn(&MockCall) -> bool) -> usize {
        self.calls
            .lock()
            .expect("couldn't acquire mock lock")
            .iter()
            .filter(|call| predicate(call))
            .count()
    }

    fn lock_responses(&self) -> std::sync::MutexGuard<'_, MockResponses> {
        self.responses.lock().expect("couldn't acquire mock lock")
    }

    /// Record the call and wait for the configured latency.
    async fn receive(&self, call: MockCall) {
        self.calls
            .lock()
            .expect("couldn't acquire mock lock")
            .push(call);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

fn mock_failure(endpoint: &str, message: String) -> CatalogClientError {
    CatalogClientError::Decode {
        url: url::Url::parse(&format!("mock://catalog/{endpoint}"))
            .expect("mock URL is valid"),
        source: serde_json::Error::io(std::io::Error::other(message)),
    }
}

fn resolve<T>(endpoint: &str, scripted: Option<Scripted<T>>) -> Result<T, CatalogClientError> {
    match scripted {
        Some(Scripted::Ok(value)) => Ok(value),
        Some(Scripted::Fail(message)) => Err(mock_failure(endpoint, message)),
        None => panic!("no mock response for {endpoint}"),
    }
}

impl ClientTrait for MockClient {
    async fn fetch_page(
        &self,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<ListEntry>, CatalogClientError> {
        self.receive(MockCall::Page { limit, offset }).await;
        let scripted = self.lock_responses().pages.pop_front();
        resolve("pokemon", scripted)
    }

    async fn fetch_detail(&self, id: EntityId) -> Result<EntityDetail, CatalogClientError> {
        self.receive(MockCall::Detail(id)).await;
        let scripted = self.lock_responses().details.get(&id).cloned();
        resolve(&format!("pokemon/{id}"), scripted)
    }

    async fn fetch_species(&self, id: EntityId) -> Result<SpeciesInfo, CatalogClientError> {
        self.receive(MockCall::Species(id)).await;
        let scripted = self.lock_responses().species.get(&id).cloned();
        resolve(&format!("pokemon-species/{id}"), scripted)
    }
}
