//! CRUD page controllers
//!
//! Every admin screen is the same loop: fetch a page, render it, filter it
//! locally, mutate a record, re-fetch the page. `ListController` owns that
//! loop; the resource modules add their endpoints and forms on top.
//!
//! A controller keeps a form-local error string and loading flag so a view
//! stays on its last good page when a call fails. Global notification of
//! request failures already happened in the client core.

pub mod auth;
pub mod categories;
pub mod customers;
mod lenient;
pub mod orders;
pub mod pagination;
pub mod products;
pub mod settings;
pub mod transactions;

pub use pagination::Pager;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::http::{normalize_page, ApiClient, ApiError, Envelope};
use crate::AdminError;

/// Form error shown when a request never got an answer
pub const NETWORK_ERROR: &str = "Network error. Please try again.";

/// Records that can be matched by the local search box
pub trait Searchable {
    /// Fields the search box looks at
    fn search_fields(&self) -> Vec<&str>;

    /// Case-insensitive substring match on any field; a blank query
    /// matches everything
    fn matches(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        query.is_empty()
            || self
                .search_fields()
                .iter()
                .any(|field| field.to_lowercase().contains(&query))
    }
}

/// Parameters of a list request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListParams {
    pub page: u32,
    pub limit: u32,
}

impl ListParams {
    pub fn new(page: u32, limit: u32) -> Self {
        Self { page, limit }
    }
}

impl Default for ListParams {
    fn default() -> Self {
        Self { page: 1, limit: 20 }
    }
}

/// Whether a finished load was written to the view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Applied,
    /// A newer load was issued (or the view detached) while this one ran
    Discarded,
}

/// Point-in-time view of a list screen
#[derive(Debug, Clone, Serialize)]
pub struct ListView<T> {
    pub items: Vec<T>,
    pub pager: Pager,
    pub loading: bool,
    pub error: Option<String>,
}

impl<T: Searchable + Clone> ListView<T> {
    /// Items on the current page that match the search box
    pub fn visible(&self, query: &str) -> Vec<T> {
        self.items
            .iter()
            .filter(|item| item.matches(query))
            .cloned()
            .collect()
    }
}

struct ListState<T> {
    items: Vec<T>,
    pager: Pager,
    params: ListParams,
    loading: bool,
    error: Option<String>,
    seq: u64,
}

/// Paginated list screen over one fetch endpoint
pub struct ListController<T> {
    client: Arc<ApiClient>,
    path: &'static str,
    noun: &'static str,
    extra_query: Mutex<Vec<(&'static str, String)>>,
    state: Mutex<ListState<T>>,
}

impl<T: DeserializeOwned + Clone> ListController<T> {
    /// `noun` names the resource in form errors ("Failed to fetch <noun>")
    pub fn new(client: Arc<ApiClient>, path: &'static str, noun: &'static str, limit: u32) -> Self {
        Self {
            client,
            path,
            noun,
            extra_query: Mutex::new(Vec::new()),
            state: Mutex::new(ListState {
                items: Vec::new(),
                pager: Pager::default(),
                params: ListParams::new(1, limit),
                loading: false,
                error: None,
                seq: 0,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, ListState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn client(&self) -> &Arc<ApiClient> {
        &self.client
    }

    /// Fixed query parameters sent with every list request
    pub fn set_extra_query(&self, query: Vec<(&'static str, String)>) {
        *self.extra_query.lock().unwrap_or_else(PoisonError::into_inner) = query;
    }

    pub fn params(&self) -> ListParams {
        self.state().params
    }

    pub fn view(&self) -> ListView<T> {
        let state = self.state();
        ListView {
            items: state.items.clone(),
            pager: state.pager,
            loading: state.loading,
            error: state.error.clone(),
        }
    }

    /// The view was shown: load the first page
    pub async fn on_attach(&self) -> LoadOutcome {
        tracing::debug!(path = self.path, "list attached");
        self.load(1).await
    }

    /// Page or page size changed
    pub async fn on_params_changed(&self, params: ListParams) -> LoadOutcome {
        {
            let mut state = self.state();
            state.params.limit = params.limit.max(1);
        }
        self.load(params.page).await
    }

    /// The view went away: responses still in flight are dropped
    pub fn on_detach(&self) {
        let mut state = self.state();
        state.seq += 1;
        state.loading = false;
        tracing::debug!(path = self.path, "list detached");
    }

    /// Re-fetch the page currently shown
    pub async fn reload(&self) -> LoadOutcome {
        let page = self.state().params.page;
        self.load(page).await
    }

    /// Fetch one page. Only the most recently issued load writes the view.
    pub async fn load(&self, page: u32) -> LoadOutcome {
        let page = page.max(1);
        let (seq, limit) = {
            let mut state = self.state();
            state.seq += 1;
            state.params.page = page;
            state.loading = true;
            state.error = None;
            (state.seq, state.params.limit)
        };

        let mut query = vec![("page", page.to_string()), ("limit", limit.to_string())];
        query.extend(
            self.extra_query
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .iter()
                .cloned(),
        );

        let result = self.client.get::<Value>(self.path, &query).await;

        let mut state = self.state();
        if state.seq != seq {
            tracing::debug!(
                path = self.path,
                page,
                seq,
                latest = state.seq,
                "discarding stale page"
            );
            return LoadOutcome::Discarded;
        }
        state.loading = false;

        match result {
            Ok(envelope) if envelope.success => match normalize_page::<T>(envelope.data, page) {
                Ok(loaded) => {
                    tracing::debug!(
                        path = self.path,
                        page = loaded.current_page,
                        pages = loaded.pages,
                        count = loaded.results.len(),
                        "page loaded"
                    );
                    state.pager = Pager::new(loaded.current_page, loaded.pages);
                    state.items = loaded.results;
                }
                Err(e) => {
                    tracing::warn!(path = self.path, error = %e, "unexpected list payload");
                    state.error = Some(format!("Failed to fetch {}", self.noun));
                }
            },
            Ok(envelope) => {
                state.error = Some(envelope.message_or(&format!("Failed to fetch {}", self.noun)));
            }
            Err(_) => {
                state.error = Some(NETWORK_ERROR.to_string());
            }
        }

        LoadOutcome::Applied
    }

    /// Mark a mutation as started
    pub fn begin(&self) {
        let mut state = self.state();
        state.loading = true;
        state.error = None;
    }

    /// Record a form-local error
    pub fn fail(&self, message: impl Into<String>) {
        let mut state = self.state();
        state.loading = false;
        state.error = Some(message.into());
    }

    /// Finish a mutation.
    ///
    /// On success the current page is re-fetched and the returned `data`
    /// handed back. A `success: false` envelope or a failed request leaves
    /// a form error and the list untouched.
    pub async fn settle<D>(
        &self,
        result: Result<Envelope<D>, ApiError>,
        fallback: &str,
    ) -> crate::Result<Option<D>> {
        match result {
            Ok(envelope) if envelope.success => {
                self.reload().await;
                Ok(envelope.data)
            }
            Ok(envelope) => {
                let message = envelope.message_or(fallback);
                self.fail(message.clone());
                Err(AdminError::Rejected(message))
            }
            Err(err) => {
                self.fail(err.server_message().unwrap_or(NETWORK_ERROR));
                Err(err.into())
            }
        }
    }
}

/// Unwrap the record from a single-record fetch
pub(crate) fn expect_record<T: DeserializeOwned>(
    envelope: Envelope<Value>,
    fallback: &str,
) -> crate::Result<T> {
    if !envelope.success {
        return Err(AdminError::Rejected(envelope.message_or(fallback)));
    }
    let message = envelope.message_or(fallback);
    envelope
        .decode::<T>()?
        .data
        .ok_or(AdminError::Rejected(message))
}
