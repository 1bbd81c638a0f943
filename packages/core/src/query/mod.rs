//! Cached, coalescing REST queries.
//!
//! A [`ChainQuery`] owns one REST resource on one chain. Reads are
//! synchronous snapshots of the last committed state; fetches run on a
//! spawned task (inline when no Tokio runtime is present) and every caller
//! waiting on them is released when the request they joined (or a newer
//! one) commits.
//!
//! State per instance moves `Uninitialized -> Fetching -> {Ready, Error}`
//! and back to `Fetching` on every refresh. A failed refresh keeps the
//! previous response visible.

pub mod distribution;
pub mod map;
pub mod supply;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::runtime::Handle;
use tokio::sync::{watch, Mutex as AsyncMutex};

use crate::chain::ChainGetter;
use crate::error::QueryError;
use crate::metrics::QueryMetrics;
use crate::services::rest::{join_url, RestTransport};
use crate::store::KvStore;

pub use map::QueryMap;

/// Collaborators shared by every query built for a process.
#[derive(Clone)]
pub struct QueryContext {
    pub kv_store: Arc<dyn KvStore + Send + Sync>,
    pub chain_getter: Arc<dyn ChainGetter + Send + Sync>,
    pub transport: Arc<dyn RestTransport + Send + Sync>,
    pub metrics: Option<Arc<QueryMetrics>>,
}

impl QueryContext {
    pub fn new(
        kv_store: Arc<dyn KvStore + Send + Sync>,
        chain_getter: Arc<dyn ChainGetter + Send + Sync>,
        transport: Arc<dyn RestTransport + Send + Sync>,
    ) -> Self {
        Self {
            kv_store,
            chain_getter,
            transport,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<QueryMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

/// A decoded response as seen by readers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse<T> {
    pub data: T,
    pub status: u16,
    /// `true` when loaded from the persistent store or explicitly
    /// invalidated; the data is shown but a fresh fetch is due.
    pub staled: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    Uninitialized,
    Fetching,
    Ready,
    Error,
}

/// Consistent view of a query's response, error and fetch flag.
#[derive(Debug)]
pub struct QuerySnapshot<T> {
    pub response: Option<Arc<QueryResponse<T>>>,
    pub error: Option<QueryError>,
    pub is_fetching: bool,
}

impl<T> QuerySnapshot<T> {
    pub fn status(&self) -> QueryStatus {
        if self.is_fetching {
            QueryStatus::Fetching
        } else if self.error.is_some() {
            QueryStatus::Error
        } else if self.response.is_some() {
            QueryStatus::Ready
        } else {
            QueryStatus::Uninitialized
        }
    }
}

impl<T> Clone for QuerySnapshot<T> {
    fn clone(&self) -> Self {
        Self {
            response: self.response.clone(),
            error: self.error.clone(),
            is_fetching: self.is_fetching,
        }
    }
}

/// Persisted form. The body is kept as raw JSON and decoded on load.
#[derive(Debug, Deserialize)]
struct StoredResponse {
    data: Value,
    status: u16,
    timestamp: DateTime<Utc>,
}

impl StoredResponse {
    fn into_value(self) -> Value {
        let mut entry = Map::new();
        entry.insert("data".to_string(), self.data);
        entry.insert("status".to_string(), Value::from(self.status));
        entry.insert(
            "timestamp".to_string(),
            Value::String(self.timestamp.to_rfc3339()),
        );
        Value::Object(entry)
    }
}

struct State<T> {
    response: Option<Arc<QueryResponse<T>>>,
    error: Option<QueryError>,
    /// Sequence number of the most recently issued request.
    latest_seq: u64,
    in_flight: bool,
    hydrated: bool,
}

struct Inner<T> {
    ctx: QueryContext,
    chain_id: String,
    base_url: String,
    path: String,
    url: String,
    can_fetch: bool,
    state: Mutex<State<T>>,
    /// Held from a request's state commit through its store write, so the
    /// store sees committed results in commit order.
    commit_lock: AsyncMutex<()>,
    /// Highest sequence number whose result has been committed.
    completed: watch::Sender<u64>,
}

/// One REST resource on one chain.
///
/// Cloning is cheap and yields a handle to the same instance.
pub struct ChainQuery<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for ChainQuery<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> ChainQuery<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    /// Bind a query to `path` on `chain_id`. The chain's REST endpoint is
    /// resolved here, once; unknown chains fail construction.
    pub fn new(
        ctx: &QueryContext,
        chain_id: &str,
        path: impl Into<String>,
    ) -> Result<Self, QueryError> {
        Self::with_can_fetch(ctx, chain_id, path, true)
    }

    /// Like [`ChainQuery::new`], but a query built with `can_fetch = false`
    /// never issues a request and stays empty.
    pub fn with_can_fetch(
        ctx: &QueryContext,
        chain_id: &str,
        path: impl Into<String>,
        can_fetch: bool,
    ) -> Result<Self, QueryError> {
        let chain_info = ctx.chain_getter.get_chain(chain_id)?;
        let path = path.into();
        let url = join_url(&chain_info.rest, &path);
        let (completed, _) = watch::channel(0);

        Ok(Self {
            inner: Arc::new(Inner {
                ctx: ctx.clone(),
                chain_id: chain_id.to_string(),
                base_url: chain_info.rest,
                path,
                url,
                can_fetch,
                state: Mutex::new(State {
                    response: None,
                    error: None,
                    latest_seq: 0,
                    in_flight: false,
                    hydrated: false,
                }),
                commit_lock: AsyncMutex::new(()),
                completed,
            }),
        })
    }

    pub fn chain_id(&self) -> &str {
        &self.inner.chain_id
    }

    pub fn path(&self) -> &str {
        &self.inner.path
    }

    /// Full request URL, also the persistent store key.
    pub fn url(&self) -> &str {
        &self.inner.url
    }

    pub fn can_fetch(&self) -> bool {
        self.inner.can_fetch
    }

    pub fn response(&self) -> Option<Arc<QueryResponse<T>>> {
        self.inner.lock_state().response.clone()
    }

    pub fn error(&self) -> Option<QueryError> {
        self.inner.lock_state().error.clone()
    }

    pub fn is_fetching(&self) -> bool {
        self.inner.lock_state().in_flight
    }

    pub fn status(&self) -> QueryStatus {
        self.snapshot().status()
    }

    pub fn snapshot(&self) -> QuerySnapshot<T> {
        let state = self.inner.lock_state();
        QuerySnapshot {
            response: state.response.clone(),
            error: state.error.clone(),
            is_fetching: state.in_flight,
        }
    }

    /// Fetch the resource, joining the outstanding request if there is one.
    ///
    /// Returns once that request (or a newer one) has committed. Errors are
    /// recorded on the query, never returned.
    pub async fn fetch(&self) {
        if !self.inner.can_fetch {
            return;
        }

        let (target, started) = {
            let mut state = self.inner.lock_state();
            if state.in_flight {
                self.inner.record(|m| m.coalesced_total.inc());
                tracing::debug!("Joining in-flight request for {}", self.inner.url);
                (state.latest_seq, false)
            } else {
                (Inner::begin(&mut state), true)
            }
        };

        if started {
            Inner::launch(&self.inner, target).await;
        }
        self.inner.wait_for(target).await;
    }

    /// Issue a new request even if one is outstanding. The older request's
    /// result will be discarded when it arrives.
    pub async fn refresh(&self) {
        if !self.inner.can_fetch {
            return;
        }

        let target = Inner::begin(&mut self.inner.lock_state());

        Inner::launch(&self.inner, target).await;
        self.inner.wait_for(target).await;
    }

    /// Return the cached response if it is not stale, otherwise fetch.
    pub async fn wait_response(&self) -> Option<Arc<QueryResponse<T>>> {
        if let Some(response) = self.response() {
            if !response.staled {
                return Some(response);
            }
        }

        self.wait_fresh_response().await
    }

    /// Wait for the next completed fetch cycle and return its response.
    ///
    /// Joins an outstanding request or starts one. After a failed fetch the
    /// previous response (if any) is returned and [`ChainQuery::error`] is set.
    pub async fn wait_fresh_response(&self) -> Option<Arc<QueryResponse<T>>> {
        self.fetch().await;
        self.response()
    }

    /// Current response. Starts a background fetch if this query has never
    /// fetched and a Tokio runtime is available.
    pub fn observe(&self) -> Option<Arc<QueryResponse<T>>> {
        let mut state = self.inner.lock_state();
        if self.inner.can_fetch && state.latest_seq == 0 {
            if let Ok(handle) = Handle::try_current() {
                let seq = Inner::begin(&mut state);
                handle.spawn(Arc::clone(&self.inner).run(seq));
            }
        }
        state.response.clone()
    }
}

impl<T> ChainQuery<T>
where
    T: Clone + DeserializeOwned + Send + Sync + 'static,
{
    /// Mark the current response stale. It stays readable, but the next
    /// [`ChainQuery::wait_response`] goes to the network.
    pub fn invalidate(&self) {
        let mut state = self.inner.lock_state();
        if let Some(response) = state.response.as_ref() {
            if !response.staled {
                let mut staled = (**response).clone();
                staled.staled = true;
                state.response = Some(Arc::new(staled));
            }
        }
    }
}

impl<T> Inner<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    fn lock_state(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, f: impl FnOnce(&QueryMetrics)) {
        if let Some(metrics) = self.ctx.metrics.as_deref() {
            f(metrics);
        }
    }

    fn begin(state: &mut State<T>) -> u64 {
        state.latest_seq += 1;
        state.in_flight = true;
        state.latest_seq
    }

    /// Start request `seq` on the current Tokio runtime. Without one, the
    /// request runs to completion inside the caller's future.
    async fn launch(inner: &Arc<Self>, seq: u64) {
        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(Arc::clone(inner).run(seq));
            }
            Err(_) => {
                tracing::debug!("No Tokio runtime, running request for {} inline", inner.url);
                Arc::clone(inner).run(seq).await;
            }
        }
    }

    async fn wait_for(&self, target: u64) {
        let mut completed = self.completed.subscribe();
        // The sender lives in `self`, so this only errors on a closed channel
        // that cannot exist while we hold a reference.
        let _ = completed.wait_for(|seq| *seq >= target).await;
    }

    async fn run(self: Arc<Self>, seq: u64) {
        let mut guard = RunGuard {
            inner: &self,
            seq,
            finished: false,
        };

        self.load_staled_response().await;

        self.record(|m| m.fetches_total.inc());
        let started = Instant::now();
        let outcome = self.request().await;
        self.record(|m| m.fetch_duration.observe(started.elapsed().as_secs_f64()));

        self.commit(seq, outcome).await;
        guard.finished = true;
    }

    async fn request(&self) -> Result<(QueryResponse<T>, StoredResponse), QueryError> {
        let raw = self
            .ctx
            .transport
            .get_json(&self.base_url, &self.path)
            .await?;

        let data = serde_json::from_value::<T>(raw.data.clone())
            .map_err(|err| QueryError::decode(format!("{}: {}", self.url, err)))?;

        let timestamp = Utc::now();
        Ok((
            QueryResponse {
                data,
                status: raw.status,
                staled: false,
                timestamp,
            },
            StoredResponse {
                data: raw.data,
                status: raw.status,
                timestamp,
            },
        ))
    }

    /// Expose the persisted response, marked stale, until the first request
    /// of this instance commits. Runs at most once per instance.
    async fn load_staled_response(&self) {
        {
            let mut state = self.lock_state();
            if state.hydrated || state.response.is_some() {
                return;
            }
            state.hydrated = true;
        }

        let stored = match self.ctx.kv_store.get(&self.url).await {
            Ok(Some(value)) => value,
            Ok(None) => return,
            Err(err) => {
                self.record(|m| m.store_errors_total.inc());
                tracing::warn!("Failed to read cached response for {}: {}", self.url, err);
                return;
            }
        };

        let decoded = serde_json::from_value::<StoredResponse>(stored).and_then(|stored| {
            serde_json::from_value::<T>(stored.data).map(|data| QueryResponse {
                data,
                status: stored.status,
                staled: true,
                timestamp: stored.timestamp,
            })
        });

        match decoded {
            Ok(response) => {
                let mut state = self.lock_state();
                if state.response.is_none() {
                    tracing::debug!("Loaded cached response for {}", self.url);
                    state.response = Some(Arc::new(response));
                }
            }
            Err(err) => {
                self.record(|m| m.store_errors_total.inc());
                tracing::warn!("Ignoring undecodable cached response for {}: {}", self.url, err);
            }
        }
    }

    async fn commit(
        &self,
        seq: u64,
        outcome: Result<(QueryResponse<T>, StoredResponse), QueryError>,
    ) {
        let _guard = self.commit_lock.lock().await;

        match outcome {
            Ok((response, stored)) => {
                {
                    let mut state = self.lock_state();
                    if state.latest_seq != seq {
                        drop(state);
                        self.discard(seq);
                        return;
                    }
                    state.response = Some(Arc::new(response));
                    state.error = None;
                    state.in_flight = false;
                }

                // Only a response that made it into memory is written.
                self.persist(stored).await;
            }
            Err(err) => {
                self.record(|m| m.fetch_errors_total.inc());
                tracing::warn!("Query {} failed: {}", self.url, err);

                let mut state = self.lock_state();
                if state.latest_seq != seq {
                    drop(state);
                    self.discard(seq);
                    return;
                }
                state.error = Some(err);
                state.in_flight = false;
            }
        }

        self.completed.send_modify(|completed| *completed = (*completed).max(seq));
    }

    async fn persist(&self, stored: StoredResponse) {
        if let Err(err) = self.ctx.kv_store.set(&self.url, stored.into_value()).await {
            self.record(|m| m.store_errors_total.inc());
            tracing::warn!("Failed to cache response for {}: {}", self.url, err);
        }
    }

    fn discard(&self, seq: u64) {
        self.record(|m| m.discarded_total.inc());
        tracing::debug!("Discarding superseded response for {} (seq {})", self.url, seq);
    }

    /// Request `seq` ended without committing (it panicked, or its task was
    /// dropped). If it is still the latest, settle it as a failure.
    fn abandon(&self, seq: u64) {
        {
            let mut state = self.lock_state();
            if state.latest_seq != seq || !state.in_flight {
                return;
            }
            state.error = Some(QueryError::network(format!(
                "request for {} did not complete",
                self.url
            )));
            state.in_flight = false;
        }

        self.record(|m| m.fetch_errors_total.inc());
        tracing::warn!("Request for {} (seq {}) ended without a result", self.url, seq);
        self.completed.send_modify(|completed| *completed = (*completed).max(seq));
    }
}

/// Settles a request that is unwound or dropped before it commits.
struct RunGuard<'a, T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    inner: &'a Inner<T>,
    seq: u64,
    finished: bool,
}

impl<T> Drop for RunGuard<'_, T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    fn drop(&mut self) {
        if !self.finished {
            self.inner.abandon(self.seq);
        }
    }
}
