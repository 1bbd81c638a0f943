//! In-process transports and stores for query tests.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Wake, Waker};
use std::thread::{self, Thread};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, Notify, Semaphore};

use crate::chain::{Bech32Config, ChainInfo, StaticChainGetter};
use crate::error::QueryError;
use crate::query::QueryContext;
use crate::services::rest::{RawResponse, RestTransport};
use crate::store::{KvStore, MemoryKvStore};

pub(crate) const TEST_CHAIN_ID: &str = "cosmoshub-4";
pub(crate) const TEST_REST: &str = "https://lcd.example";

pub(crate) fn test_context<R>(transport: Arc<R>) -> (QueryContext, Arc<MemoryKvStore>)
where
    R: RestTransport + Send + Sync + 'static,
{
    let kv_store = Arc::new(MemoryKvStore::new());
    (test_context_with_store(transport, kv_store.clone()), kv_store)
}

pub(crate) fn test_context_with_store<R, S>(transport: Arc<R>, kv_store: Arc<S>) -> QueryContext
where
    R: RestTransport + Send + Sync + 'static,
    S: KvStore + Send + Sync + 'static,
{
    let chain_getter = StaticChainGetter::new([ChainInfo {
        chain_id: TEST_CHAIN_ID.to_string(),
        rest: TEST_REST.to_string(),
        bech32_config: Bech32Config::from_prefix("cosmos"),
    }]);

    QueryContext::new(kv_store, Arc::new(chain_getter), transport)
}

/// Drive a future on the current thread with no Tokio runtime around it.
pub(crate) fn block_on<F: Future>(future: F) -> F::Output {
    struct ThreadWaker(Thread);

    impl Wake for ThreadWaker {
        fn wake(self: Arc<Self>) {
            self.0.unpark();
        }
    }

    let waker = Waker::from(Arc::new(ThreadWaker(thread::current())));
    let mut cx = Context::from_waker(&waker);
    let mut future = std::pin::pin!(future);
    loop {
        if let Poll::Ready(output) = future.as_mut().poll(&mut cx) {
            return output;
        }
        thread::park();
    }
}

/// Memory store that can be told to fail reads or writes, or to hold each
/// write open until the test releases it.
pub(crate) struct TestKvStore {
    inner: MemoryKvStore,
    fail_get: bool,
    fail_set: bool,
    gate: Option<WriteGate>,
}

struct WriteGate {
    entered: Notify,
    release: Semaphore,
}

impl TestKvStore {
    pub(crate) fn new() -> Self {
        Self {
            inner: MemoryKvStore::new(),
            fail_get: false,
            fail_set: false,
            gate: None,
        }
    }

    pub(crate) fn failing_get(mut self) -> Self {
        self.fail_get = true;
        self
    }

    pub(crate) fn failing_set(mut self) -> Self {
        self.fail_set = true;
        self
    }

    pub(crate) fn gated(mut self) -> Self {
        self.gate = Some(WriteGate {
            entered: Notify::new(),
            release: Semaphore::new(0),
        });
        self
    }

    /// Resolves once a gated write has started.
    pub(crate) async fn write_started(&self) {
        if let Some(gate) = &self.gate {
            gate.entered.notified().await;
        }
    }

    pub(crate) fn release_write(&self) {
        if let Some(gate) = &self.gate {
            gate.release.add_permits(1);
        }
    }

    /// Read straight from the backing map, bypassing `fail_get`.
    pub(crate) async fn entry(&self, key: &str) -> Option<Value> {
        self.inner.get(key).await.unwrap()
    }
}

#[async_trait]
impl KvStore for TestKvStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, QueryError> {
        if self.fail_get {
            return Err(QueryError::storage("database is locked"));
        }
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), QueryError> {
        if let Some(gate) = &self.gate {
            gate.entered.notify_one();
            gate.release
                .acquire()
                .await
                .map_err(|_| QueryError::storage("write gate closed"))?
                .forget();
        }
        if self.fail_set {
            return Err(QueryError::storage("disk full"));
        }
        self.inner.set(key, value).await
    }
}

/// Answers requests in order from a prepared queue.
#[derive(Default)]
pub(crate) struct QueuedTransport {
    outcomes: Mutex<VecDeque<Result<Value, QueryError>>>,
    calls: AtomicUsize,
}

impl QueuedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_ok(self, data: Value) -> Self {
        self.outcomes.lock().unwrap().push_back(Ok(data));
        self
    }

    pub(crate) fn with_err(self, err: QueryError) -> Self {
        self.outcomes.lock().unwrap().push_back(Err(err));
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RestTransport for QueuedTransport {
    async fn get_json(&self, _base_url: &str, _path: &str) -> Result<RawResponse, QueryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let outcome = self
            .outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(QueryError::network("no scripted response")));

        outcome.map(|data| RawResponse { status: 200, data })
    }
}

/// A request held open until the test answers it.
pub(crate) struct PendingRequest {
    pub(crate) path: String,
    reply: oneshot::Sender<Result<RawResponse, QueryError>>,
}

impl PendingRequest {
    pub(crate) fn ok(self, data: Value) {
        let _ = self.reply.send(Ok(RawResponse { status: 200, data }));
    }

    pub(crate) fn fail(self, err: QueryError) {
        let _ = self.reply.send(Err(err));
    }
}

/// Hands every request to the test through a channel, so responses can be
/// released in any order.
pub(crate) struct ScriptedTransport {
    requests: mpsc::UnboundedSender<PendingRequest>,
}

pub(crate) fn scripted() -> (Arc<ScriptedTransport>, mpsc::UnboundedReceiver<PendingRequest>) {
    let (requests, receiver) = mpsc::unbounded_channel();
    (Arc::new(ScriptedTransport { requests }), receiver)
}

#[async_trait]
impl RestTransport for ScriptedTransport {
    async fn get_json(&self, _base_url: &str, path: &str) -> Result<RawResponse, QueryError> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(PendingRequest {
                path: path.to_string(),
                reply,
            })
            .map_err(|_| QueryError::network("test receiver dropped"))?;

        response
            .await
            .unwrap_or_else(|_| Err(QueryError::network("request dropped")))
    }
}

/// Transport with a bug: every request panics.
pub(crate) struct PanickingTransport;

#[async_trait]
impl RestTransport for PanickingTransport {
    async fn get_json(&self, _base_url: &str, path: &str) -> Result<RawResponse, QueryError> {
        panic!("transport failed on {}", path);
    }
}
