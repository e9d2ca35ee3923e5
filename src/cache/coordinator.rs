//! The fetch-or-claim / finalize protocol.
//!
//! All run state lives behind one mutex that is never held across an
//! `.await`. Checking a key and claiming it happen inside the same critical
//! section, as does registering a waiter on a `computing` key, so concurrent
//! requests for a new key produce exactly one claimant and the rest wait.
//! Durable I/O and the caller's computation happen outside the lock.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;

use crate::logging::{debug, error, info, trace, warn};
use crate::signature::{self, SignatureField, SignatureMismatch};
use crate::store::{DurableRecord, DurableStore};
use crate::ttl::Ttl;
use crate::value::Value;

use super::clock::{Clock, SystemClock};
use super::entry::{EntrySnapshot, EntryState, ValueEntry};
use super::error::CacheError;
use super::registry::RunRegistry;
use super::waiters::{WaitOutcome, Waiters};

/// Message given to waiters released by [`Coordinator::clear_run`].
const RUN_CLEARED: &str = "run was cleared before the value was computed";

/// Message given to waiters whose claimant disappeared without finalizing.
const CLAIM_ABANDONED: &str = "computation was abandoned before producing a value";

/// Why a `get` handed the computation to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum MissReason {
    /// Nothing in this run or the durable store.
    NoValue,
    /// The stored value outlived its validity duration.
    Expired(Ttl),
    /// The durable record was produced by different code.
    SignatureChanged(SignatureField),
    /// The run already knew the key in this (non-computed) state.
    OldState(EntryState),
}

impl fmt::Display for MissReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoValue => f.write_str("no cached value"),
            Self::Expired(ttl) => write!(f, "expired: {}", ttl),
            Self::SignatureChanged(field) => write!(f, "signature changed: {}", field),
            Self::OldState(state) => write!(f, "old state: {}", state),
        }
    }
}

/// Result of [`Coordinator::get`].
#[derive(Debug, Clone, PartialEq)]
pub enum GetOutcome {
    /// The value is available.
    Hit(Value),
    /// The caller now owns the key and must finalize it with `set`.
    Miss(MissReason),
    /// The run already associates the key with another signature. The caller
    /// may compute a value for itself but must not `set` it.
    Mismatch(SignatureMismatch),
    /// The computation this caller waited on failed.
    Error(String),
}

/// How a claimed computation ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Value(Value),
    Error(String),
}

struct RunState {
    registry: RunRegistry,
    waiters: Waiters,
}

/// What to do after the critical section of a `get`.
enum Step {
    Done(GetOutcome),
    Wait(oneshot::Receiver<WaitOutcome>),
    LoadDurable,
}

/// What to do after the critical section of a `set`.
enum DurableOp {
    Save(DurableRecord),
    Delete,
}

/// Owns the run registry, the waiters and the durable store of one process.
pub struct Coordinator<S> {
    state: Mutex<RunState>,
    store: S,
    clock: Arc<dyn Clock>,
    run_id: String,
}

impl<S: DurableStore> Coordinator<S> {
    /// Coordinator with the system clock.
    pub fn new(store: S) -> Self {
        Self::builder(store).build()
    }

    pub fn builder(store: S) -> CoordinatorBuilder<S> {
        CoordinatorBuilder {
            store,
            clock: None,
            run_id: None,
        }
    }

    /// Identifier of the current run, for diagnostics only.
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Fetch the value for `key`, or claim the right to compute it.
    ///
    /// `ttl` makes the key persistent on its first access in the run.
    pub async fn get(
        &self,
        key: &str,
        signature: &str,
        ttl: Option<Ttl>,
    ) -> Result<GetOutcome, CacheError> {
        trace!(run_id = %self.run_id, key = %key, sig = %signature, ?ttl, "get");
        let mut loaded: Option<Option<DurableRecord>> = None;

        loop {
            let step = {
                let mut state = self.lock();
                self.decide(&mut state, key, signature, ttl, loaded.take())
            };

            match step {
                Step::Done(outcome) => return Ok(outcome),
                Step::Wait(rx) => {
                    debug!(key = %key, "waiting for computation");
                    return Ok(match rx.await {
                        Ok(WaitOutcome::Computed(value)) => GetOutcome::Hit(value),
                        Ok(WaitOutcome::Failed(message)) => GetOutcome::Error(message),
                        Err(_) => GetOutcome::Error(CLAIM_ABANDONED.to_string()),
                    });
                }
                Step::LoadDurable => {
                    loaded = Some(self.store.load(key).await?);
                }
            }
        }
    }

    /// The synchronous part of `get`. Nothing here awaits.
    fn decide(
        &self,
        state: &mut RunState,
        key: &str,
        signature: &str,
        ttl: Option<Ttl>,
        loaded: Option<Option<DurableRecord>>,
    ) -> Step {
        let now = self.clock.now_millis();

        if let Some(entry) = state.registry.get_mut(key) {
            if let Some(mismatch) = signature::compare(&entry.signature, signature) {
                warn!(
                    run_id = %self.run_id,
                    key = %key,
                    field = %mismatch.field,
                    "{}",
                    mismatch.describe(key)
                );
                return Step::Done(GetOutcome::Mismatch(mismatch));
            }

            return match entry.state {
                EntryState::Computing => Step::Wait(state.waiters.wait(key)),
                EntryState::Computed => match ttl {
                    Some(ttl)
                        if entry.persistent
                            && ttl.is_expired(entry.computed_at.unwrap_or(now), now) =>
                    {
                        entry.invalidate(EntryState::Expired);
                        entry.claim();
                        debug!(key = %key, %ttl, "expired, claimed");
                        Step::Done(GetOutcome::Miss(MissReason::Expired(ttl)))
                    }
                    _ => {
                        debug!(key = %key, "hit");
                        Step::Done(GetOutcome::Hit(entry.value.clone()))
                    }
                },
                EntryState::Missing | EntryState::Expired | EntryState::SignatureChanged => {
                    let from = entry.claim();
                    debug!(key = %key, from = %from, "claimed");
                    Step::Done(GetOutcome::Miss(MissReason::OldState(from)))
                }
            };
        }

        if let Some(ttl) = ttl {
            match loaded {
                None => return Step::LoadDurable,
                Some(Some(record)) if record.key == key => {
                    return self.adopt_record(state, key, record, signature, ttl, now);
                }
                // Distinct keys can share one durable slot (e.g. after file
                // name sanitizing); a record stored for another key is not ours.
                Some(Some(_)) => {
                    warn!(key = %key, "durable record belongs to a different key, ignoring it");
                }
                Some(None) => {}
            }
        }

        let mut entry = ValueEntry::missing(key, signature, ttl.is_some());
        entry.claim();
        state.registry.insert(entry);
        debug!(key = %key, persistent = ttl.is_some(), "no cached value, claimed");
        Step::Done(GetOutcome::Miss(MissReason::NoValue))
    }

    /// First access in this run to a key found in the durable store.
    fn adopt_record(
        &self,
        state: &mut RunState,
        key: &str,
        record: DurableRecord,
        signature: &str,
        ttl: Ttl,
        now: u64,
    ) -> Step {
        let mismatch = signature::compare(&record.signature, signature);
        let expired = ttl.is_expired(record.computed_at, now);
        let mut entry = ValueEntry::from_record(key, record);

        let outcome = if let Some(mismatch) = mismatch {
            info!(key = %entry.key, field = %mismatch.field, "stored signature changed, recomputing");
            entry.signature = signature.to_string();
            entry.invalidate(EntryState::SignatureChanged);
            entry.claim();
            GetOutcome::Miss(MissReason::SignatureChanged(mismatch.field))
        } else if expired {
            debug!(key = %entry.key, %ttl, "stored value expired, recomputing");
            entry.invalidate(EntryState::Expired);
            entry.claim();
            GetOutcome::Miss(MissReason::Expired(ttl))
        } else {
            debug!(key = %entry.key, "durable hit");
            GetOutcome::Hit(entry.value.clone())
        };

        state.registry.insert(entry);
        Step::Done(outcome)
    }

    /// Finalize a key claimed by an earlier `get`.
    ///
    /// Waiters are released before the durable write; if that write fails the
    /// run keeps the value while the store does not.
    pub async fn set(&self, key: &str, completion: Completion) -> Result<EntrySnapshot, CacheError> {
        let (snapshot, op) = {
            let mut guard = self.lock();
            let state = &mut *guard;
            let entry = state
                .registry
                .get_mut(key)
                .ok_or_else(|| CacheError::NotLoaded {
                    key: key.to_string(),
                })?;
            if entry.state != EntryState::Computing {
                return Err(CacheError::NotComputing {
                    key: key.to_string(),
                    state: entry.state,
                });
            }

            let op = match completion {
                Completion::Value(value) => {
                    entry.complete(value, self.clock.now_millis());
                    state.waiters.notify_computed(key, &entry.value);
                    debug!(key = %key, persistent = entry.persistent, "computed");
                    entry.persistent.then(|| DurableOp::Save(entry.to_record()))
                }
                Completion::Error(message) => {
                    entry.fail();
                    state.waiters.notify_error(key, &message);
                    debug!(key = %key, error = %message, "computation failed");
                    // The stored value may be what made the computation fail.
                    entry.persistent.then_some(DurableOp::Delete)
                }
            };
            (entry.snapshot(), op)
        };

        let written = match op {
            Some(DurableOp::Save(record)) => self.store.save(&record).await,
            Some(DurableOp::Delete) => self.store.delete(key).await,
            None => Ok(()),
        };
        if let Err(e) = written {
            error!(key = %key, error = %e, "durable write failed");
            return Err(e.into());
        }
        Ok(snapshot)
    }

    /// Value from before this run's recomputation (persistent keys) or the
    /// current value (memory-only keys). `Undefined` for unknown keys.
    pub fn get_stale(&self, key: &str) -> Value {
        self.lock()
            .registry
            .get(key)
            .map(|entry| entry.stale_value().clone())
            .unwrap_or_default()
    }

    /// [`get_stale`](Self::get_stale) for every key starting with `prefix`.
    pub fn get_stale_list(&self, prefix: &str) -> Vec<Value> {
        self.lock()
            .registry
            .by_prefix(prefix)
            .map(|entry| entry.stale_value().clone())
            .collect()
    }

    pub fn snapshot(&self, key: &str) -> Option<EntrySnapshot> {
        self.lock().registry.get(key).map(ValueEntry::snapshot)
    }

    pub fn snapshot_prefix(&self, prefix: &str) -> Vec<EntrySnapshot> {
        self.lock()
            .registry
            .by_prefix(prefix)
            .map(ValueEntry::snapshot)
            .collect()
    }

    /// Forget every key of the current run. The durable store is untouched.
    ///
    /// Callers still waiting on a computation receive an error outcome.
    pub fn clear_run(&self) {
        let mut state = self.lock();
        info!(run_id = %self.run_id, entries = state.registry.len(), "clearing run");
        state.registry.clear();
        state.waiters.fail_all(RUN_CLEARED);
    }

    fn lock(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Builder for [`Coordinator`].
pub struct CoordinatorBuilder<S> {
    store: S,
    clock: Option<Arc<dyn Clock>>,
    run_id: Option<String>,
}

impl<S: DurableStore> CoordinatorBuilder<S> {
    /// Use a custom time source.
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    /// Label log output with this run identifier.
    pub fn run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    pub fn build(self) -> Coordinator<S> {
        Coordinator {
            state: Mutex::new(RunState {
                registry: RunRegistry::new(),
                waiters: Waiters::new(),
            }),
            store: self.store,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            run_id: self.run_id.unwrap_or_else(|| "default".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::cache::clock::ManualClock;
    use crate::signature::{CallSite, Signature};
    use crate::store::MemoryStore;

    const START: u64 = 1_700_000_000_000;
    const HOUR: Ttl = Ttl::Millis(3_600_000);

    fn coordinator(store: &MemoryStore, clock: &ManualClock) -> Coordinator<MemoryStore> {
        Coordinator::builder(store.clone()).clock(clock.clone()).build()
    }

    fn sig(body: &str, ttl: Option<Ttl>) -> String {
        Signature::compute(&CallSite::new("tests.rs:1"), ttl, body).into_string()
    }

    fn miss(reason: MissReason) -> GetOutcome {
        GetOutcome::Miss(reason)
    }

    #[tokio::test]
    async fn test_claim_hit_mismatch_scenario() {
        let cache = Coordinator::new(MemoryStore::new());

        assert_eq!(cache.get("k", "s1", None).await.unwrap(), miss(MissReason::NoValue));
        cache.set("k", Completion::Value(Value::from(42))).await.unwrap();
        assert_eq!(cache.snapshot("k").unwrap().state, EntryState::Computed);

        assert_eq!(cache.get("k", "s1", None).await.unwrap(), GetOutcome::Hit(Value::from(42)));

        let GetOutcome::Mismatch(mismatch) = cache.get("k", "s2", None).await.unwrap() else {
            panic!("expected a signature mismatch");
        };
        assert_eq!(mismatch.stored, "s1");
        assert_eq!(mismatch.current, "s2");
        // The entry is left as it was.
        assert_eq!(cache.get("k", "s1", None).await.unwrap(), GetOutcome::Hit(Value::from(42)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_single_flight() {
        let cache = Arc::new(Coordinator::new(MemoryStore::new()));
        let computations = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let computations = Arc::clone(&computations);
                tokio::spawn(async move {
                    match cache.get("shared", "s", None).await.unwrap() {
                        GetOutcome::Hit(value) => value,
                        GetOutcome::Miss(_) => {
                            computations.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            let value = Value::from("expensive");
                            cache.set("shared", Completion::Value(value.clone())).await.unwrap();
                            value
                        }
                        other => panic!("unexpected outcome {:?}", other),
                    }
                })
            })
            .collect();

        for task in tasks {
            assert_eq!(task.await.unwrap(), Value::from("expensive"));
        }
        assert_eq!(computations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_ttl_expiry_across_runs() {
        let store = MemoryStore::new();
        let clock = ManualClock::new(START);
        let s = sig("compute()", Some(HOUR));

        let run1 = coordinator(&store, &clock);
        assert_eq!(run1.get("k", &s, Some(HOUR)).await.unwrap(), miss(MissReason::NoValue));
        run1.set("k", Completion::Value(Value::from(1))).await.unwrap();
        assert_eq!(store.len(), 1);

        clock.advance(Duration::from_secs(1800));
        let run2 = coordinator(&store, &clock);
        assert_eq!(run2.get("k", &s, Some(HOUR)).await.unwrap(), GetOutcome::Hit(Value::from(1)));

        clock.advance(Duration::from_secs(3600));
        let run3 = coordinator(&store, &clock);
        assert_eq!(run3.get("k", &s, Some(HOUR)).await.unwrap(), miss(MissReason::Expired(HOUR)));
        run3.set("k", Completion::Value(Value::from(2))).await.unwrap();
        assert_eq!(run3.get_stale("k"), Value::from(1));
        assert_eq!(store.load("k").await.unwrap().unwrap().value, Value::from(2));
    }

    #[tokio::test]
    async fn test_ttl_expiry_within_run() {
        let clock = ManualClock::new(START);
        let cache = coordinator(&MemoryStore::new(), &clock);
        let ttl = Ttl::Millis(100);

        cache.get("k", "s", Some(ttl)).await.unwrap();
        cache.set("k", Completion::Value(Value::from("first"))).await.unwrap();
        assert_eq!(cache.get_stale("k"), Value::Undefined);

        clock.advance(Duration::from_millis(100));
        assert_eq!(cache.get("k", "s", Some(ttl)).await.unwrap(), GetOutcome::Hit(Value::from("first")));

        clock.advance(Duration::from_millis(1));
        assert_eq!(cache.get("k", "s", Some(ttl)).await.unwrap(), miss(MissReason::Expired(ttl)));
        assert_eq!(cache.get_stale("k"), Value::from("first"));

        cache.set("k", Completion::Value(Value::from("second"))).await.unwrap();
        assert_eq!(cache.get_stale("k"), Value::from("first"));
        assert_eq!(cache.get("k", "s", Some(ttl)).await.unwrap(), GetOutcome::Hit(Value::from("second")));
    }

    #[tokio::test]
    async fn test_signature_change_between_runs() {
        let store = MemoryStore::new();
        let clock = ManualClock::new(START);

        let run1 = coordinator(&store, &clock);
        run1.get("k", &sig("() => 1", Some(HOUR)), Some(HOUR)).await.unwrap();
        run1.set("k", Completion::Value(Value::from(1))).await.unwrap();

        let run2 = coordinator(&store, &clock);
        let edited = sig("() => 2", Some(HOUR));
        assert_eq!(
            run2.get("k", &edited, Some(HOUR)).await.unwrap(),
            miss(MissReason::SignatureChanged(SignatureField::FunctionBody))
        );
        assert_eq!(run2.snapshot("k").unwrap().state, EntryState::Computing);
        assert_eq!(run2.get_stale("k"), Value::from(1));

        run2.set("k", Completion::Value(Value::from(2))).await.unwrap();
        assert_eq!(run2.get("k", &edited, Some(HOUR)).await.unwrap(), GetOutcome::Hit(Value::from(2)));

        let run3 = coordinator(&store, &clock);
        let longer = Ttl::Millis(7_200_000);
        assert_eq!(
            run3.get("k", &sig("() => 2", Some(longer)), Some(longer)).await.unwrap(),
            miss(MissReason::SignatureChanged(SignatureField::Ttl))
        );
    }

    #[tokio::test]
    async fn test_call_site_conflict_within_run() {
        let cache = Coordinator::new(MemoryStore::new());
        let first = Signature::compute(&CallSite::new("a.rs:10"), None, "f").into_string();
        let second = Signature::compute(&CallSite::new("b.rs:20"), None, "f").into_string();

        cache.get("k", &first, None).await.unwrap();
        cache.set("k", Completion::Value(Value::from(1))).await.unwrap();

        let GetOutcome::Mismatch(mismatch) = cache.get("k", &second, None).await.unwrap() else {
            panic!("expected a signature mismatch");
        };
        assert_eq!(mismatch.field, SignatureField::CallSite);
        assert_eq!(mismatch.stored, "a.rs:10");
        assert_eq!(mismatch.current, "b.rs:20");
    }

    #[tokio::test]
    async fn test_stale_for_memory_only_key() {
        let cache = Coordinator::new(MemoryStore::new());
        assert_eq!(cache.get_stale("k"), Value::Undefined);

        cache.get("k", "s", None).await.unwrap();
        assert_eq!(cache.get_stale("k"), Value::Undefined);
        cache.set("k", Completion::Value(Value::from(5))).await.unwrap();
        assert_eq!(cache.get_stale("k"), Value::from(5));
    }

    #[tokio::test]
    async fn test_stale_list_by_prefix() {
        let clock = ManualClock::new(START);
        let cache = coordinator(&MemoryStore::new(), &clock);

        for (key, n) in [("user:z", 1), ("admin", 2), ("user:a", 3)] {
            cache.get(key, "s", None).await.unwrap();
            cache.set(key, Completion::Value(Value::from(n))).await.unwrap();
        }
        cache.get("user:m", "s", Some(HOUR)).await.unwrap();
        cache.set("user:m", Completion::Value(Value::from(4))).await.unwrap();

        // First-access order, not key order.
        assert_eq!(
            cache.get_stale_list("user:"),
            vec![Value::from(1), Value::from(3), Value::Undefined]
        );
        assert!(cache.get_stale_list("nobody").is_empty());
    }

    #[tokio::test]
    async fn test_clear_run_keeps_durable_values() {
        let store = MemoryStore::new();
        let clock = ManualClock::new(START);
        let cache = coordinator(&store, &clock);

        cache.get("memory", "s", None).await.unwrap();
        cache.set("memory", Completion::Value(Value::from(1))).await.unwrap();
        cache.get("durable", "s", Some(HOUR)).await.unwrap();
        cache.set("durable", Completion::Value(Value::from(2))).await.unwrap();

        cache.clear_run();
        assert_eq!(cache.snapshot("memory"), None);
        assert_eq!(cache.get_stale("memory"), Value::Undefined);

        assert_eq!(cache.get("memory", "s", None).await.unwrap(), miss(MissReason::NoValue));
        assert_eq!(cache.get("durable", "s", Some(HOUR)).await.unwrap(), GetOutcome::Hit(Value::from(2)));
    }

    #[tokio::test]
    async fn test_undefined_round_trip() {
        let store = MemoryStore::new();
        let clock = ManualClock::new(START);

        let run1 = coordinator(&store, &clock);
        run1.get("nothing", "s", Some(HOUR)).await.unwrap();
        run1.set("nothing", Completion::Value(Value::Undefined)).await.unwrap();
        assert_eq!(run1.get("nothing", "s", Some(HOUR)).await.unwrap(), GetOutcome::Hit(Value::Undefined));

        let run2 = coordinator(&store, &clock);
        assert_eq!(run2.get("nothing", "s", Some(HOUR)).await.unwrap(), GetOutcome::Hit(Value::Undefined));
    }

    #[tokio::test]
    async fn test_error_reaches_waiters_and_reverts() {
        let store = MemoryStore::new();
        let cache = Arc::new(Coordinator::new(store.clone()));

        assert_eq!(cache.get("k", "s", Some(HOUR)).await.unwrap(), miss(MissReason::NoValue));

        let waiter = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.get("k", "s", Some(HOUR)).await.unwrap() })
        };
        while cache.lock().waiters.pending("k") == 0 {
            tokio::task::yield_now().await;
        }

        let snapshot = cache.set("k", Completion::Error("boom".to_string())).await.unwrap();
        assert_eq!(snapshot.state, EntryState::Missing);
        assert_eq!(waiter.await.unwrap(), GetOutcome::Error("boom".to_string()));
        assert!(store.is_empty());

        assert_eq!(
            cache.get("k", "s", Some(HOUR)).await.unwrap(),
            miss(MissReason::OldState(EntryState::Missing))
        );
    }

    #[tokio::test]
    async fn test_set_requires_claim() {
        let cache = Coordinator::new(MemoryStore::new());

        let err = cache.set("k", Completion::Value(Value::Null)).await.unwrap_err();
        assert!(matches!(err, CacheError::NotLoaded { .. }));
        assert!(err.is_protocol_misuse());

        cache.get("k", "s", None).await.unwrap();
        cache.set("k", Completion::Value(Value::Null)).await.unwrap();
        let err = cache.set("k", Completion::Value(Value::Null)).await.unwrap_err();
        assert!(matches!(
            err,
            CacheError::NotComputing { state: EntryState::Computed, .. }
        ));
    }

    #[tokio::test]
    async fn test_clear_run_releases_waiters() {
        let cache = Arc::new(Coordinator::new(MemoryStore::new()));
        cache.get("k", "s", None).await.unwrap();

        let waiter = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.get("k", "s", None).await.unwrap() })
        };
        while cache.lock().waiters.pending("k") == 0 {
            tokio::task::yield_now().await;
        }

        cache.clear_run();
        assert_eq!(waiter.await.unwrap(), GetOutcome::Error(RUN_CLEARED.to_string()));
    }

    /// Races `callers` tasks on a persistent key; the one that misses stores `fresh`.
    async fn race_persistent(
        cache: Arc<Coordinator<MemoryStore>>,
        callers: usize,
        fresh: Value,
    ) -> (usize, Vec<Value>) {
        let misses = Arc::new(AtomicUsize::new(0));
        let tasks: Vec<_> = (0..callers)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let misses = Arc::clone(&misses);
                let fresh = fresh.clone();
                tokio::spawn(async move {
                    match cache.get("report", "s", Some(HOUR)).await.unwrap() {
                        GetOutcome::Hit(value) => value,
                        GetOutcome::Miss(_) => {
                            misses.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(20)).await;
                            cache.set("report", Completion::Value(fresh.clone())).await.unwrap();
                            fresh
                        }
                        other => panic!("unexpected outcome {:?}", other),
                    }
                })
            })
            .collect();

        let mut values = Vec::new();
        for task in tasks {
            values.push(task.await.unwrap());
        }
        (misses.load(Ordering::SeqCst), values)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_durable_hit() {
        let store = MemoryStore::new();
        let clock = ManualClock::new(START);
        let run1 = coordinator(&store, &clock);
        run1.get("report", "s", Some(HOUR)).await.unwrap();
        run1.set("report", Completion::Value(Value::from("stored"))).await.unwrap();

        clock.advance(Duration::from_secs(60));
        let run2 = Arc::new(coordinator(&store, &clock));
        let (misses, values) = race_persistent(Arc::clone(&run2), 16, Value::from("fresh")).await;

        assert_eq!(misses, 0);
        assert!(values.iter().all(|v| *v == Value::from("stored")));
        assert_eq!(run2.snapshot("report").unwrap().state, EntryState::Computed);
        assert_eq!(run2.lock().registry.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_durable_expiry_claims_once() {
        let store = MemoryStore::new();
        let clock = ManualClock::new(START);
        let run1 = coordinator(&store, &clock);
        run1.get("report", "s", Some(HOUR)).await.unwrap();
        run1.set("report", Completion::Value(Value::from("stored"))).await.unwrap();

        clock.advance(Duration::from_secs(2 * 3600));
        let run2 = Arc::new(coordinator(&store, &clock));
        let (misses, values) = race_persistent(Arc::clone(&run2), 16, Value::from("fresh")).await;

        assert_eq!(misses, 1);
        assert!(values.iter().all(|v| *v == Value::from("fresh")));
        assert_eq!(run2.get_stale("report"), Value::from("stored"));
        assert_eq!(store.load("report").await.unwrap().unwrap().value, Value::from("fresh"));
    }

    #[cfg(feature = "fs")]
    #[tokio::test]
    async fn test_colliding_file_names_keep_keys_apart() {
        use crate::store::FsStore;

        let dir = tempfile::TempDir::new().unwrap();
        let store = FsStore::new(dir.path());
        let clock = ManualClock::new(START);
        let build = || {
            Coordinator::builder(store.clone())
                .clock(clock.clone())
                .build()
        };
        assert_eq!(store.record_path("a/b"), store.record_path("a:b"));

        let run1 = build();
        run1.get("a/b", "s", Some(Ttl::Infinite)).await.unwrap();
        run1.set("a/b", Completion::Value(Value::from(1))).await.unwrap();

        let run2 = build();
        assert_eq!(
            run2.get("a:b", "s2", Some(Ttl::Infinite)).await.unwrap(),
            miss(MissReason::NoValue)
        );
        assert_eq!(run2.snapshot("a:b").unwrap().state, EntryState::Computing);
        assert_eq!(run2.snapshot("a/b"), None);

        let snapshot = run2.set("a:b", Completion::Value(Value::from(2))).await.unwrap();
        assert_eq!(snapshot.key, "a:b");
        assert_eq!(
            run2.get("a:b", "s2", Some(Ttl::Infinite)).await.unwrap(),
            GetOutcome::Hit(Value::from(2))
        );

        // The slot now holds "a:b", so "a/b" is claimable instead of stuck.
        assert_eq!(
            run2.get("a/b", "s", Some(Ttl::Infinite)).await.unwrap(),
            miss(MissReason::NoValue)
        );
        assert_eq!(run2.snapshot("a/b").unwrap().state, EntryState::Computing);
    }

    #[test]
    fn test_miss_reason_messages() {
        assert_eq!(MissReason::NoValue.to_string(), "no cached value");
        assert_eq!(MissReason::Expired(Ttl::Millis(5)).to_string(), "expired: 5ms");
        assert_eq!(
            MissReason::SignatureChanged(SignatureField::CallSite).to_string(),
            "signature changed: call site"
        );
        assert_eq!(
            MissReason::OldState(EntryState::Missing).to_string(),
            "old state: missing"
        );
    }
}
