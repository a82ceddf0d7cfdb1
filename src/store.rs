use crate::db::{BlobStore, MemoryBlobStore};
use crate::errors::{AppError, AppResult};
use crate::models::{Record, RecordDraft, RecordKind, StoreEvent};
use chrono::{Local, NaiveDate};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

pub type SubscriberId = u64;

type Callback = Arc<dyn Fn(&StoreEvent) + Send + Sync>;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotEnvelope {
    kind: RecordKind,
    records: Vec<Record>,
}

struct Registry {
    default_blob: Arc<dyn BlobStore>,
    stores: HashMap<RecordKind, Arc<RecordStore>>,
}

static REGISTRY: Lazy<Mutex<Registry>> = Lazy::new(|| {
    Mutex::new(Registry {
        default_blob: Arc::new(MemoryBlobStore::new()),
        stores: HashMap::new(),
    })
});

/// Selects the persistence backend for stores created after this call.
/// Stores already handed out keep the backend they were built with.
pub fn configure_blob_store(blob: Arc<dyn BlobStore>) -> AppResult<()> {
    let mut registry = REGISTRY
        .lock()
        .map_err(|_| AppError::Internal("store registry mutex poisoned".to_string()))?;
    registry.default_blob = blob;
    Ok(())
}

/// Returns the one process-wide store for `kind`, constructing it (and
/// restoring any prior snapshot) on first call.
pub fn get_instance(kind: RecordKind) -> AppResult<Arc<RecordStore>> {
    let mut registry = REGISTRY
        .lock()
        .map_err(|_| AppError::Internal("store registry mutex poisoned".to_string()))?;
    if let Some(store) = registry.stores.get(&kind) {
        return Ok(Arc::clone(store));
    }
    let store = Arc::new(RecordStore::new(kind, Arc::clone(&registry.default_blob)));
    registry.stores.insert(kind, Arc::clone(&store));
    Ok(store)
}

/// Process-wide owner of one record kind's collection.
///
/// Mutations go through `add`/`update`/`remove` only; every read path hands
/// out owned clones. Snapshots are written to the blob store after each
/// mutation on a best-effort basis.
pub struct RecordStore {
    kind: RecordKind,
    records: Mutex<Vec<Record>>,
    observers: Mutex<Vec<(SubscriberId, Callback)>>,
    next_subscriber: AtomicU64,
    blob: Arc<dyn BlobStore>,
}

impl RecordStore {
    pub fn new(kind: RecordKind, blob: Arc<dyn BlobStore>) -> Self {
        let records = match blob.get(kind.as_str()) {
            Ok(Some(snapshot)) => match parse_snapshot(kind, &snapshot) {
                Ok(records) => records,
                Err(error) => {
                    tracing::warn!(kind = %kind, error = %error, "skipping malformed snapshot");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(error) => {
                tracing::warn!(kind = %kind, error = %error, "snapshot read failed; starting empty");
                Vec::new()
            }
        };

        Self {
            kind,
            records: Mutex::new(records),
            observers: Mutex::new(Vec::new()),
            next_subscriber: AtomicU64::new(1),
            blob,
        }
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    /// Owned copy of the full collection, in insertion order.
    pub fn records(&self) -> AppResult<Vec<Record>> {
        Ok(self.lock_records()?.clone())
    }

    pub fn get(&self, id: &str) -> AppResult<Option<Record>> {
        let records = self.lock_records()?;
        Ok(records.iter().find(|record| record.id == id).cloned())
    }

    pub fn len(&self) -> AppResult<usize> {
        Ok(self.lock_records()?.len())
    }

    pub fn is_empty(&self) -> AppResult<bool> {
        Ok(self.lock_records()?.is_empty())
    }

    /// Appends a new record with a freshly assigned id and returns it.
    pub fn add(&self, draft: RecordDraft) -> AppResult<Record> {
        let today = today();
        let record = {
            let mut records = self.lock_records()?;
            let id = assign_id(&records);
            let mut fields = draft.fields;
            self.kind.apply_derived_fields(draft.date, today, &mut fields);
            let record = Record {
                id,
                date: draft.date,
                fields,
            };
            records.push(record.clone());
            self.persist_best_effort(&records);
            record
        };

        self.notify(StoreEvent::Added(record.clone()));
        Ok(record)
    }

    /// Merges `patch` into the record's fields and re-derives computed
    /// fields. Fails with `NotFound` for an unknown id, leaving the
    /// collection untouched.
    pub fn update(&self, id: &str, patch: BTreeMap<String, Value>) -> AppResult<Record> {
        let today = today();
        let record = {
            let mut records = self.lock_records()?;
            let Some(record) = records.iter_mut().find(|record| record.id == id) else {
                return Err(AppError::NotFound(format!(
                    "No {} record with id {}",
                    self.kind, id
                )));
            };
            record.fields.extend(patch);
            let date = record.date;
            self.kind.apply_derived_fields(date, today, &mut record.fields);
            let updated = record.clone();
            self.persist_best_effort(&records);
            updated
        };

        self.notify(StoreEvent::Updated(record.clone()));
        Ok(record)
    }

    pub fn remove(&self, id: &str) -> AppResult<()> {
        {
            let mut records = self.lock_records()?;
            let Some(index) = records.iter().position(|record| record.id == id) else {
                return Err(AppError::NotFound(format!(
                    "No {} record with id {}",
                    self.kind, id
                )));
            };
            records.remove(index);
            self.persist_best_effort(&records);
        }

        self.notify(StoreEvent::Removed(id.to_string()));
        Ok(())
    }

    /// Registers an observer invoked synchronously after every successful
    /// mutation, in subscription order. Pass the returned id to
    /// `unsubscribe` to stop deliveries.
    pub fn subscribe(
        &self,
        callback: impl Fn(&StoreEvent) + Send + Sync + 'static,
    ) -> AppResult<SubscriberId> {
        let id = self.next_subscriber.fetch_add(1, Ordering::Relaxed);
        let mut observers = self.lock_observers()?;
        observers.push((id, Arc::new(callback)));
        Ok(id)
    }

    /// Removes an observer. Returns false if the id was already gone.
    pub fn unsubscribe(&self, id: SubscriberId) -> AppResult<bool> {
        let mut observers = self.lock_observers()?;
        let before = observers.len();
        observers.retain(|(observer_id, _)| *observer_id != id);
        Ok(observers.len() != before)
    }

    /// Serializes the full collection as a JSON envelope tagged with the
    /// store's kind.
    pub fn snapshot(&self) -> AppResult<String> {
        let records = self.lock_records()?;
        serialize_snapshot(self.kind, &records)
    }

    /// Replaces the collection wholesale from a snapshot blob. Startup-only;
    /// observers are not notified.
    pub fn restore(&self, blob: &str) -> AppResult<()> {
        let restored = parse_snapshot(self.kind, blob)?;
        let mut records = self.lock_records()?;
        *records = restored;
        Ok(())
    }

    fn persist_best_effort(&self, records: &[Record]) {
        let blob = match serialize_snapshot(self.kind, records) {
            Ok(blob) => blob,
            Err(error) => {
                tracing::warn!(kind = %self.kind, error = %error, "snapshot serialization failed");
                return;
            }
        };
        if let Err(error) = self.blob.set(self.kind.as_str(), &blob) {
            tracing::warn!(kind = %self.kind, error = %error, "snapshot write failed; in-memory state kept");
        }
    }

    fn notify(&self, event: StoreEvent) {
        // Snapshot the callbacks so an observer may re-enter the store.
        let callbacks: Vec<Callback> = match self.lock_observers() {
            Ok(observers) => observers
                .iter()
                .map(|(_, callback)| Arc::clone(callback))
                .collect(),
            Err(error) => {
                tracing::warn!(kind = %self.kind, error = %error, "observer list unavailable");
                return;
            }
        };

        for callback in callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback(&event))).is_err() {
                tracing::warn!(kind = %self.kind, "observer panicked during notification");
            }
        }
    }

    fn lock_records(&self) -> AppResult<MutexGuard<'_, Vec<Record>>> {
        self.records
            .lock()
            .map_err(|_| AppError::Internal("record store mutex poisoned".to_string()))
    }

    fn lock_observers(&self) -> AppResult<MutexGuard<'_, Vec<(SubscriberId, Callback)>>> {
        self.observers
            .lock()
            .map_err(|_| AppError::Internal("observer list mutex poisoned".to_string()))
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn assign_id(records: &[Record]) -> String {
    loop {
        let candidate = Uuid::new_v4().to_string();
        if !records.iter().any(|record| record.id == candidate) {
            return candidate;
        }
    }
}

fn serialize_snapshot(kind: RecordKind, records: &[Record]) -> AppResult<String> {
    Ok(serde_json::to_string(&SnapshotEnvelope {
        kind,
        records: records.to_vec(),
    })?)
}

fn parse_snapshot(kind: RecordKind, blob: &str) -> AppResult<Vec<Record>> {
    let envelope: SnapshotEnvelope = serde_json::from_str(blob)
        .map_err(|error| AppError::InvalidArgument(format!("Malformed snapshot: {}", error)))?;
    if envelope.kind != kind {
        return Err(AppError::InvalidArgument(format!(
            "Snapshot kind {} does not match store kind {}",
            envelope.kind, kind
        )));
    }
    Ok(envelope.records)
}
