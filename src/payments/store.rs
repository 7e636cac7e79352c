//! Fulfilled order storage and persistence.

use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session {0} already recorded")]
    Duplicate(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Esim,
    Topup,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Esim => "esim",
            TransactionKind::Topup => "topup",
        }
    }
}

/// One paid checkout, fulfilled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub session_id: String,
    pub kind: TransactionKind,
    pub package_id: String,
    pub email: String,
    #[serde(default)]
    pub customer_name: Option<String>,
    /// Reseller order id, or top-up reference.
    pub reseller_order_id: String,
    #[serde(default)]
    pub iccid: Option<String>,
    #[serde(default)]
    pub qr_code_url: Option<String>,
    #[serde(default)]
    pub install_url: Option<String>,
    pub price: f64,
    pub currency: String,
    #[serde(default)]
    pub promo_code: Option<String>,
    #[serde(default)]
    pub partner_code: Option<String>,
    /// Seconds since the epoch.
    pub created_at: u64,
}

/// A package added to an already installed SIM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopupRecord {
    #[serde(default)]
    pub topup_id: Option<String>,
    pub iccid: String,
    pub session_id: String,
    pub email: String,
    pub package_id: String,
    pub amount: f64,
    pub currency: String,
    pub created_at: u64,
}

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Where fulfilled orders live.
pub trait OrderStore: Send + Sync {
    fn is_fulfilled(&self, session_id: &str) -> bool;

    /// Mark a session as being fulfilled. False if another delivery holds it.
    fn try_claim(&self, session_id: &str) -> bool;

    fn release(&self, session_id: &str);

    fn insert_order(&self, record: OrderRecord) -> Result<(), StoreError>;

    /// Record a top-up. A second record for the same session replaces the first.
    fn insert_topup(&self, record: TopupRecord) -> Result<(), StoreError>;

    /// The idempotency key for a session's upstream call. `generate` runs only
    /// the first time; the key is kept until the session's order is recorded.
    fn idempotency_key(
        &self,
        session_id: &str,
        generate: &dyn Fn() -> String,
    ) -> Result<String, StoreError>;

    fn order(&self, session_id: &str) -> Option<OrderRecord>;

    /// Top-ups recorded for a SIM, oldest first.
    fn topups_for(&self, iccid: &str) -> Vec<TopupRecord>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    orders: Vec<OrderRecord>,
    topups: Vec<TopupRecord>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pending_keys: BTreeMap<String, String>,
}

/// Concurrent in-memory store, optionally mirrored to a JSON file.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    orders: Arc<DashMap<String, OrderRecord>>,
    topups: Arc<DashMap<String, Vec<TopupRecord>>>,
    pending_keys: Arc<DashMap<String, String>>,
    in_flight: Arc<Mutex<HashSet<String>>>,
    write_lock: Arc<Mutex<()>>,
    persistence_path: Option<PathBuf>,
}

impl InMemoryOrderStore {
    pub fn new(persistence_path: Option<PathBuf>) -> Self {
        Self {
            persistence_path,
            ..Self::default()
        }
    }

    /// Load from `path` if it exists; later writes go back to it.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let store = Self::new(Some(path.to_path_buf()));
        if path.exists() {
            let reader = BufReader::new(File::open(path)?);
            let snapshot: Snapshot = serde_json::from_reader(reader)?;

            for order in snapshot.orders {
                store.orders.insert(order.session_id.clone(), order);
            }
            for topup in snapshot.topups {
                store.topups.entry(topup.iccid.clone()).or_default().push(topup);
            }
            for (session_id, key) in snapshot.pending_keys {
                store.pending_keys.insert(session_id, key);
            }
            tracing::info!(
                orders = store.orders.len(),
                path = %path.display(),
                "Loaded order store"
            );
        }
        Ok(store)
    }

    /// Write everything to the persistence file, if any.
    pub fn save_to_file(&self) -> Result<(), StoreError> {
        let Some(path) = &self.persistence_path else {
            return Ok(());
        };

        let _writer = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut snapshot = Snapshot {
            orders: self.orders.iter().map(|r| r.value().clone()).collect(),
            topups: self.topups.iter().flat_map(|r| r.value().clone()).collect(),
            pending_keys: self
                .pending_keys
                .iter()
                .map(|r| (r.key().clone(), r.value().clone()))
                .collect(),
        };
        snapshot.orders.sort_by(|a, b| a.session_id.cmp(&b.session_id));

        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, &snapshot)?;
        tracing::debug!(orders = snapshot.orders.len(), path = %path.display(), "Saved order store");
        Ok(())
    }

    pub fn count(&self) -> usize {
        self.orders.len()
    }

    fn in_flight(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.in_flight.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl OrderStore for InMemoryOrderStore {
    fn is_fulfilled(&self, session_id: &str) -> bool {
        self.orders.contains_key(session_id)
    }

    fn try_claim(&self, session_id: &str) -> bool {
        self.in_flight().insert(session_id.to_string())
    }

    fn release(&self, session_id: &str) {
        self.in_flight().remove(session_id);
    }

    fn insert_order(&self, record: OrderRecord) -> Result<(), StoreError> {
        match self.orders.entry(record.session_id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(StoreError::Duplicate(record.session_id));
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                self.pending_keys.remove(slot.key());
                slot.insert(record);
            }
        }
        self.save_to_file()
    }

    fn insert_topup(&self, record: TopupRecord) -> Result<(), StoreError> {
        let iccid = record.iccid.clone();
        let session_id = record.session_id.clone();
        let replaced = {
            let mut rows = self.topups.entry(iccid.clone()).or_default();
            let replaced = rows
                .iter()
                .position(|r| r.session_id == session_id)
                .map(|i| rows.remove(i));
            rows.push(record);
            replaced
        };

        if let Err(e) = self.save_to_file() {
            if let Some(mut rows) = self.topups.get_mut(&iccid) {
                rows.retain(|r| r.session_id != session_id);
                rows.extend(replaced);
            }
            return Err(e);
        }
        Ok(())
    }

    fn idempotency_key(
        &self,
        session_id: &str,
        generate: &dyn Fn() -> String,
    ) -> Result<String, StoreError> {
        let key = match self.pending_keys.entry(session_id.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(slot) => return Ok(slot.get().clone()),
            dashmap::mapref::entry::Entry::Vacant(slot) => slot.insert(generate()).value().clone(),
        };
        self.save_to_file()?;
        Ok(key)
    }

    fn order(&self, session_id: &str) -> Option<OrderRecord> {
        self.orders.get(session_id).map(|r| r.value().clone())
    }

    fn topups_for(&self, iccid: &str) -> Vec<TopupRecord> {
        self.topups
            .get(iccid)
            .map(|r| r.value().clone())
            .unwrap_or_default()
    }
}
