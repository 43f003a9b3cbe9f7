//! In-process store of pending deletion confirmations.

use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use super::types::{ConfirmationStats, DeletionConfirmation, DeletionDetails, PendingToken};
use crate::error::{ConfirmationFailure, MirrorError, Result};

#[derive(Debug, Clone)]
struct PendingEntry {
    expires_at: DateTime<Utc>,
    batch: bool,
    items: Vec<DeletionDetails>,
}

/// Single-use tokens with a fixed time-to-live. Nothing is persisted.
#[derive(Debug, Clone)]
pub struct ConfirmationStore {
    ttl: TimeDelta,
    entries: Arc<Mutex<HashMap<String, PendingEntry>>>,
}

impl ConfirmationStore {
    pub fn new(ttl: Duration) -> Result<Self> {
        let ttl = TimeDelta::from_std(ttl).map_err(|_| MirrorError::Config {
            message: format!("Confirmation TTL out of range: {:?}", ttl),
        })?;
        Ok(Self {
            ttl,
            entries: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, PendingEntry>> {
        // Entries are plain data; a poisoned lock is still usable.
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn sweep(entries: &mut HashMap<String, PendingEntry>, now: DateTime<Utc>) {
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at >= now);
        let swept = before - entries.len();
        if swept > 0 {
            debug!("Swept {} expired deletion confirmations", swept);
        }
    }

    /// Store a new pending confirmation and return it.
    pub fn issue(&self, batch: bool, items: Vec<DeletionDetails>) -> DeletionConfirmation {
        let now = Utc::now();
        let token = Uuid::new_v4().to_string();
        let expires_at = now
            .checked_add_signed(self.ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let mut entries = self.lock();
        Self::sweep(&mut entries, now);
        entries.insert(
            token.clone(),
            PendingEntry {
                expires_at,
                batch,
                items: items.clone(),
            },
        );

        DeletionConfirmation {
            token,
            expires_at,
            batch,
            items,
        }
    }

    /// Consume a token. A token of the wrong kind stays pending.
    pub fn take(&self, token: &str, batch: bool) -> Result<Vec<DeletionDetails>> {
        let now = Utc::now();
        let mut entries = self.lock();

        let Some(entry) = entries.get(token) else {
            return Err(MirrorError::confirmation(ConfirmationFailure::Missing));
        };
        if entry.expires_at < now {
            entries.remove(token);
            return Err(MirrorError::confirmation(ConfirmationFailure::Expired));
        }
        if entry.batch != batch {
            return Err(MirrorError::confirmation(ConfirmationFailure::Invalid));
        }

        match entries.remove(token) {
            Some(entry) => Ok(entry.items),
            None => Err(MirrorError::confirmation(ConfirmationFailure::Missing)),
        }
    }

    /// Drop a pending token. Returns whether it existed.
    pub fn cancel(&self, token: &str) -> bool {
        self.lock().remove(token).is_some()
    }

    pub fn stats(&self) -> ConfirmationStats {
        let mut entries = self.lock();
        Self::sweep(&mut entries, Utc::now());

        let mut tokens: Vec<PendingToken> = entries
            .iter()
            .map(|(token, entry)| PendingToken {
                token: token.clone(),
                expires_at: entry.expires_at,
                batch: entry.batch,
                items: entry.items.clone(),
            })
            .collect();
        tokens.sort_by_key(|t| t.expires_at);

        ConfirmationStats {
            pending: tokens.len(),
            tokens,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModelType;

    fn details() -> DeletionDetails {
        DeletionDetails {
            version_id: 200,
            model_id: 100,
            model_type: ModelType::Checkpoint,
            model_name: "Dreamy".into(),
            version_name: "v1".into(),
            path: "/mirror/Checkpoint/100/200".into(),
            file_count: 1,
            image_count: 0,
            exists: true,
        }
    }

    fn reason(err: MirrorError) -> ConfirmationFailure {
        match err {
            MirrorError::DeleteConfirmation { reason } => reason,
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_token_is_single_use() {
        let store = ConfirmationStore::new(Duration::from_secs(60)).unwrap();
        let issued = store.issue(false, vec![details()]);
        assert_eq!(issued.items.len(), 1);

        assert_eq!(store.take(&issued.token, false).unwrap(), vec![details()]);
        assert_eq!(
            reason(store.take(&issued.token, false).unwrap_err()),
            ConfirmationFailure::Missing
        );
    }

    #[test]
    fn test_wrong_kind_leaves_token_pending() {
        let store = ConfirmationStore::new(Duration::from_secs(60)).unwrap();
        let issued = store.issue(true, vec![details()]);

        assert_eq!(
            reason(store.take(&issued.token, false).unwrap_err()),
            ConfirmationFailure::Invalid
        );
        assert_eq!(store.stats().pending, 1);
        assert!(store.take(&issued.token, true).is_ok());
    }

    #[test]
    fn test_expired_token_is_removed() {
        let store = ConfirmationStore::new(Duration::ZERO).unwrap();
        let issued = store.issue(false, vec![details()]);
        std::thread::sleep(Duration::from_millis(5));

        assert_eq!(
            reason(store.take(&issued.token, false).unwrap_err()),
            ConfirmationFailure::Expired
        );
        assert_eq!(
            reason(store.take(&issued.token, false).unwrap_err()),
            ConfirmationFailure::Missing
        );
    }

    #[test]
    fn test_stats_sweep_and_cancel() {
        let store = ConfirmationStore::new(Duration::from_secs(60)).unwrap();
        let keep = store.issue(false, vec![details()]);
        let dropped = store.issue(true, vec![details(), details()]);

        let stats = store.stats();
        assert_eq!(stats.pending, 2);

        assert!(store.cancel(&dropped.token));
        assert!(!store.cancel(&dropped.token));
        let stats = store.stats();
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.tokens[0].token, keep.token);
    }
}
