use std::{collections::BTreeMap, io::ErrorKind, path::PathBuf};

use tokio::{fs, sync::Mutex};

use crate::{error::Error, model::Subscription};

use super::durability;

/// Durable registry of push subscriptions keyed by endpoint.
///
/// The full set lives in memory and is snapshotted to disk at the end of
/// every mutating operation, while the same lock is still held, so
/// concurrent mutations cannot interleave inside a snapshot. The snapshot
/// goes to a sibling temp file first and is renamed over the target, so a
/// crash mid-write leaves the previous set intact.
#[derive(Debug)]
pub struct SubscriptionStore {
    path: PathBuf,
    inner: Mutex<BTreeMap<String, Subscription>>,
}

impl SubscriptionStore {
    pub async fn open(path: PathBuf) -> Result<SubscriptionStore, Error> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let records = match fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<Vec<Subscription>>(&bytes)?,
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        let inner = records
            .into_iter()
            .map(|record| (record.endpoint.to_owned(), record))
            .collect();

        Ok(SubscriptionStore {
            path,
            inner: Mutex::new(inner),
        })
    }

    /// Inserts or replaces by endpoint. `registered_at` of an existing
    /// record survives re-registration.
    ///
    /// A `DurabilityError` means the mutation is applied in memory but not
    /// yet on disk.
    pub async fn upsert(&self, mut record: Subscription) -> Result<(), Error> {
        let mut inner = self.inner.lock().await;

        if let Some(existing) = inner.get(&record.endpoint) {
            record.registered_at = existing.registered_at;
        }
        inner.insert(record.endpoint.to_owned(), record);

        self.persist_locked(&inner).await
    }

    /// Cloned snapshot of the current set.
    pub async fn list(&self) -> Vec<Subscription> {
        self.inner.lock().await.values().cloned().collect()
    }

    pub async fn remove(&self, endpoint: &str) -> Result<bool, Error> {
        let mut inner = self.inner.lock().await;

        let existed = inner.remove(endpoint).is_some();
        if existed {
            self.persist_locked(&inner).await?;
        }

        Ok(existed)
    }

    /// Applies all removals and persists the survivors once.
    pub async fn remove_batch(
        &self,
        endpoints: &[String],
    ) -> Result<usize, Error> {
        let mut inner = self.inner.lock().await;

        let mut removed = 0;
        for endpoint in endpoints {
            if inner.remove(endpoint).is_some() {
                removed += 1;
            }
        }
        if removed > 0 {
            self.persist_locked(&inner).await?;
        }

        Ok(removed)
    }

    async fn persist_locked(
        &self,
        inner: &BTreeMap<String, Subscription>,
    ) -> Result<(), Error> {
        let records: Vec<&Subscription> = inner.values().collect();
        let bytes = serde_json::to_vec_pretty(&records)?;

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, &bytes)
            .await
            .map_err(|e| durability(&tmp, e))?;
        fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| durability(&self.path, e))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use chrono::Utc;
    use tokio::task::JoinSet;

    use super::*;

    fn scratch_path() -> PathBuf {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);
        let id = COUNTER.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir()
            .join(format!("relay-store-{}-{}", std::process::id(), id))
            .join("subscriptions.json")
    }

    fn sample(endpoint: &str, p256dh: &str) -> Subscription {
        Subscription {
            endpoint: endpoint.to_owned(),
            p256dh: p256dh.to_owned(),
            auth: String::from("auth-secret"),
            page_url: None,
            registered_at: Utc::now(),
            expiration: None,
            ip: None,
            user_agent: None,
        }
    }

    #[tokio::test]
    async fn upsert_replaces_by_endpoint() {
        let store = SubscriptionStore::open(scratch_path()).await.unwrap();

        store
            .upsert(sample("https://push.example/a", "key-one"))
            .await
            .unwrap();
        let registered_at = store.list().await[0].registered_at;

        store
            .upsert(sample("https://push.example/a", "key-two"))
            .await
            .unwrap();

        let records = store.list().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].p256dh, "key-two");
        assert_eq!(records[0].registered_at, registered_at);
    }

    #[tokio::test]
    async fn records_survive_reopen() {
        let path = scratch_path();

        let store = SubscriptionStore::open(path.clone()).await.unwrap();
        store
            .upsert(sample("https://push.example/a", "key"))
            .await
            .unwrap();
        store
            .upsert(sample("https://push.example/b", "key"))
            .await
            .unwrap();
        drop(store);

        let reopened = SubscriptionStore::open(path).await.unwrap();
        assert_eq!(reopened.list().await.len(), 2);
    }

    #[tokio::test]
    async fn remove_batch_counts_only_existing_records() {
        let store = SubscriptionStore::open(scratch_path()).await.unwrap();
        store
            .upsert(sample("https://push.example/a", "key"))
            .await
            .unwrap();
        store
            .upsert(sample("https://push.example/b", "key"))
            .await
            .unwrap();

        let removed = store
            .remove_batch(&[
                String::from("https://push.example/a"),
                String::from("https://push.example/missing"),
            ])
            .await
            .unwrap();

        assert_eq!(removed, 1);
        let records = store.list().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].endpoint, "https://push.example/b");
    }

    #[tokio::test]
    async fn remove_reports_whether_record_existed() {
        let store = SubscriptionStore::open(scratch_path()).await.unwrap();
        store
            .upsert(sample("https://push.example/a", "key"))
            .await
            .unwrap();

        assert!(store.remove("https://push.example/a").await.unwrap());
        assert!(!store.remove("https://push.example/a").await.unwrap());
    }

    #[tokio::test]
    async fn concurrent_registration_loses_no_writes() {
        let store =
            Arc::new(SubscriptionStore::open(scratch_path()).await.unwrap());

        let mut set = JoinSet::new();
        for i in 0..100 {
            let store = store.clone();
            set.spawn(async move {
                store
                    .upsert(sample(
                        &format!("https://push.example/{}", i),
                        "key",
                    ))
                    .await
            });
        }
        while let Some(result) = set.join_next().await {
            result.unwrap().unwrap();
        }

        assert_eq!(store.list().await.len(), 100);
    }
}
