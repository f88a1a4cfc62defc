use std::path::PathBuf;

use tokio::{fs, io::AsyncWriteExt, sync::Mutex};

use crate::{error::Error, model::Visit};

use super::durability;

/// Append-only sink for page-visit events, one JSON line per event.
#[derive(Debug)]
pub struct VisitLog {
    path: PathBuf,
    guard: Mutex<()>,
}

impl VisitLog {
    pub async fn open(path: PathBuf) -> Result<VisitLog, Error> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        Ok(VisitLog {
            path,
            guard: Mutex::new(()),
        })
    }

    pub async fn append(&self, visit: &Visit) -> Result<(), Error> {
        let mut line = serde_json::to_vec(visit)?;
        line.push(b'\n');

        let _guard = self.guard.lock().await;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| durability(&self.path, e))?;
        file.write_all(&line)
            .await
            .map_err(|e| durability(&self.path, e))?;
        file.flush()
            .await
            .map_err(|e| durability(&self.path, e))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::Utc;

    use super::*;

    fn scratch_path() -> PathBuf {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);
        let id = COUNTER.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir()
            .join(format!("relay-visits-{}-{}", std::process::id(), id))
            .join("pagevisits.jsonl")
    }

    #[tokio::test]
    async fn appends_one_line_per_event() {
        let path = scratch_path();
        let log = VisitLog::open(path.clone()).await.unwrap();

        for page in ["/a", "/b"] {
            log.append(&Visit {
                data: serde_json::json!({ "page": page }),
                recorded_at: Utc::now(),
                ip: None,
                user_agent: None,
            })
            .await
            .unwrap();
        }

        let contents = std::fs::read_to_string(path).unwrap();
        let visits: Vec<Visit> = contents
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(visits.len(), 2);
        assert_eq!(visits[1].data["page"], "/b");
    }
}
