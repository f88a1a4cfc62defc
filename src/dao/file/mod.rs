pub use self::{subscription::SubscriptionStore, visit::VisitLog};

mod subscription;
mod visit;

use std::path::Path;

use crate::{configuration::Config, error::Error};

#[derive(Debug)]
pub struct DataBase {
    pub subscription: SubscriptionStore,
    pub visit: VisitLog,
}

impl DataBase {
    pub async fn new(config: &Config) -> Result<DataBase, Error> {
        let subscription = SubscriptionStore::open(
            config.data_directory.join("subscriptions.json"),
        )
        .await?;
        let visit =
            VisitLog::open(config.data_directory.join("pagevisits.jsonl"))
                .await?;

        Ok(DataBase {
            subscription,
            visit,
        })
    }
}

pub(super) fn durability(path: &Path, error: std::io::Error) -> Error {
    Error::DurabilityError(format!("{}: {}", path.display(), error))
}
