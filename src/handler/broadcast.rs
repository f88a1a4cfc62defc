//! The delivery engine: fans one notification out to every stored
//! subscription with bounded concurrency, retries transient failures with
//! doubling backoff, prunes endpoints the upstream reports gone, and
//! aggregates the per-endpoint outcomes into a single report.

use std::{future::Future, num::NonZeroUsize, sync::Arc, time::Duration};

use tokio::time::{sleep, Instant};
use tracing::{info, warn};

use crate::{
    configuration::{AppState, Config, State},
    dao::SubscriptionStore,
    error::Error,
    futures_set::join_bounded,
    model::Subscription,
    types::{BroadcastReport, DeliveryOutcome, Notification, PushHeader},
};

#[derive(Debug, Clone, Copy)]
pub struct DeliveryOptions {
    pub fanout_limit: NonZeroUsize,
    pub attempts: u32,
    pub backoff: Duration,
    pub deadline: Option<Duration>,
}

impl From<&Config> for DeliveryOptions {
    fn from(config: &Config) -> DeliveryOptions {
        DeliveryOptions {
            fanout_limit: config.fanout_limit,
            attempts: config.delivery_attempts,
            backoff: Duration::from_millis(config.delivery_backoff_ms),
            deadline: Some(config.broadcast_deadline),
        }
    }
}

pub async fn broadcast(
    app_state: AppState<State>,
    notification: Notification,
) -> Result<BroadcastReport, Error> {
    let config = &app_state.config;

    let payload =
        notification.payload(&config.default_notification_url);
    let bytes: Arc<[u8]> = serde_json::to_vec(&payload)?.into();
    let header = PushHeader {
        ttl: config.push_ttl,
        urgency: config.push_urgency.to_owned(),
    };
    let push = app_state.push.clone();

    let attempt = move |subscription: Subscription| {
        let push = push.clone();
        let header = header.clone();
        let bytes = bytes.clone();
        async move { push.deliver(&subscription, &header, &bytes).await }
    };

    broadcast_with(
        &app_state.database.subscription,
        &notification,
        DeliveryOptions::from(config),
        attempt,
    )
    .await
}

/// Engine core, parameterized over the delivery attempt so tests run it
/// without a network.
///
/// Per-endpoint failures never fail the call; only a store read/persist
/// problem does.
pub async fn broadcast_with<F, Fut>(
    store: &SubscriptionStore,
    notification: &Notification,
    options: DeliveryOptions,
    attempt: F,
) -> Result<BroadcastReport, Error>
where
    F: Fn(Subscription) -> Fut + Clone + Send + 'static,
    Fut: Future<Output = DeliveryOutcome> + Send + 'static,
{
    notification.validate()?;

    let snapshot = store.list().await;
    if snapshot.is_empty() {
        return Ok(BroadcastReport::default());
    }
    let total = snapshot.len();

    let (report, prune) = fan_out(snapshot, options, attempt).await;

    if !prune.is_empty() {
        let removed = store.remove_batch(&prune).await?;
        info!("pruned {} of {} subscriptions", removed, total);
    }

    info!(
        "broadcast settled: delivered {}, pruned {}, failed {}",
        report.delivered, report.pruned, report.failed
    );

    Ok(report)
}

async fn fan_out<F, Fut>(
    subscriptions: Vec<Subscription>,
    options: DeliveryOptions,
    attempt: F,
) -> (BroadcastReport, Vec<String>)
where
    F: Fn(Subscription) -> Fut + Clone + Send + 'static,
    Fut: Future<Output = DeliveryOutcome> + Send + 'static,
{
    let deadline = options.deadline.map(|limit| Instant::now() + limit);

    let tasks = subscriptions.into_iter().map(move |subscription| {
        deliver_with_retry(subscription, options, attempt.clone())
    });

    let (settled, lost) =
        join_bounded(tasks, options.fanout_limit, deadline).await;
    if lost > 0 {
        warn!("{} deliveries did not settle before the deadline", lost);
    }

    let mut report = BroadcastReport {
        failed: lost as u64,
        ..BroadcastReport::default()
    };
    let mut prune = Vec::new();

    for (endpoint, outcome) in settled {
        match outcome {
            DeliveryOutcome::Delivered => report.delivered += 1,
            DeliveryOutcome::PermanentFailure(reason) => {
                warn!("{}: {}", endpoint, reason);
                report.pruned += 1;
                prune.push(endpoint);
            }
            DeliveryOutcome::TransientFailure(reason) => {
                warn!("{}: {}", endpoint, reason);
                report.failed += 1;
            }
        }
    }

    (report, prune)
}

async fn deliver_with_retry<F, Fut>(
    subscription: Subscription,
    options: DeliveryOptions,
    attempt: F,
) -> (String, DeliveryOutcome)
where
    F: Fn(Subscription) -> Fut,
    Fut: Future<Output = DeliveryOutcome>,
{
    let mut backoff = options.backoff;
    let mut left = options.attempts.max(1);

    loop {
        let outcome = attempt(subscription.clone()).await;
        left -= 1;

        match outcome {
            DeliveryOutcome::TransientFailure(_) if left > 0 => {
                sleep(backoff).await;
                backoff *= 2;
            }
            outcome => return (subscription.endpoint, outcome),
        }
    }
}
