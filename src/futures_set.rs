use std::{future::Future, num::NonZeroUsize};

use tokio::{task::JoinSet, time::Instant};

/// Drives the given futures with at most `capacity` running at once and
/// collects every settled output, in completion order.
///
/// Futures still pending when `deadline` passes are aborted; the second
/// element of the returned pair counts them together with any futures that
/// were never spawned.
pub async fn join_bounded<Iterable, Output>(
    iterable: Iterable,
    capacity: NonZeroUsize,
    deadline: Option<Instant>,
) -> (Vec<Output>, usize)
where
    Iterable: IntoIterator,
    Iterable::Item: Future<Output = Output> + Send + 'static,
    Output: Send + 'static,
{
    let mut iter = iterable.into_iter().fuse();

    let mut set: JoinSet<Output> =
        (&mut iter).take(capacity.get()).collect();
    let mut outputs = Vec::with_capacity(set.len());
    let mut lost = 0;

    loop {
        let joined = if let Some(at) = deadline {
            match tokio::time::timeout_at(at, set.join_next()).await {
                Ok(joined) => joined,
                Err(_) => {
                    lost += set.len() + (&mut iter).count();
                    set.abort_all();
                    break;
                }
            }
        } else {
            set.join_next().await
        };

        match joined {
            Some(Ok(output)) => outputs.push(output),
            Some(Err(_)) => lost += 1,
            None => break,
        }

        if let Some(future) = iter.next() {
            set.spawn(future);
        }
    }

    (outputs, lost)
}

#[tokio::test]
async fn test_join_bounded_collects_every_output() {
    async fn delayed(delay: std::time::Duration, value: u8) -> u8 {
        tokio::time::sleep(delay).await;

        value
    }

    let (outputs, lost) = join_bounded(
        [
            delayed(std::time::Duration::from_millis(70), 1),
            delayed(std::time::Duration::from_millis(30), 2),
            delayed(std::time::Duration::from_millis(10), 4),
            delayed(std::time::Duration::from_millis(50), 8),
            delayed(std::time::Duration::from_millis(90), 16),
        ],
        const { NonZeroUsize::new(3).unwrap() },
        None,
    )
    .await;

    assert_eq!(lost, 0);
    assert_eq!(outputs.iter().fold(0, |acc, value| acc ^ value), 31);
}

#[tokio::test]
async fn test_join_bounded_deadline_aborts_unfinished() {
    async fn delayed(delay: std::time::Duration, value: u8) -> u8 {
        tokio::time::sleep(delay).await;

        value
    }

    let (outputs, lost) = join_bounded(
        [
            delayed(std::time::Duration::from_millis(5), 1),
            delayed(std::time::Duration::from_secs(5), 2),
            delayed(std::time::Duration::from_secs(5), 4),
        ],
        const { NonZeroUsize::new(3).unwrap() },
        Some(Instant::now() + std::time::Duration::from_millis(50)),
    )
    .await;

    assert_eq!(outputs, vec![1]);
    assert_eq!(lost, 2);
}
