//! Background delivery worker.
//!
//! Topic fanout hands each (subscription, message) pair to this worker as a
//! [`DeliveryJob`]; the publisher's call returns as soon as the job is
//! queued. Each job runs in its own task so one subscriber cannot stall
//! another, retrying transient failures with jittered exponential backoff
//! and moving the message to the subscription's dead-letter queue once the
//! retry budget is exhausted. Authorization failures are final and
//! dead-letter immediately, without retries.

use crate::error::FanoutError;
use crate::retry::RetryPolicy;
use crate::subscription::Subscription;
use bindery_core::environment::Clock;
use bindery_core::message::Message;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Buffered jobs between publishers and the worker.
const DELIVERY_BUFFER: usize = 1024;

/// One pending delivery of a message to a subscription.
#[derive(Debug)]
pub struct DeliveryJob {
    /// The subscription to deliver into.
    pub subscription: Arc<Subscription>,
    /// The message being delivered.
    pub message: Message,
}

/// Publisher-side handle for dispatching jobs to the worker.
#[derive(Debug, Clone)]
pub struct DeliveryHandle {
    tx: mpsc::Sender<DeliveryJob>,
}

impl DeliveryHandle {
    /// Hand a job to the worker without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`FanoutError::PublishFailed`] if the worker's buffer is full
    /// or the worker has stopped.
    pub fn dispatch(&self, job: DeliveryJob) -> Result<(), FanoutError> {
        match self.tx.try_send(job) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(job)) => Err(FanoutError::PublishFailed {
                capability: job.message.capability,
                reason: "delivery buffer full".to_string(),
            }),
            Err(TrySendError::Closed(job)) => Err(FanoutError::PublishFailed {
                capability: job.message.capability,
                reason: "delivery worker stopped".to_string(),
            }),
        }
    }
}

/// The background worker that drains delivery jobs.
#[derive(Debug)]
pub struct DeliveryWorker;

impl DeliveryWorker {
    /// Spawn the worker and return the dispatch handle.
    ///
    /// The worker exits once every handle is dropped and the buffer drains.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    #[must_use]
    pub fn spawn(policy: RetryPolicy, clock: Arc<dyn Clock>) -> DeliveryHandle {
        let (tx, mut rx) = mpsc::channel::<DeliveryJob>(DELIVERY_BUFFER);

        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                // One task per job: a retrying delivery must not delay
                // deliveries to other subscriptions.
                tokio::spawn(deliver_with_retries(
                    job,
                    policy.clone(),
                    Arc::clone(&clock),
                ));
            }
            tracing::debug!("delivery worker exiting");
        });

        DeliveryHandle { tx }
    }
}

async fn deliver_with_retries(job: DeliveryJob, policy: RetryPolicy, clock: Arc<dyn Clock>) {
    let DeliveryJob {
        subscription,
        message,
    } = job;
    let queue = subscription.queue().name().to_string();
    let mut attempt: u32 = 1;

    loop {
        match subscription.deliver(message.clone()).await {
            Ok(()) => {
                if attempt > 1 {
                    tracing::info!(
                        queue = %queue,
                        message_id = %message.id,
                        attempt,
                        "delivery succeeded after retry"
                    );
                }
                return;
            }
            Err(err) if err.is_transient() && attempt < policy.max_attempts => {
                let delay = policy.jittered_delay_for_attempt(attempt - 1);
                tracing::warn!(
                    queue = %queue,
                    message_id = %message.id,
                    attempt,
                    delay_ms = delay.as_millis(),
                    error = %err,
                    "delivery failed, retrying"
                );
                metrics::counter!("fanout.delivery.retried", "queue" => queue.clone())
                    .increment(1);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                tracing::error!(
                    queue = %queue,
                    message_id = %message.id,
                    attempt,
                    error = %err,
                    "delivery exhausted, dead-lettering"
                );
                subscription
                    .dead_letter()
                    .add_entry(
                        message,
                        &err.to_string(),
                        Some(format!("{err:?}")),
                        attempt,
                        clock.now(),
                    )
                    .await;
                return;
            }
        }
    }
}
