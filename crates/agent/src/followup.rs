//! Deferred work: the buyer check-in sent a while after an order is placed.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use marketbot_channel::blocks::follow_up_message;
use marketbot_channel::outbound::{notify_best_effort, Channel};
use marketbot_core::{OrderId, OrderStatus, UserId};
use marketbot_db::MarketplaceRepository;
use tracing::{debug, info, warn};

pub type DeferredTask = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Runs a task once after `delay`. Implementations never surface the task's failures.
pub trait Scheduler: Send + Sync {
    fn after(&self, delay: Duration, task: DeferredTask);
}

/// One spawned tokio task per deferred job. Jobs do not survive a restart.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn after(&self, delay: Duration, task: DeferredTask) {
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        });
    }
}

/// Holds tasks until `run_all` is called.
#[derive(Default)]
pub struct ManualScheduler {
    pending: Mutex<Vec<(Duration, DeferredTask)>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending_delays(&self) -> Vec<Duration> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(delay, _)| *delay)
            .collect()
    }

    /// Runs every queued task in scheduling order and returns how many ran.
    pub async fn run_all(&self) -> usize {
        let tasks: Vec<_> =
            std::mem::take(&mut *self.pending.lock().unwrap_or_else(PoisonError::into_inner));
        let count = tasks.len();
        for (_, task) in tasks {
            task.await;
        }
        count
    }
}

impl Scheduler for ManualScheduler {
    fn after(&self, delay: Duration, task: DeferredTask) {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner).push((delay, task));
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FollowUpOutcome {
    Prompted,
    /// Buyer answered before the check-in fired.
    AlreadyResolved(OrderStatus),
    OrderMissing,
    LookupFailed,
    DeliveryFailed,
}

pub struct OrderFollowUp {
    repository: Arc<dyn MarketplaceRepository>,
    channel: Arc<dyn Channel>,
}

impl OrderFollowUp {
    pub fn new(repository: Arc<dyn MarketplaceRepository>, channel: Arc<dyn Channel>) -> Self {
        Self { repository, channel }
    }

    /// Asks the buyer whether a still-pending order arrived.
    pub async fn run(
        &self,
        order_id: OrderId,
        buyer: UserId,
        correlation_id: &str,
    ) -> FollowUpOutcome {
        let order = match self.repository.find_order(order_id).await {
            Ok(Some(order)) => order,
            Ok(None) => {
                warn!(
                    event_name = "followup.order.missing",
                    correlation_id,
                    user_id = buyer.0,
                    order_id = order_id.0,
                    "order disappeared before follow-up"
                );
                return FollowUpOutcome::OrderMissing;
            }
            Err(error) => {
                warn!(
                    event_name = "followup.order.lookup_failed",
                    correlation_id,
                    user_id = buyer.0,
                    order_id = order_id.0,
                    error = %error,
                    "could not load order for follow-up"
                );
                return FollowUpOutcome::LookupFailed;
            }
        };

        if order.status != OrderStatus::Pending {
            debug!(
                event_name = "followup.order.already_resolved",
                correlation_id,
                user_id = buyer.0,
                order_id = order_id.0,
                status = order.status.as_str(),
                "skipping follow-up"
            );
            return FollowUpOutcome::AlreadyResolved(order.status);
        }

        let message = follow_up_message(order_id);
        let delivered =
            notify_best_effort(self.channel.as_ref(), buyer, &message, correlation_id).await;
        if !delivered {
            return FollowUpOutcome::DeliveryFailed;
        }

        info!(
            event_name = "followup.order.prompted",
            correlation_id,
            user_id = buyer.0,
            order_id = order_id.0,
            "asked buyer about order"
        );
        FollowUpOutcome::Prompted
    }

    pub fn task(
        self: Arc<Self>,
        order_id: OrderId,
        buyer: UserId,
        correlation_id: String,
    ) -> DeferredTask {
        Box::pin(async move {
            self.run(order_id, buyer, &correlation_id).await;
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::Utc;
    use marketbot_channel::outbound::RecordingChannel;
    use marketbot_core::keywords::extract_keywords;
    use marketbot_core::{NewOrder, NewVendor, OrderId, OrderStatus, UserId};
    use marketbot_db::{InMemoryMarketplaceRepository, MarketplaceRepository};

    use super::{FollowUpOutcome, ManualScheduler, OrderFollowUp, Scheduler, TokioScheduler};

    type TestResult<T> = Result<T, String>;

    async fn seeded_order(repository: &InMemoryMarketplaceRepository) -> TestResult<OrderId> {
        let vendor_id = repository
            .insert_vendor(NewVendor {
                owner: UserId(1),
                business_name: "Mama T".to_owned(),
                services: "jollof rice".to_owned(),
                keywords: extract_keywords("jollof rice").join(),
                contact: "08012345678".to_owned(),
                bot_handle: None,
                description: "Hot meals".to_owned(),
                price_range: "₦500".to_owned(),
            })
            .await
            .map_err(|error| error.to_string())?;
        repository
            .insert_order(NewOrder {
                vendor_id,
                buyer_id: UserId(2),
                details: "2 plates".to_owned(),
                deadline: "6pm".to_owned(),
            })
            .await
            .map_err(|error| error.to_string())
    }

    #[tokio::test]
    async fn pending_order_prompts_buyer() -> TestResult<()> {
        let repository = Arc::new(InMemoryMarketplaceRepository::new());
        let channel = Arc::new(RecordingChannel::new());
        let order_id = seeded_order(&repository).await?;
        let followup = OrderFollowUp::new(repository, channel.clone());

        assert_eq!(followup.run(order_id, UserId(2), "corr-1").await, FollowUpOutcome::Prompted);

        let sent = channel.sent_to(UserId(2)).await;
        assert_eq!(sent.len(), 1);
        assert!(sent[0].has_button("complete"));
        assert!(sent[0].has_button("incomplete"));
        Ok(())
    }

    #[tokio::test]
    async fn resolved_order_sends_nothing() -> TestResult<()> {
        let repository = Arc::new(InMemoryMarketplaceRepository::new());
        let channel = Arc::new(RecordingChannel::new());
        let order_id = seeded_order(&repository).await?;
        repository
            .update_order_status(order_id, OrderStatus::Completed, Some(Utc::now()))
            .await
            .map_err(|error| error.to_string())?;
        let followup = OrderFollowUp::new(repository, channel.clone());

        assert_eq!(
            followup.run(order_id, UserId(2), "corr-2").await,
            FollowUpOutcome::AlreadyResolved(OrderStatus::Completed)
        );
        assert!(channel.sent().await.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn missing_order_and_failed_delivery_are_swallowed() -> TestResult<()> {
        let repository = Arc::new(InMemoryMarketplaceRepository::new());
        let followup = OrderFollowUp::new(repository.clone(), Arc::new(RecordingChannel::new()));
        let missing = followup.run(OrderId(99), UserId(2), "corr-3").await;
        assert_eq!(missing, FollowUpOutcome::OrderMissing);

        let order_id = seeded_order(&repository).await?;
        let failing = OrderFollowUp::new(repository, Arc::new(RecordingChannel::failing()));
        let undelivered = failing.run(order_id, UserId(2), "corr-4").await;
        assert_eq!(undelivered, FollowUpOutcome::DeliveryFailed);
        Ok(())
    }

    #[tokio::test]
    async fn manual_scheduler_holds_tasks_until_run() -> TestResult<()> {
        let repository = Arc::new(InMemoryMarketplaceRepository::new());
        let channel = Arc::new(RecordingChannel::new());
        let order_id = seeded_order(&repository).await?;
        let followup = Arc::new(OrderFollowUp::new(repository, channel.clone()));
        let scheduler = ManualScheduler::new();

        let task = followup.task(order_id, UserId(2), "corr-5".into());
        scheduler.after(Duration::from_secs(60), task);
        assert_eq!(scheduler.pending_delays(), vec![Duration::from_secs(60)]);
        assert!(channel.sent().await.is_empty());

        assert_eq!(scheduler.run_all().await, 1);
        assert_eq!(channel.sent_to(UserId(2)).await.len(), 1);
        assert!(scheduler.pending_delays().is_empty());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_scheduler_waits_for_the_delay() -> TestResult<()> {
        let repository = Arc::new(InMemoryMarketplaceRepository::new());
        let channel = Arc::new(RecordingChannel::new());
        let order_id = seeded_order(&repository).await?;
        let followup = Arc::new(OrderFollowUp::new(repository, channel.clone()));

        let task = followup.task(order_id, UserId(2), "corr-6".into());
        TokioScheduler.after(Duration::from_secs(3600), task);

        tokio::time::sleep(Duration::from_secs(1800)).await;
        assert!(channel.sent().await.is_empty());

        tokio::time::sleep(Duration::from_secs(1801)).await;
        assert_eq!(channel.sent_to(UserId(2)).await.len(), 1);
        Ok(())
    }
}
