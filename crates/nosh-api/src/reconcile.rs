//! Payment reconciliation.
//!
//! Turns verified payment processor events into marketplace state: a
//! succeeded checkout fans its snapshot out into one order per seller,
//! refunds mark those orders, subscriptions and balance top-ups update the
//! user record. Every branch is idempotent under webhook redelivery.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use nosh_core::order::{Order, PendingOrder, partition_by_seller};
use nosh_core::payment::{PaymentEvent, PaymentPurpose};
use nosh_core::moderation::NotifyPriority;
use nosh_core::{Error, Result};
use nosh_db::{DishCatalog, NotificationRepo, OrderStore, SnapshotStore, UserRepo};

/// What reconciling one event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    OrdersCreated { count: usize },
    /// Orders for this payment reference already exist; redelivery.
    AlreadyReconciled,
    /// Succeeded payment with no checkout snapshot on record.
    NoSnapshot,
    BalanceCredited,
    RefundRecorded { orders: u64 },
    /// Event handled without creating financial records.
    Acknowledged,
}

impl ReconcileOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileOutcome::OrdersCreated { .. } => "orders_created",
            ReconcileOutcome::AlreadyReconciled => "already_reconciled",
            ReconcileOutcome::NoSnapshot => "no_snapshot",
            ReconcileOutcome::BalanceCredited => "balance_credited",
            ReconcileOutcome::RefundRecorded { .. } => "refund_recorded",
            ReconcileOutcome::Acknowledged => "acknowledged",
        }
    }
}

/// Applies payment events to the order and user stores.
pub struct Reconciler {
    snapshots: Arc<dyn SnapshotStore>,
    orders: Arc<dyn OrderStore>,
    catalog: Arc<dyn DishCatalog>,
    users: Arc<dyn UserRepo>,
    notifications: Arc<dyn NotificationRepo>,
}

impl Reconciler {
    pub fn new(
        snapshots: Arc<dyn SnapshotStore>,
        orders: Arc<dyn OrderStore>,
        catalog: Arc<dyn DishCatalog>,
        users: Arc<dyn UserRepo>,
        notifications: Arc<dyn NotificationRepo>,
    ) -> Self {
        Self {
            snapshots,
            orders,
            catalog,
            users,
            notifications,
        }
    }

    /// Reconcile one verified event. Every path either writes the intended
    /// records or logs an explicit no-op reason; an error here surfaces as a
    /// 5xx so the processor redelivers.
    pub async fn reconcile(&self, event: PaymentEvent) -> Result<ReconcileOutcome> {
        match event {
            PaymentEvent::PaymentSucceeded {
                payment_reference,
                user_id,
                amount,
                currency,
                purpose: PaymentPurpose::BalanceTopUp,
            } => {
                let user_id = user_id.ok_or_else(|| {
                    Error::Validation(format!(
                        "top-up {payment_reference} carries no user id"
                    ))
                })?;
                self.users
                    .credit_balance(&user_id, amount, &currency, &payment_reference)
                    .await?;
                info!(%payment_reference, %user_id, amount, "balance top-up credited");
                Ok(ReconcileOutcome::BalanceCredited)
            }
            PaymentEvent::PaymentSucceeded {
                payment_reference, ..
            } => self.reconcile_checkout(&payment_reference).await,
            PaymentEvent::PaymentFailed {
                payment_reference,
                user_id,
            } => {
                // The snapshot stays: the processor may retry the same
                // payment intent and succeed later.
                warn!(%payment_reference, ?user_id, "payment failed");
                self.notifications
                    .notify_admin(
                        NotifyPriority::Normal,
                        "Payment failed",
                        &format!("Payment {payment_reference} failed"),
                    )
                    .await?;
                Ok(ReconcileOutcome::Acknowledged)
            }
            PaymentEvent::ChargeRefunded { payment_reference } => {
                let touched = self.orders.mark_refunded(&payment_reference).await?;
                info!(%payment_reference, orders = touched, "refund recorded");
                Ok(ReconcileOutcome::RefundRecorded { orders: touched })
            }
            PaymentEvent::SubscriptionCreated { user_id } => {
                self.users.set_subscription(&user_id, true).await?;
                info!(%user_id, "subscription activated");
                Ok(ReconcileOutcome::Acknowledged)
            }
            PaymentEvent::SubscriptionDeleted { user_id } => {
                self.users.set_subscription(&user_id, false).await?;
                info!(%user_id, "subscription deactivated");
                Ok(ReconcileOutcome::Acknowledged)
            }
            PaymentEvent::DisputeCreated { payment_reference } => {
                self.notifications
                    .notify_admin(
                        NotifyPriority::Urgent,
                        "Payment dispute opened",
                        &format!("Dispute opened against payment {payment_reference}"),
                    )
                    .await?;
                Ok(ReconcileOutcome::Acknowledged)
            }
            PaymentEvent::Ignored { kind } => {
                debug!(%kind, "ignoring payment event");
                Ok(ReconcileOutcome::Acknowledged)
            }
        }
    }

    /// Fan a succeeded checkout out into one order per seller.
    async fn reconcile_checkout(&self, payment_reference: &str) -> Result<ReconcileOutcome> {
        // Idempotent short-circuit: at most one order set per payment
        // reference, however many times the webhook is delivered.
        if self.orders.exists_for_payment(payment_reference).await? {
            info!(%payment_reference, "orders already exist, skipping");
            return Ok(ReconcileOutcome::AlreadyReconciled);
        }

        let Some(snapshot) = self.snapshots.get(payment_reference).await? else {
            warn!(%payment_reference, "succeeded payment has no checkout snapshot");
            return Ok(ReconcileOutcome::NoSnapshot);
        };

        let resolved = self.resolve_sellers(&snapshot).await?;
        if resolved.is_empty() {
            // Nothing to bill against; leave the snapshot for manual repair.
            warn!(%payment_reference, "no cart line resolved to a seller");
            self.notifications
                .notify_admin(
                    NotifyPriority::High,
                    "Checkout could not be reconciled",
                    &format!(
                        "Payment {payment_reference} succeeded but no cart line maps to a seller"
                    ),
                )
                .await?;
            return Ok(ReconcileOutcome::Acknowledged);
        }

        let points = snapshot.nosh_points_applied.unwrap_or(0);
        let groups = partition_by_seller(&resolved, points);
        let now = Utc::now();
        let orders: Vec<Order> = groups
            .into_iter()
            .enumerate()
            .map(|(index, group)| Order {
                id: Uuid::now_v7(),
                customer_id: snapshot.user_id.clone(),
                chef_id: group.chef_id,
                items: group.items,
                total_amount: group.subtotal,
                payment_reference: payment_reference.to_string(),
                payment_method: "card".into(),
                nosh_points_applied: group.points_share,
                // A debt is settled once, against the first order.
                game_debt_id: if index == 0 {
                    snapshot.game_debt_id.clone()
                } else {
                    None
                },
                created_at: now,
            })
            .collect();
        let count = orders.len();
        // One atomic insert for the whole set: a failure here leaves no
        // orders behind, so the redelivered webhook reconciles from scratch
        // instead of short-circuiting past a half-written fan-out.
        self.orders.create_set(&orders).await?;
        info!(%payment_reference, orders = count, "checkout reconciled");

        self.snapshots.remove(payment_reference).await?;
        // Best-effort cleanup; the orders already exist.
        if let Err(e) = self.users.clear_cart(&snapshot.user_id).await {
            warn!(user_id = %snapshot.user_id, error = %e, "cart clear failed");
        }

        Ok(ReconcileOutcome::OrdersCreated { count })
    }

    /// Pair each cart line with its owning seller. Lines whose dish is gone
    /// from the catalog are logged and skipped.
    async fn resolve_sellers(
        &self,
        snapshot: &PendingOrder,
    ) -> Result<Vec<(String, nosh_core::order::CartLine)>> {
        let mut resolved = Vec::with_capacity(snapshot.items.len());
        for line in &snapshot.items {
            match self.catalog.chef_for_dish(&line.dish_id).await? {
                Some(chef_id) => resolved.push((chef_id, line.clone())),
                None => warn!(
                    payment_reference = %snapshot.payment_reference,
                    dish_id = %line.dish_id,
                    "dish has no seller, skipping line"
                ),
            }
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nosh_core::order::CartLine;
    use nosh_db::memory::{
        MemoryDishCatalog, MemoryNotificationRepo, MemoryOrderStore, MemorySnapshotStore,
        MemoryUserRepo,
    };

    struct Fixture {
        snapshots: Arc<MemorySnapshotStore>,
        orders: Arc<MemoryOrderStore>,
        catalog: Arc<MemoryDishCatalog>,
        users: Arc<MemoryUserRepo>,
        notifications: Arc<MemoryNotificationRepo>,
        reconciler: Reconciler,
    }

    fn fixture() -> Fixture {
        let snapshots = Arc::new(MemorySnapshotStore::new());
        let orders = Arc::new(MemoryOrderStore::new());
        let catalog = Arc::new(MemoryDishCatalog::new());
        let users = Arc::new(MemoryUserRepo::new());
        let notifications = Arc::new(MemoryNotificationRepo::new());
        let reconciler = Reconciler::new(
            snapshots.clone(),
            orders.clone(),
            catalog.clone(),
            users.clone(),
            notifications.clone(),
        );
        Fixture {
            snapshots,
            orders,
            catalog,
            users,
            notifications,
            reconciler,
        }
    }

    fn line(dish: &str, price: i64, quantity: u32) -> CartLine {
        CartLine {
            dish_id: dish.into(),
            name: dish.into(),
            price,
            quantity,
        }
    }

    fn snapshot(reference: &str, items: Vec<CartLine>, points: Option<i64>) -> PendingOrder {
        PendingOrder {
            payment_reference: reference.into(),
            user_id: "u1".into(),
            items,
            delivery_address: Some("1 High Street".into()),
            special_instructions: None,
            nosh_points_applied: points,
            game_debt_id: None,
            created_at: Utc::now(),
        }
    }

    fn succeeded(reference: &str) -> PaymentEvent {
        PaymentEvent::PaymentSucceeded {
            payment_reference: reference.into(),
            user_id: Some("u1".into()),
            amount: 3000,
            currency: "gbp".into(),
            purpose: PaymentPurpose::Checkout,
        }
    }

    async fn seed_two_seller_cart(fx: &Fixture, reference: &str, points: Option<i64>) {
        fx.catalog.assign("d1", "chef-a");
        fx.catalog.assign("d2", "chef-b");
        fx.snapshots
            .save(&snapshot(
                reference,
                vec![line("d1", 2000, 1), line("d2", 1000, 1)],
                points,
            ))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn checkout_fans_out_one_order_per_seller() {
        let fx = fixture();
        seed_two_seller_cart(&fx, "pi_1", None).await;

        let outcome = fx.reconciler.reconcile(succeeded("pi_1")).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::OrdersCreated { count: 2 });

        let orders = fx.orders.list_for_payment("pi_1").await.unwrap();
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].chef_id, "chef-a");
        assert_eq!(orders[0].total_amount, 2000);
        assert_eq!(orders[1].chef_id, "chef-b");
        assert_eq!(orders[1].total_amount, 1000);
        assert!(orders.iter().all(|o| o.payment_reference == "pi_1"));
        assert!(orders.iter().all(|o| o.customer_id == "u1"));
    }

    #[tokio::test]
    async fn redelivery_creates_no_second_order_set() {
        let fx = fixture();
        seed_two_seller_cart(&fx, "pi_1", None).await;

        fx.reconciler.reconcile(succeeded("pi_1")).await.unwrap();
        let outcome = fx.reconciler.reconcile(succeeded("pi_1")).await.unwrap();

        assert_eq!(outcome, ReconcileOutcome::AlreadyReconciled);
        assert_eq!(fx.orders.list_for_payment("pi_1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn failed_fanout_leaves_nothing_and_redelivery_completes_it() {
        let fx = fixture();
        seed_two_seller_cart(&fx, "pi_1", None).await;
        fx.orders.fail_next_create_set();

        // The first delivery dies mid-reconcile; no partial order set may
        // survive it, or the redelivery would skip the missing sellers.
        assert!(fx.reconciler.reconcile(succeeded("pi_1")).await.is_err());
        assert!(fx.orders.list_for_payment("pi_1").await.unwrap().is_empty());
        assert!(fx.snapshots.get("pi_1").await.unwrap().is_some());

        let outcome = fx.reconciler.reconcile(succeeded("pi_1")).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::OrdersCreated { count: 2 });
        let orders = fx.orders.list_for_payment("pi_1").await.unwrap();
        assert_eq!(orders.len(), 2);
    }

    #[tokio::test]
    async fn points_split_proportionally_across_orders() {
        let fx = fixture();
        seed_two_seller_cart(&fx, "pi_1", Some(10)).await;

        fx.reconciler.reconcile(succeeded("pi_1")).await.unwrap();

        let orders = fx.orders.list_for_payment("pi_1").await.unwrap();
        assert_eq!(orders[0].nosh_points_applied, 6);
        assert_eq!(orders[1].nosh_points_applied, 3);
    }

    #[tokio::test]
    async fn snapshot_is_consumed_and_cart_cleared() {
        let fx = fixture();
        seed_two_seller_cart(&fx, "pi_1", None).await;

        fx.reconciler.reconcile(succeeded("pi_1")).await.unwrap();

        assert!(fx.snapshots.get("pi_1").await.unwrap().is_none());
        assert_eq!(fx.users.cleared_carts(), vec!["u1".to_string()]);
    }

    #[tokio::test]
    async fn cart_clear_failure_is_not_fatal() {
        let fx = fixture();
        seed_two_seller_cart(&fx, "pi_1", None).await;
        fx.users.fail_cart_clears();

        let outcome = fx.reconciler.reconcile(succeeded("pi_1")).await.unwrap();

        assert_eq!(outcome, ReconcileOutcome::OrdersCreated { count: 2 });
        assert!(fx.snapshots.get("pi_1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn missing_snapshot_creates_nothing() {
        let fx = fixture();
        let outcome = fx.reconciler.reconcile(succeeded("pi_404")).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::NoSnapshot);
        assert!(fx.orders.list_for_payment("pi_404").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unresolvable_lines_are_skipped() {
        let fx = fixture();
        fx.catalog.assign("d1", "chef-a");
        // d2 never assigned: its dish was deleted after checkout.
        fx.snapshots
            .save(&snapshot(
                "pi_1",
                vec![line("d1", 2000, 1), line("d2", 1000, 1)],
                None,
            ))
            .await
            .unwrap();

        let outcome = fx.reconciler.reconcile(succeeded("pi_1")).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::OrdersCreated { count: 1 });
        let orders = fx.orders.list_for_payment("pi_1").await.unwrap();
        assert_eq!(orders[0].chef_id, "chef-a");
    }

    #[tokio::test]
    async fn fully_unresolvable_cart_keeps_snapshot_and_alerts() {
        let fx = fixture();
        fx.snapshots
            .save(&snapshot("pi_1", vec![line("d1", 2000, 1)], None))
            .await
            .unwrap();

        let outcome = fx.reconciler.reconcile(succeeded("pi_1")).await.unwrap();

        assert_eq!(outcome, ReconcileOutcome::Acknowledged);
        assert!(fx.orders.list_for_payment("pi_1").await.unwrap().is_empty());
        assert!(fx.snapshots.get("pi_1").await.unwrap().is_some());
        assert_eq!(fx.notifications.sent().len(), 1);
    }

    #[tokio::test]
    async fn topup_credits_balance_without_orders() {
        let fx = fixture();
        let event = PaymentEvent::PaymentSucceeded {
            payment_reference: "pi_top".into(),
            user_id: Some("u1".into()),
            amount: 500,
            currency: "gbp".into(),
            purpose: PaymentPurpose::BalanceTopUp,
        };

        let outcome = fx.reconciler.reconcile(event.clone()).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::BalanceCredited);

        // Redelivered top-up credits once.
        fx.reconciler.reconcile(event).await.unwrap();
        let credits = fx.users.credits();
        assert_eq!(credits.len(), 1);
        assert_eq!(credits[0].amount, 500);
        assert!(fx.orders.list_for_payment("pi_top").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn refund_marks_orders_idempotently() {
        let fx = fixture();
        seed_two_seller_cart(&fx, "pi_1", None).await;
        fx.reconciler.reconcile(succeeded("pi_1")).await.unwrap();

        let first = fx
            .reconciler
            .reconcile(PaymentEvent::ChargeRefunded {
                payment_reference: "pi_1".into(),
            })
            .await
            .unwrap();
        assert_eq!(first, ReconcileOutcome::RefundRecorded { orders: 2 });

        let second = fx
            .reconciler
            .reconcile(PaymentEvent::ChargeRefunded {
                payment_reference: "pi_1".into(),
            })
            .await
            .unwrap();
        assert_eq!(second, ReconcileOutcome::RefundRecorded { orders: 0 });
        assert_eq!(fx.orders.refunded_count("pi_1"), 2);
    }

    #[tokio::test]
    async fn failed_payment_keeps_the_snapshot() {
        let fx = fixture();
        seed_two_seller_cart(&fx, "pi_1", None).await;

        let outcome = fx
            .reconciler
            .reconcile(PaymentEvent::PaymentFailed {
                payment_reference: "pi_1".into(),
                user_id: Some("u1".into()),
            })
            .await
            .unwrap();

        assert_eq!(outcome, ReconcileOutcome::Acknowledged);
        assert!(fx.snapshots.get("pi_1").await.unwrap().is_some());
        assert!(fx.orders.list_for_payment("pi_1").await.unwrap().is_empty());
        assert_eq!(fx.notifications.sent().len(), 1);
    }

    #[tokio::test]
    async fn subscription_events_toggle_user_status() {
        let fx = fixture();
        fx.reconciler
            .reconcile(PaymentEvent::SubscriptionCreated {
                user_id: "u1".into(),
            })
            .await
            .unwrap();
        assert_eq!(fx.users.subscription("u1"), Some(true));

        fx.reconciler
            .reconcile(PaymentEvent::SubscriptionDeleted {
                user_id: "u1".into(),
            })
            .await
            .unwrap();
        assert_eq!(fx.users.subscription("u1"), Some(false));
    }

    #[tokio::test]
    async fn dispute_raises_an_urgent_notification() {
        let fx = fixture();
        fx.reconciler
            .reconcile(PaymentEvent::DisputeCreated {
                payment_reference: "pi_1".into(),
            })
            .await
            .unwrap();
        let sent = fx.notifications.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].priority, NotifyPriority::Urgent);
    }
}
