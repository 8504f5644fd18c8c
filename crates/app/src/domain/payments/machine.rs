//! Payment state machine.
//!
//! ```text
//! (pending, pending) --confirm----------> (confirmed, paid)
//! (pending, pending) --fail / expiry----> (cancelled, failed)
//! ```
//!
//! Both fields change in one conditional write, under the order's lock, so no
//! reader ever sees a paid payment on an unconfirmed order. A payment can only
//! be confirmed against an issued checkout that has not yet expired.

use std::sync::Arc;

use jiff::Timestamp;
use serde_json::json;
use tracing::{info, warn};

use crate::domain::{
    audit::{AuditEvent, AuditEventKind, NotificationSink},
    orders::{
        OrderLifecycleEngine,
        models::{Order, OrderState, OrderUuid},
        store::OrdersStore,
    },
    payments::{
        PaymentsError,
        models::PixCheckout,
        pix::{self, PixSettings},
    },
};

pub struct PaymentStateMachine {
    orders: Arc<dyn OrdersStore>,
    engine: Arc<OrderLifecycleEngine>,
    sink: Arc<dyn NotificationSink>,
    pix: PixSettings,
}

impl std::fmt::Debug for PaymentStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentStateMachine")
            .field("pix", &self.pix)
            .finish_non_exhaustive()
    }
}

impl PaymentStateMachine {
    #[must_use]
    pub fn new(
        orders: Arc<dyn OrdersStore>,
        engine: Arc<OrderLifecycleEngine>,
        sink: Arc<dyn NotificationSink>,
        pix: PixSettings,
    ) -> Self {
        Self {
            orders,
            engine,
            sink,
            pix,
        }
    }

    /// Issues a PIX checkout for an order awaiting payment. The order itself
    /// stays pending; issuing again replaces the previous reference and
    /// restarts the expiry clock.
    ///
    /// # Errors
    ///
    /// - [`PaymentsError::OrderNotFound`] for an unknown order.
    /// - [`PaymentsError::AlreadyProcessed`] unless order and payment are both
    ///   pending.
    /// - [`PaymentsError::EmptyOrder`] when there is nothing to charge.
    /// - [`PaymentsError::ExpiryOutOfRange`] / [`PaymentsError::Payload`] when
    ///   the PIX settings cannot produce a checkout.
    #[tracing::instrument(
        name = "payments.machine.issue_checkout",
        skip(self),
        fields(order_uuid = %order),
        err
    )]
    pub async fn issue_checkout(&self, order: OrderUuid) -> Result<PixCheckout, PaymentsError> {
        let _guard = self.engine.lock_order(order).await;

        let current = self.engine.get_order(order).await?;

        if current.state() != OrderState::OPEN {
            return Err(PaymentsError::AlreadyProcessed {
                status: current.status,
                payment_status: current.payment_status,
            });
        }

        if current.items.is_empty() || current.total.is_zero() {
            return Err(PaymentsError::EmptyOrder);
        }

        let reference = pix::new_reference();
        let payload = pix::payload(&self.pix, &reference, current.total)?;
        let expires_at = Timestamp::now()
            .checked_add(self.pix.ttl)
            .map_err(PaymentsError::ExpiryOutOfRange)?;

        if !self
            .orders
            .set_checkout(order, reference.clone(), expires_at)
            .await?
        {
            let latest = self.engine.get_order(order).await?;

            return Err(PaymentsError::AlreadyProcessed {
                status: latest.status,
                payment_status: latest.payment_status,
            });
        }

        let checkout = PixCheckout {
            order_uuid: order,
            payload,
            reference,
            amount: current.total,
            expires_at,
        };

        self.sink.record(AuditEvent::new(
            AuditEventKind::CheckoutIssued,
            order,
            json!({
                "reference": checkout.reference,
                "amount": checkout.amount.to_string(),
                "expires_at": checkout.expires_at.to_string(),
            }),
        ));

        info!(
            order_uuid = %order,
            reference = %checkout.reference,
            amount = %checkout.amount,
            expires_at = %checkout.expires_at,
            "issued pix checkout"
        );

        Ok(checkout)
    }

    /// Marks the payment paid and the order confirmed, together. A checkout
    /// that expired fails the payment instead.
    ///
    /// # Errors
    ///
    /// - [`PaymentsError::OrderNotFound`] for an unknown order.
    /// - [`PaymentsError::NotPending`] unless order and payment are both
    ///   pending; carries the current state.
    /// - [`PaymentsError::CheckoutMissing`] when no checkout was issued.
    /// - [`PaymentsError::CheckoutExpired`] when the checkout expired; the
    ///   order is then cancelled with payment failed and its stock released.
    #[tracing::instrument(
        name = "payments.machine.confirm_payment",
        skip(self),
        fields(order_uuid = %order),
        err
    )]
    pub async fn confirm_payment(&self, order: OrderUuid) -> Result<Order, PaymentsError> {
        let _guard = self.engine.lock_order(order).await;

        let current = self.engine.get_order(order).await?;

        if current.is_open() {
            let expires_at = current
                .checkout_expires_at
                .ok_or(PaymentsError::CheckoutMissing)?;

            if current.checkout_expired(Timestamp::now()) {
                self.fail_open(&current, "checkout_expired").await?;

                return Err(PaymentsError::CheckoutExpired {
                    expired_at: expires_at,
                });
            }
        }

        self.settle(&current, OrderState::CONFIRMED).await?;

        self.sink.record(AuditEvent::new(
            AuditEventKind::PaymentConfirmed,
            order,
            json!({ "reference": current.checkout_reference }),
        ));

        info!(order_uuid = %order, "confirmed payment");

        Ok(self.engine.get_order(order).await?)
    }

    /// Marks the payment failed, cancels the order and returns its stock.
    ///
    /// # Errors
    ///
    /// - [`PaymentsError::OrderNotFound`] for an unknown order.
    /// - [`PaymentsError::NotPending`] unless order and payment are both
    ///   pending; carries the current state.
    #[tracing::instrument(
        name = "payments.machine.fail_payment",
        skip(self),
        fields(order_uuid = %order),
        err
    )]
    pub async fn fail_payment(&self, order: OrderUuid) -> Result<Order, PaymentsError> {
        let _guard = self.engine.lock_order(order).await;

        let current = self.engine.get_order(order).await?;

        self.fail_open(&current, "declined").await?;

        Ok(self.engine.get_order(order).await?)
    }

    /// Fails the payment of every pending order whose checkout has expired.
    /// Returns the orders that were cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentsError::Store`] when the expired orders cannot be
    /// listed or one of them cannot be settled.
    #[tracing::instrument(name = "payments.machine.expire_checkouts", skip(self), err)]
    pub async fn expire_checkouts(&self) -> Result<Vec<OrderUuid>, PaymentsError> {
        let now = Timestamp::now();
        let candidates = self.orders.expired_checkouts(now).await?;
        let mut expired = Vec::with_capacity(candidates.len());

        for order in candidates {
            let _guard = self.engine.lock_order(order).await;

            let current = self.engine.get_order(order).await?;

            // Confirmed, failed or re-issued while waiting for the lock.
            if !current.is_open() || !current.checkout_expired(now) {
                continue;
            }

            self.fail_open(&current, "checkout_expired").await?;

            expired.push(order);
        }

        if !expired.is_empty() {
            warn!(count = expired.len(), "expired pending checkouts");
        }

        Ok(expired)
    }

    /// Moves an open order to payment failed and releases its stock.
    async fn fail_open(&self, current: &Order, reason: &str) -> Result<(), PaymentsError> {
        self.settle(current, OrderState::PAYMENT_FAILED).await?;

        self.engine.release_items(&current.items).await;

        self.sink.record(AuditEvent::new(
            AuditEventKind::PaymentFailed,
            current.uuid,
            json!({
                "reason": reason,
                "released_items": current.items.len(),
            }),
        ));

        info!(order_uuid = %current.uuid, reason, "payment failed, order cancelled");

        Ok(())
    }

    /// Moves an open order to `to`.
    async fn settle(&self, current: &Order, to: OrderState) -> Result<(), PaymentsError> {
        if current.state() != OrderState::OPEN
            || !self
                .orders
                .transition(current.uuid, OrderState::OPEN, to)
                .await?
        {
            let latest = self.engine.get_order(current.uuid).await?;

            return Err(PaymentsError::NotPending {
                status: latest.status,
                payment_status: latest.payment_status,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use jiff::SignedDuration;
    use testresult::TestResult;

    use crate::{
        domain::{
            audit::AuditEventKind,
            orders::{
                OrdersError,
                models::{OrderStatus, PaymentStatus},
            },
        },
        test::TestContext,
    };

    use super::*;

    fn consistent(order: &Order) -> bool {
        (order.status == OrderStatus::Confirmed) == (order.payment_status == PaymentStatus::Paid)
    }

    #[tokio::test]
    async fn checkout_keeps_the_order_pending() -> TestResult {
        let ctx = TestContext::new();
        let order = ctx.seeded_order(2).await?;

        let checkout = ctx.payments.issue_checkout(order.uuid).await?;
        let after = ctx.orders.get_order(order.uuid).await?;

        assert_eq!(checkout.amount, order.total);
        assert_eq!(after.state(), OrderState::OPEN);
        assert_eq!(after.checkout_reference.as_deref(), Some(checkout.reference.as_str()));
        assert_eq!(after.checkout_expires_at, Some(checkout.expires_at));
        assert!(
            checkout.expires_at > Timestamp::now(),
            "checkout should expire in the future"
        );

        Ok(())
    }

    #[tokio::test]
    async fn reissuing_replaces_the_reference() -> TestResult {
        let ctx = TestContext::new();
        let order = ctx.seeded_order(1).await?;

        let first = ctx.payments.issue_checkout(order.uuid).await?;
        let second = ctx.payments.issue_checkout(order.uuid).await?;
        let after = ctx.orders.get_order(order.uuid).await?;

        assert_ne!(first.reference, second.reference);
        assert_eq!(after.checkout_reference, Some(second.reference));

        Ok(())
    }

    #[tokio::test]
    async fn confirming_twice_fails_and_keeps_confirmed() -> TestResult {
        let ctx = TestContext::new();
        let order = ctx.seeded_order(1).await?;

        ctx.payments.issue_checkout(order.uuid).await?;

        let confirmed = ctx.payments.confirm_payment(order.uuid).await?;

        assert_eq!(confirmed.status, OrderStatus::Confirmed);
        assert_eq!(confirmed.payment_status, PaymentStatus::Paid);

        let second = ctx.payments.confirm_payment(order.uuid).await;

        assert!(
            matches!(
                second,
                Err(PaymentsError::NotPending {
                    status: OrderStatus::Confirmed,
                    payment_status: PaymentStatus::Paid,
                })
            ),
            "got {second:?}"
        );
        assert_eq!(
            ctx.orders.get_order(order.uuid).await?.status,
            OrderStatus::Confirmed
        );
        assert_eq!(
            ctx.events()
                .iter()
                .filter(|kind| **kind == AuditEventKind::PaymentConfirmed)
                .count(),
            1
        );

        Ok(())
    }

    #[tokio::test]
    async fn checkout_after_payment_is_already_processed() -> TestResult {
        let ctx = TestContext::new();
        let order = ctx.seeded_order(1).await?;

        ctx.payments.issue_checkout(order.uuid).await?;
        ctx.payments.confirm_payment(order.uuid).await?;

        let result = ctx.payments.issue_checkout(order.uuid).await;

        assert!(
            matches!(
                result,
                Err(PaymentsError::AlreadyProcessed {
                    payment_status: PaymentStatus::Paid,
                    ..
                })
            ),
            "got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn failed_payment_cancels_and_releases_stock() -> TestResult {
        let ctx = TestContext::new();
        let order = ctx.seeded_order(3).await?;
        let item = order.items.first().cloned().ok_or("order has no items")?;

        assert_eq!(ctx.ledger.available(item.product_uuid).await?, 1);

        let failed = ctx.payments.fail_payment(order.uuid).await?;

        assert_eq!(failed.status, OrderStatus::Cancelled);
        assert_eq!(failed.payment_status, PaymentStatus::Failed);
        assert_eq!(ctx.ledger.available(item.product_uuid).await?, 4);

        let result = ctx.payments.confirm_payment(order.uuid).await;

        assert!(
            matches!(
                result,
                Err(PaymentsError::NotPending {
                    payment_status: PaymentStatus::Failed,
                    ..
                })
            ),
            "failed is terminal, got {result:?}"
        );
        assert_eq!(ctx.ledger.available(item.product_uuid).await?, 4);

        Ok(())
    }

    #[tokio::test]
    async fn paid_orders_reject_item_changes() -> TestResult {
        let ctx = TestContext::new();
        let order = ctx.seeded_order(1).await?;
        let item = order.items.first().cloned().ok_or("order has no items")?;

        ctx.payments.issue_checkout(order.uuid).await?;
        ctx.payments.confirm_payment(order.uuid).await?;

        let result = ctx.orders.update_quantity(item.uuid, 2).await;

        assert!(
            matches!(
                result,
                Err(OrdersError::InvalidStateTransition {
                    status: OrderStatus::Confirmed,
                    payment_status: PaymentStatus::Paid,
                })
            ),
            "got {result:?}"
        );

        let result = ctx.orders.cancel_order(order.uuid).await;

        assert!(
            matches!(result, Err(OrdersError::InvalidStateTransition { .. })),
            "got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn unknown_order_is_not_found() {
        let ctx = TestContext::new();

        let result = ctx.payments.confirm_payment(OrderUuid::new()).await;

        assert!(matches!(result, Err(PaymentsError::OrderNotFound)), "got {result:?}");
    }

    #[tokio::test]
    async fn payment_status_never_moves_backwards() -> TestResult {
        let ctx = TestContext::new();

        for script in [
            ["checkout", "confirm", "fail", "checkout"],
            ["confirm", "fail", "checkout", "confirm"],
            ["fail", "confirm", "checkout", "fail"],
            ["checkout", "checkout", "confirm", "fail"],
            ["cancel", "checkout", "confirm", "fail"],
        ] {
            let order = ctx.seeded_order(1).await?;
            let mut settled = None;

            for step in script {
                let _outcome = match step {
                    "confirm" => ctx.payments.confirm_payment(order.uuid).await.map(|_| ()),
                    "fail" => ctx.payments.fail_payment(order.uuid).await.map(|_| ()),
                    "checkout" => ctx.payments.issue_checkout(order.uuid).await.map(|_| ()),
                    _ => ctx
                        .orders
                        .cancel_order(order.uuid)
                        .await
                        .map(|_| ())
                        .map_err(PaymentsError::from),
                };

                let current = ctx.orders.get_order(order.uuid).await?;

                assert!(consistent(&current), "{script:?} at {step}: {current:?}");

                if let Some(previous) = settled {
                    assert_eq!(current.payment_status, previous, "{script:?} at {step}");
                } else if current.payment_status != PaymentStatus::Pending {
                    settled = Some(current.payment_status);
                }
            }
        }

        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_confirm_and_fail_settle_once() -> TestResult {
        let ctx = Arc::new(TestContext::new());
        let order = ctx.seeded_order(2).await?;

        ctx.payments.issue_checkout(order.uuid).await?;

        let confirm = {
            let ctx = Arc::clone(&ctx);
            tokio::spawn(async move { ctx.payments.confirm_payment(order.uuid).await })
        };
        let fail = {
            let ctx = Arc::clone(&ctx);
            tokio::spawn(async move { ctx.payments.fail_payment(order.uuid).await })
        };

        let outcomes = [confirm.await?.is_ok(), fail.await?.is_ok()];
        let after = ctx.orders.get_order(order.uuid).await?;

        assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1);
        assert!(consistent(&after), "{after:?}");

        Ok(())
    }

    fn expired_on_issue() -> PixSettings {
        PixSettings {
            ttl: SignedDuration::ZERO,
            ..PixSettings::default()
        }
    }

    #[tokio::test]
    async fn confirming_without_checkout_is_rejected() -> TestResult {
        let ctx = TestContext::new();
        let order = ctx.seeded_order(2).await?;
        let item = order.items.first().cloned().ok_or("order has no items")?;

        let result = ctx.payments.confirm_payment(order.uuid).await;

        assert!(
            matches!(result, Err(PaymentsError::CheckoutMissing)),
            "got {result:?}"
        );
        assert_eq!(
            ctx.orders.get_order(order.uuid).await?.state(),
            OrderState::OPEN
        );
        assert_eq!(ctx.ledger.available(item.product_uuid).await?, 2);

        Ok(())
    }

    #[tokio::test]
    async fn confirming_after_expiry_fails_the_payment() -> TestResult {
        let ctx = TestContext::with_pix(expired_on_issue());
        let order = ctx.seeded_order(3).await?;
        let item = order.items.first().cloned().ok_or("order has no items")?;

        let checkout = ctx.payments.issue_checkout(order.uuid).await?;
        let result = ctx.payments.confirm_payment(order.uuid).await;

        assert!(
            matches!(
                result,
                Err(PaymentsError::CheckoutExpired { expired_at }) if expired_at == checkout.expires_at
            ),
            "got {result:?}"
        );

        let after = ctx.orders.get_order(order.uuid).await?;

        assert_eq!(after.state(), OrderState::PAYMENT_FAILED);
        assert_eq!(ctx.ledger.available(item.product_uuid).await?, 4);
        assert!(
            !ctx.events().contains(&AuditEventKind::PaymentConfirmed),
            "expired checkout must not confirm"
        );
        assert!(
            ctx.events().contains(&AuditEventKind::PaymentFailed),
            "expiry should be audited as a failed payment"
        );

        Ok(())
    }

    #[tokio::test]
    async fn sweeping_expires_only_lapsed_checkouts() -> TestResult {
        let ctx = TestContext::with_pix(expired_on_issue());
        let lapsed = ctx.seeded_order(1).await?;
        let unissued = ctx.seeded_order(2).await?;

        ctx.payments.issue_checkout(lapsed.uuid).await?;

        let expired = ctx.payments.expire_checkouts().await?;

        assert_eq!(expired, vec![lapsed.uuid]);
        assert_eq!(
            ctx.orders.get_order(lapsed.uuid).await?.state(),
            OrderState::PAYMENT_FAILED
        );
        assert_eq!(
            ctx.orders.get_order(unissued.uuid).await?.state(),
            OrderState::OPEN
        );
        assert!(
            ctx.payments.expire_checkouts().await?.is_empty(),
            "a second sweep has nothing left to expire"
        );

        Ok(())
    }

    #[tokio::test]
    async fn unexpired_checkout_survives_the_sweep() -> TestResult {
        let ctx = TestContext::new();
        let order = ctx.seeded_order(1).await?;

        ctx.payments.issue_checkout(order.uuid).await?;

        assert!(ctx.payments.expire_checkouts().await?.is_empty(), "checkout is still payable");

        let paid = ctx.payments.confirm_payment(order.uuid).await?;

        assert_eq!(paid.state(), OrderState::CONFIRMED);

        Ok(())
    }
}
