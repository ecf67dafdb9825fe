//! Booking lifecycle: the only writer of booking state.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use booking_store::BookingStore;
use chrono::Duration;
use common::{BookingId, Clock, ScheduleId};
use domain::{
    Actor, Booking, BookingError, BookingEvent, BookingReference, BookingStatus, CustomerId,
    HistoryEntry, NewBooking, NotificationEvent, PaymentMethod, PaymentTransaction,
    ReconciliationCase, ReconciliationReason, Schedule, SeatNumber,
};
use seat_inventory::{InventoryError, SeatInventory};

use crate::error::{LifecycleError, Result};
use crate::locks::KeyedLocks;
use crate::retry::RetryPolicy;
use crate::services::{
    ChargeRequest, NotificationDispatcher, PaymentGateway, RefundRequest, ScheduleCatalog,
};

/// Timing and retry settings.
#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleConfig {
    /// How long seats stay held while payment is outstanding.
    pub hold_ttl: Duration,
    /// Extra time beyond the hold TTL before an unpaid booking times out.
    pub payment_grace: Duration,
    pub retry: RetryPolicy,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            hold_ttl: Duration::seconds(300),
            payment_grace: Duration::seconds(60),
            retry: RetryPolicy::default(),
        }
    }
}

/// External collaborators of the lifecycle.
#[derive(Clone)]
pub struct Services {
    pub inventory: Arc<SeatInventory>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub notifier: Arc<dyn NotificationDispatcher>,
    pub catalog: Arc<dyn ScheduleCatalog>,
    pub clock: Arc<dyn Clock>,
}

/// Request to book seats on a schedule.
#[derive(Debug, Clone)]
pub struct CreateBooking {
    pub schedule_id: ScheduleId,
    pub seats: BTreeSet<SeatNumber>,
    pub customer_id: CustomerId,
    pub payment_method: PaymentMethod,
    /// Number to prompt for mobile-money payment; defaults to the customer ID.
    pub payer_contact: Option<String>,
    pub notes: Option<String>,
}

/// Orchestrates seat inventory, booking store, payment gateway and
/// notifications into one consistent booking outcome.
///
/// Every mutation of a booking runs under that booking's lock, so two
/// competing transitions are applied one after the other and the second is
/// evaluated against the state the first produced.
pub struct BookingLifecycle<S: BookingStore> {
    pub(crate) store: S,
    pub(crate) inventory: Arc<SeatInventory>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn NotificationDispatcher>,
    pub(crate) catalog: Arc<dyn ScheduleCatalog>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) locks: KeyedLocks<BookingId>,
    pub(crate) config: LifecycleConfig,
}

impl<S: BookingStore> BookingLifecycle<S> {
    /// Creates a new lifecycle.
    pub fn new(store: S, services: Services, config: LifecycleConfig) -> Self {
        Self {
            store,
            inventory: services.inventory,
            gateway: services.gateway,
            notifier: services.notifier,
            catalog: services.catalog,
            clock: services.clock,
            locks: KeyedLocks::new(),
            config,
        }
    }

    /// Returns the booking store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the lifecycle configuration.
    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    /// Holds seats and creates a booking in `PendingPayment`.
    ///
    /// For gateway payment methods the charge is initiated right away. If
    /// the gateway stays unavailable after retries the booking is still
    /// returned as `PendingPayment` and left to the timeout sweep.
    #[tracing::instrument(
        skip(self, request, actor),
        fields(schedule_id = %request.schedule_id, customer_id = %request.customer_id)
    )]
    pub async fn create(&self, request: CreateBooking, actor: &Actor) -> Result<Booking> {
        if !actor.may_act_for(&request.customer_id) {
            return Err(BookingError::Forbidden { action: "create" }.into());
        }

        let schedule = self.schedule(request.schedule_id).await?;
        let now = self.clock.now();
        if schedule.has_departed(now) {
            return Err(LifecycleError::ScheduleDeparted(schedule.schedule_id));
        }

        let booking_id = BookingId::new();
        let hold = self
            .inventory
            .hold_seats(&schedule, &request.seats, booking_id, self.config.hold_ttl)
            .await?;

        let payer_contact = request
            .payer_contact
            .unwrap_or_else(|| request.customer_id.to_string());
        let input = NewBooking {
            booking_id,
            customer_id: request.customer_id,
            seats: request.seats,
            payment_method: request.payment_method,
            notes: request.notes,
        };

        let booking = match Booking::create(input, &schedule, hold.clone(), now) {
            Ok(booking) => booking,
            Err(e) => {
                self.inventory.release(&hold).await;
                return Err(e.into());
            }
        };

        if let Err(e) = self.store.insert_booking(&booking).await {
            self.inventory.release(&hold).await;
            return Err(e.into());
        }

        metrics::counter!(
            "bookings_created_total",
            "payment_method" => booking.payment_method().as_str()
        )
        .increment(1);
        tracing::info!(
            %booking_id,
            reference = %booking.reference(),
            total = %booking.total_amount(),
            "booking created"
        );

        if !booking.payment_method().uses_gateway() {
            return Ok(booking);
        }
        self.initiate_payment(booking_id, &payer_contact).await
    }

    /// Initiates the gateway charge for a pending booking.
    ///
    /// Does nothing if a charge was already initiated. A rejected charge
    /// fails the booking; an unreachable gateway leaves it pending.
    #[tracing::instrument(skip(self, payer_contact))]
    pub async fn initiate_payment(
        &self,
        booking_id: BookingId,
        payer_contact: &str,
    ) -> Result<Booking> {
        let _guard = self.locks.lock(&booking_id).await;
        let booking = self.load(booking_id).await?;

        if booking.payment_ref().is_some() {
            return Ok(booking);
        }
        if !booking.status().awaits_payment() {
            return Err(BookingError::InvalidTransition {
                current: booking.status(),
                action: "request payment for",
            }
            .into());
        }

        let request = ChargeRequest {
            booking_id,
            reference: booking.reference().clone(),
            amount: booking.total_amount(),
            payer_contact: payer_contact.to_string(),
        };

        let started = Instant::now();
        let result = self
            .config
            .retry
            .run("initiate", || self.gateway.initiate(&request))
            .await;
        metrics::histogram!("gateway_initiate_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        match result {
            Ok(gateway_ref) => {
                let event = booking.request_payment(gateway_ref, self.clock.now())?;
                self.persist(booking, event).await
            }
            Err(e) if e.is_transient() => {
                tracing::warn!(
                    error = %e,
                    "gateway unavailable, booking left pending for the timeout sweep"
                );
                Ok(booking)
            }
            Err(e) => {
                tracing::warn!(error = %e, "charge rejected by gateway");
                self.fail_locked(booking, format!("charge rejected: {e}"))
                    .await
            }
        }
    }

    /// Applies a settled payment to a pending booking.
    ///
    /// Finalizes the seat hold and confirms the booking. If the hold has
    /// already expired the booking is cancelled instead and the payment is
    /// queued for manual reconciliation.
    #[tracing::instrument(skip(self, transaction), fields(external_ref = %transaction.external_ref))]
    pub async fn on_payment_success(
        &self,
        booking_id: BookingId,
        transaction: &PaymentTransaction,
    ) -> Result<Booking> {
        let _guard = self.locks.lock(&booking_id).await;
        let booking = self.load(booking_id).await?;
        self.settle_locked(booking, transaction).await
    }

    /// Fails a pending booking whose payment failed or never arrived.
    #[tracing::instrument(skip(self, reason))]
    pub async fn on_payment_failure_or_timeout(
        &self,
        booking_id: BookingId,
        reason: impl Into<String>,
    ) -> Result<Booking> {
        let _guard = self.locks.lock(&booking_id).await;
        let booking = self.load(booking_id).await?;
        self.fail_locked(booking, reason.into()).await
    }

    /// Cancels a booking on behalf of `actor`.
    ///
    /// A paid booking is refunded first and ends `Refunded`; if the gateway
    /// refund fails the booking is left unchanged. An unpaid booking ends
    /// `Cancelled`. Seats are released either way.
    #[tracing::instrument(skip(self, reason, actor), fields(actor = %actor))]
    pub async fn cancel(
        &self,
        booking_id: BookingId,
        reason: impl Into<String>,
        actor: &Actor,
    ) -> Result<Booking> {
        let reason = reason.into();
        let _guard = self.locks.lock(&booking_id).await;
        let booking = self.load(booking_id).await?;
        booking.check_cancellable(actor)?;

        if !booking.requires_refund() {
            let hold = booking.hold().clone();
            let event = booking.cancel(reason, actor, self.clock.now())?;
            let booking = self.persist(booking, event).await?;
            self.inventory.release(&hold).await;
            self.notify(booking_id, NotificationEvent::Cancelled).await;
            return Ok(booking);
        }

        let refund_ref = match (booking.payment_method().uses_gateway(), booking.payment_ref()) {
            (true, Some(payment_ref)) => {
                let request = RefundRequest {
                    booking_id,
                    payment_ref: payment_ref.to_string(),
                    amount: booking.total_amount(),
                };
                let refund_ref = self
                    .config
                    .retry
                    .run("refund", || self.gateway.refund(&request))
                    .await?;
                Some(refund_ref)
            }
            _ => None,
        };

        let schedule_id = booking.schedule_id();
        let amount = booking.total_amount();
        let event = booking.refund(reason, actor, refund_ref.clone(), self.clock.now())?;
        let booking = self.persist(booking, event).await?;

        if refund_ref.is_none() {
            let case = ReconciliationCase::open(
                booking_id,
                None,
                amount,
                ReconciliationReason::ManualRefundDue,
                self.clock.now(),
            );
            self.open_case(case).await?;
        }

        self.inventory
            .release_allocation(schedule_id, booking_id)
            .await;
        self.notify(booking_id, NotificationEvent::Refunded).await;
        Ok(booking)
    }

    /// Completes a confirmed booking.
    #[tracing::instrument(skip(self))]
    pub async fn complete(&self, booking_id: BookingId) -> Result<Booking> {
        let _guard = self.locks.lock(&booking_id).await;
        let booking = self.load(booking_id).await?;
        let event = booking.complete(self.clock.now())?;
        self.persist(booking, event).await
    }

    /// Retrieves a booking by ID.
    pub async fn get_booking(&self, booking_id: BookingId) -> Result<Booking> {
        self.load(booking_id).await
    }

    /// Retrieves a booking by its public reference.
    pub async fn find_by_reference(&self, reference: &str) -> Result<Booking> {
        self.store
            .find_by_reference(&BookingReference::new(reference))
            .await?
            .ok_or_else(|| LifecycleError::ReferenceNotFound(reference.to_string()))
    }

    /// Returns the transition history of a booking.
    pub async fn history(&self, booking_id: BookingId) -> Result<Vec<HistoryEntry>> {
        self.load(booking_id).await?;
        Ok(self.store.history(booking_id).await?)
    }

    /// Returns the payment transactions recorded against a booking.
    pub async fn transactions(&self, booking_id: BookingId) -> Result<Vec<PaymentTransaction>> {
        self.load(booking_id).await?;
        Ok(self.store.transactions_for_booking(booking_id).await?)
    }

    /// Returns the manual reconciliation queue.
    pub async fn reconciliation_cases(&self) -> Result<Vec<ReconciliationCase>> {
        Ok(self.store.reconciliation_cases().await?)
    }

    /// Returns the free seats of a schedule.
    pub async fn availability(&self, schedule_id: ScheduleId) -> Result<BTreeSet<SeatNumber>> {
        let schedule = self.schedule(schedule_id).await?;
        Ok(self.inventory.availability(&schedule).await)
    }

    /// Rebuilds seat inventory from stored bookings after a restart.
    ///
    /// Pending bookings get their unexpired holds back; confirmed and
    /// completed bookings get their seats allocated. Returns the number of
    /// bookings restored.
    #[tracing::instrument(skip(self))]
    pub async fn recover(&self) -> Result<usize> {
        let mut restored = 0;

        for status in [
            BookingStatus::Confirmed,
            BookingStatus::Completed,
            BookingStatus::PendingPayment,
        ] {
            for booking in self.store.list_by_status(status).await? {
                let Some(schedule) = self.catalog.get_schedule(booking.schedule_id()).await else {
                    tracing::warn!(
                        booking_id = %booking.booking_id(),
                        schedule_id = %booking.schedule_id(),
                        "schedule missing from catalog, seats not restored"
                    );
                    continue;
                };

                let result = if status == BookingStatus::PendingPayment {
                    self.inventory
                        .restore_hold(&schedule, booking.hold().clone())
                        .await
                } else {
                    self.inventory
                        .restore_allocation(&schedule, booking.seats(), booking.booking_id())
                        .await
                };

                match result {
                    Ok(()) => restored += 1,
                    Err(e) => tracing::error!(
                        booking_id = %booking.booking_id(),
                        error = %e,
                        "conflicting seats while restoring inventory"
                    ),
                }
            }
        }

        tracing::info!(restored, "seat inventory restored");
        Ok(restored)
    }

    pub(crate) async fn schedule(&self, schedule_id: ScheduleId) -> Result<Schedule> {
        self.catalog
            .get_schedule(schedule_id)
            .await
            .ok_or(LifecycleError::ScheduleNotFound(schedule_id))
    }

    pub(crate) async fn load(&self, booking_id: BookingId) -> Result<Booking> {
        self.store
            .get_booking(booking_id)
            .await?
            .ok_or(LifecycleError::BookingNotFound(booking_id))
    }

    /// Applies an event and saves the booking with its history entry.
    async fn persist(&self, mut booking: Booking, event: BookingEvent) -> Result<Booking> {
        let expected = booking.version();
        let entry = booking.apply(event);
        self.store
            .save_transition(&booking, expected, &entry)
            .await?;

        metrics::counter!("booking_transitions_total", "to" => booking.status().as_str())
            .increment(1);
        tracing::info!(
            booking_id = %booking.booking_id(),
            from = %entry.from,
            to = %entry.to,
            event = entry.event.event_type(),
            "booking transitioned"
        );

        if booking.status().is_terminal() {
            self.locks.forget(&booking.booking_id());
        }
        Ok(booking)
    }

    /// Confirms a pending booking; caller holds the booking lock.
    pub(crate) async fn settle_locked(
        &self,
        booking: Booking,
        transaction: &PaymentTransaction,
    ) -> Result<Booking> {
        let booking_id = booking.booking_id();
        let now = self.clock.now();
        let event = booking.confirm_payment(transaction.transaction_id, now)?;

        match self.inventory.finalize(booking.hold()).await {
            Ok(()) => {
                let hold = booking.hold().clone();
                match self.persist(booking, event).await {
                    Ok(booking) => {
                        self.notify(booking_id, NotificationEvent::Confirmed).await;
                        Ok(booking)
                    }
                    Err(e) => {
                        self.inventory.revert_finalize(&hold).await;
                        Err(e)
                    }
                }
            }
            Err(InventoryError::HoldExpired(_)) => {
                tracing::warn!(%booking_id, "payment arrived after the seat hold expired");
                let event = booking.reject_late_payment(transaction.transaction_id, now)?;
                let booking = self.persist(booking, event).await?;

                let case = ReconciliationCase::open(
                    booking_id,
                    Some(transaction.external_ref.clone()),
                    transaction.amount,
                    ReconciliationReason::PaidAfterHoldExpired,
                    now,
                );
                self.open_case(case).await?;
                self.notify(booking_id, NotificationEvent::Cancelled).await;
                Ok(booking)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Fails a pending booking and frees its seats; caller holds the lock.
    pub(crate) async fn fail_locked(&self, booking: Booking, reason: String) -> Result<Booking> {
        let booking_id = booking.booking_id();
        let hold = booking.hold().clone();
        let event = booking.fail_payment(reason, self.clock.now())?;
        let booking = self.persist(booking, event).await?;

        self.inventory.release(&hold).await;
        self.notify(booking_id, NotificationEvent::Cancelled).await;
        Ok(booking)
    }

    pub(crate) async fn open_case(&self, case: ReconciliationCase) -> Result<()> {
        self.store.open_case(&case).await?;
        metrics::counter!("reconciliation_cases_total", "reason" => case.reason.label())
            .increment(1);
        tracing::warn!(
            booking_id = %case.booking_id,
            reason = case.reason.label(),
            amount = %case.amount,
            "payment queued for manual reconciliation"
        );
        Ok(())
    }

    async fn notify(&self, booking_id: BookingId, event: NotificationEvent) {
        if let Err(e) = self.notifier.notify(booking_id, event).await {
            metrics::counter!("notification_failures_total").increment(1);
            tracing::warn!(%booking_id, event = %event, error = %e, "notification failed");
        }
    }
}
