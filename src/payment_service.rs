//! Payment hold coordinator.
//!
//! Creating an order is a saga: acquire a slot, persist a PENDING_PAYMENT
//! hold, then register the order with the external gateway. There is no
//! transaction spanning the external call and the local writes, so each step
//! after the acquisition has a compensating release on its failure path.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AuthUser;
use crate::booking_service::{billable_hours, fetch_booking, fetch_parking, resolve_window, trimmed};
use crate::capacity;
use crate::error::ServiceError;
use crate::ist;
use crate::models::{Booking, BookingStatus};
use crate::payment_gateway::PaymentGatewayClient;

/// How long an unpaid hold keeps its slot.
pub const HOLD_MINUTES: i64 = 2;

const PROVIDER: &str = "RAZORPAY";
const CURRENCY: &str = "INR";

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderRequest {
    pub parking_id: Uuid,
    #[validate(length(min = 1, max = 32))]
    pub vehicle_number: String,
    pub booking_date: Option<String>,
    pub start_time: String,
    pub end_time: String,
    pub customer_name: Option<String>,
    #[validate(email)]
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateOrderResponse {
    pub booking_id: Uuid,
    pub order_id: Option<String>,
    /// Gateway minor units (paise).
    pub amount: Option<i64>,
    pub currency: String,
    pub hold_expires_at: Option<DateTime<Utc>>,
    /// Set when an identical booking was already paid for; nothing was
    /// created and no slot was taken.
    pub already_paid: bool,
}

#[derive(Debug, Deserialize)]
pub struct VerifyPaymentRequest {
    pub booking_id: Uuid,
    pub order_id: String,
    pub payment_id: String,
    pub signature: String,
}

pub struct PaymentService {
    pool: PgPool,
    gateway: PaymentGatewayClient,
}

impl PaymentService {
    pub fn new(pool: PgPool, gateway: PaymentGatewayClient) -> Self {
        Self { pool, gateway }
    }

    /// The public gateway key id, for the client-side checkout widget.
    pub fn gateway_key_id(&self) -> Result<String, ServiceError> {
        if !self.gateway.is_configured() {
            return Err(ServiceError::UpstreamMisconfigured(
                "Payment gateway is not configured".to_string(),
            ));
        }
        Ok(self.gateway.key_id().to_string())
    }

    /// Creates a 2-minute hold plus a gateway order.
    ///
    /// Idempotent against client refresh: an identical unexpired hold
    /// returns its existing order unchanged, and an identical already-paid
    /// booking short-circuits without touching capacity.
    pub async fn create_order(
        &self,
        user: AuthUser,
        request: CreateOrderRequest,
    ) -> Result<CreateOrderResponse, ServiceError> {
        if !self.gateway.is_configured() {
            return Err(ServiceError::UpstreamMisconfigured(
                "Payment gateway is not configured".to_string(),
            ));
        }
        request
            .validate()
            .map_err(|err| ServiceError::Validation(err.to_string()))?;

        let now = Utc::now();
        let window = resolve_window(
            now,
            request.booking_date.as_deref(),
            &request.start_time,
            &request.end_time,
        )?;
        let vehicle_number = request.vehicle_number.trim().to_string();

        // Dedup (a): the same window was already paid for.
        let paid: Option<Booking> = sqlx::query_as(
            r#"
            SELECT * FROM bookings
            WHERE user_id = $1 AND parking_id = $2 AND booking_date = $3
              AND start_time = $4 AND end_time = $5 AND vehicle_number = $6
              AND payment_status = 'PAID'
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(user.id)
        .bind(request.parking_id)
        .bind(window.date)
        .bind(&window.start_time)
        .bind(&window.end_time)
        .bind(&vehicle_number)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(existing) = paid {
            return Ok(CreateOrderResponse {
                booking_id: existing.id,
                order_id: existing.payment_order_id,
                amount: existing.payment_amount,
                currency: existing.payment_currency.unwrap_or_else(|| CURRENCY.to_string()),
                hold_expires_at: None,
                already_paid: true,
            });
        }

        // Dedup (b): an unexpired hold for the same window keeps its order.
        let pending: Option<Booking> = sqlx::query_as(
            r#"
            SELECT * FROM bookings
            WHERE user_id = $1 AND parking_id = $2 AND booking_date = $3
              AND start_time = $4 AND end_time = $5 AND vehicle_number = $6
              AND status = 'PENDING_PAYMENT' AND hold_expires_at > $7
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(user.id)
        .bind(request.parking_id)
        .bind(window.date)
        .bind(&window.start_time)
        .bind(&window.end_time)
        .bind(&vehicle_number)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(existing) = pending {
            if existing.payment_order_id.is_some() {
                return Ok(CreateOrderResponse {
                    booking_id: existing.id,
                    order_id: existing.payment_order_id,
                    amount: existing.payment_amount,
                    currency: existing
                        .payment_currency
                        .unwrap_or_else(|| CURRENCY.to_string()),
                    hold_expires_at: existing.hold_expires_at,
                    already_paid: false,
                });
            }
        }

        let parking = fetch_parking(&self.pool, request.parking_id).await?;

        capacity::acquire_slot(&self.pool, parking.id, parking.total_slots, now).await?;

        let duration = billable_hours(&window) as i32;
        let total_price = i64::from(duration) * parking.price;
        let amount_paise = total_price * 100;
        let hold_expires_at = now + Duration::minutes(HOLD_MINUTES);

        let insert = sqlx::query_as::<_, Booking>(
            r#"
            INSERT INTO bookings (
                id, parking_id, user_id, vehicle_number,
                customer_name, customer_email, customer_phone,
                booking_date, start_time, end_time, duration_hours, total_price,
                status, gate_status, hold_expires_at,
                payment_provider, payment_currency, payment_amount, payment_status,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
                    'PENDING_PAYMENT', 'PENDING_ENTRY', $13, $14, $15, $16, 'CREATED', $17, $17)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(parking.id)
        .bind(user.id)
        .bind(&vehicle_number)
        .bind(trimmed(request.customer_name))
        .bind(trimmed(request.customer_email).map(|e| e.to_lowercase()))
        .bind(trimmed(request.customer_phone))
        .bind(window.date)
        .bind(&window.start_time)
        .bind(&window.end_time)
        .bind(duration)
        .bind(total_price)
        .bind(hold_expires_at)
        .bind(PROVIDER)
        .bind(CURRENCY)
        .bind(amount_paise)
        .bind(now)
        .fetch_one(&self.pool)
        .await;

        let booking = match insert {
            Ok(booking) => booking,
            Err(err) => {
                if let Err(release_err) = capacity::release_slot(&self.pool, parking.id).await {
                    tracing::error!(
                        parking_id = %parking.id,
                        error = %release_err,
                        "failed to release slot after hold insert failure"
                    );
                }
                return Err(err.into());
            }
        };

        let order = self
            .gateway
            .create_order(
                amount_paise,
                CURRENCY,
                &booking.id.to_string(),
                json!({
                    "booking_id": booking.id,
                    "parking_id": parking.id,
                    "user_id": user.id,
                }),
            )
            .await;

        let order = match order {
            Ok(order) => order,
            Err(err) => {
                // Compensate: fail the hold and put the slot back.
                self.fail_hold(booking.id, parking.id, "ORDER_CREATE_FAILED", now)
                    .await;
                return Err(err);
            }
        };

        sqlx::query("UPDATE bookings SET payment_order_id = $2, updated_at = $3 WHERE id = $1")
            .bind(booking.id)
            .bind(&order.id)
            .bind(now)
            .execute(&self.pool)
            .await?;

        tracing::info!(
            booking_id = %booking.id,
            order_id = %order.id,
            amount = amount_paise,
            "payment hold created"
        );

        Ok(CreateOrderResponse {
            booking_id: booking.id,
            order_id: Some(order.id),
            amount: Some(amount_paise),
            currency: CURRENCY.to_string(),
            hold_expires_at: Some(hold_expires_at),
            already_paid: false,
        })
    }

    /// Verifies the gateway's signed confirmation and promotes the hold.
    pub async fn verify_payment(
        &self,
        user: AuthUser,
        request: VerifyPaymentRequest,
    ) -> Result<Booking, ServiceError> {
        if request.order_id.trim().is_empty()
            || request.payment_id.trim().is_empty()
            || request.signature.trim().is_empty()
        {
            return Err(ServiceError::Validation(
                "Missing payment details".to_string(),
            ));
        }

        let now = Utc::now();
        let booking = fetch_booking(&self.pool, request.booking_id).await?;

        if booking.user_id != user.id {
            return Err(ServiceError::Forbidden("Access denied".to_string()));
        }
        if booking.status != BookingStatus::PendingPayment {
            return Err(ServiceError::StateConflict(
                "Booking is not pending payment".to_string(),
            ));
        }
        if matches!(booking.hold_expires_at, Some(expires) if expires <= now) {
            return Err(ServiceError::StateConflict(
                "Payment window expired".to_string(),
            ));
        }
        if let Some(ref recorded) = booking.payment_order_id {
            if recorded != &request.order_id {
                return Err(ServiceError::Security("Order ID mismatch".to_string()));
            }
        }

        if !self
            .gateway
            .verify_signature(&request.order_id, &request.payment_id, &request.signature)
        {
            return Err(ServiceError::Security(
                "Invalid payment signature".to_string(),
            ));
        }

        let (start, end) =
            ist::window_instants(booking.booking_date, &booking.start_time, &booking.end_time)
                .ok_or_else(|| {
                    ServiceError::Validation("Booking has an invalid time window".to_string())
                })?;

        if now >= end {
            // The payment succeeded at the gateway but the window is gone.
            // Known refund-reconciliation gap: the gateway keeps the money
            // while the booking expires locally.
            let expired = self
                .fail_hold(booking.id, booking.parking_id, "WINDOW_ELAPSED_AT_VERIFY", now)
                .await;
            if expired {
                tracing::warn!(
                    booking_id = %booking.id,
                    order_id = %request.order_id,
                    "payment verified after the booking window elapsed; refund needed"
                );
            }
            return Err(ServiceError::StateConflict(
                "Booking window has already passed".to_string(),
            ));
        }

        let target = if now < start {
            BookingStatus::Upcoming
        } else {
            BookingStatus::Active
        };

        // Guarded on PENDING_PAYMENT so a verify racing the cleanup sweep
        // loses cleanly instead of resurrecting an expired hold.
        let promoted = sqlx::query_as::<_, Booking>(
            r#"
            UPDATE bookings
            SET status = $2,
                payment_order_id = $3, payment_payment_id = $4, payment_signature = $5,
                payment_status = 'PAID', paid_at = $6,
                hold_expires_at = NULL, updated_at = $6
            WHERE id = $1 AND status = 'PENDING_PAYMENT'
            RETURNING *
            "#,
        )
        .bind(booking.id)
        .bind(target)
        .bind(&request.order_id)
        .bind(&request.payment_id)
        .bind(&request.signature)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        let Some(promoted) = promoted else {
            return Err(ServiceError::StateConflict(
                "Payment window expired".to_string(),
            ));
        };

        tracing::info!(
            booking_id = %promoted.id,
            status = ?promoted.status,
            "payment verified"
        );

        Ok(promoted)
    }

    /// Fails a still-pending hold and releases its slot. Returns whether the
    /// guarded update matched (someone else may have moved the booking
    /// first, in which case there is nothing to compensate).
    async fn fail_hold(
        &self,
        booking_id: Uuid,
        parking_id: Uuid,
        reason: &str,
        now: DateTime<Utc>,
    ) -> bool {
        let terminal = if reason == "ORDER_CREATE_FAILED" {
            "PAYMENT_FAILED"
        } else {
            "EXPIRED"
        };

        let updated = sqlx::query(
            r#"
            UPDATE bookings
            SET status = $2::booking_status, payment_status = 'FAILED',
                payment_failed_at = $3, payment_failure_reason = $4,
                hold_expires_at = NULL, updated_at = $3
            WHERE id = $1 AND status = 'PENDING_PAYMENT'
            "#,
        )
        .bind(booking_id)
        .bind(terminal)
        .bind(now)
        .bind(reason)
        .execute(&self.pool)
        .await;

        match updated {
            Ok(result) if result.rows_affected() > 0 => {
                if let Err(err) = capacity::release_slot(&self.pool, parking_id).await {
                    tracing::error!(
                        booking_id = %booking_id,
                        error = %err,
                        "failed to release slot while failing hold"
                    );
                }
                true
            }
            Ok(_) => false,
            Err(err) => {
                tracing::error!(booking_id = %booking_id, error = %err, "failed to fail hold");
                false
            }
        }
    }
}
