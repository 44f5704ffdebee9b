use chrono::{DateTime, Utc};
use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewPayment, OrderCode, Payment, PaymentStatus},
    traits::ReservationError,
};

/// Inserts a payment attempt. The partial unique index on live payments enforces the one-live-
/// attempt-per-booking rule at the datastore, so a second concurrent insert surfaces here as
/// `DuplicatePayment` rather than as a second live link.
pub async fn insert_payment(payment: NewPayment, conn: &mut SqliteConnection) -> Result<Payment, ReservationError> {
    let booking_id = payment.booking_id;
    let payment = sqlx::query_as(
        r#"
            INSERT INTO payments (booking_id, order_code, link_id, amount, currency)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(payment.booking_id)
    .bind(payment.order_code)
    .bind(payment.link_id)
    .bind(payment.amount.value())
    .bind(payment.currency)
    .fetch_one(conn)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(de) if de.is_unique_violation() => {
            debug!("💳️ Insert for booking #{booking_id} hit the live-payment unique index");
            ReservationError::DuplicatePayment(booking_id)
        },
        _ => ReservationError::from(e),
    })?;
    Ok(payment)
}

pub async fn fetch_payment_by_order_code(
    code: &OrderCode,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, sqlx::Error> {
    let payment = sqlx::query_as("SELECT * FROM payments WHERE order_code = $1")
        .bind(code.as_str())
        .fetch_optional(conn)
        .await?;
    Ok(payment)
}

pub async fn fetch_payments_for_booking(
    booking_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Payment>, sqlx::Error> {
    let payments = sqlx::query_as("SELECT * FROM payments WHERE booking_id = $1 ORDER BY created_at ASC, id ASC")
        .bind(booking_id)
        .fetch_all(conn)
        .await?;
    Ok(payments)
}

/// The racing half of settlement: `Pending` → `Completed`, recording when the money moved and the
/// raw gateway evidence. Exactly one concurrent caller gets a row back; everyone else gets `None`.
pub async fn settle_payment(
    code: &OrderCode,
    evidence: &str,
    paid_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, sqlx::Error> {
    let payment = sqlx::query_as(
        r#"
            UPDATE payments SET status = 'Completed', paid_at = $2, evidence = $3, updated_at = CURRENT_TIMESTAMP
            WHERE order_code = $1 AND status = 'Pending'
            RETURNING *;
        "#,
    )
    .bind(code.as_str())
    .bind(paid_at)
    .bind(evidence)
    .fetch_optional(conn)
    .await?;
    Ok(payment)
}

/// `Pending` → one of the failure states, recording the evidence. `None` when the payment was
/// already terminal.
pub async fn fail_payment(
    code: &OrderCode,
    new_status: PaymentStatus,
    evidence: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, sqlx::Error> {
    let payment = sqlx::query_as(
        r#"
            UPDATE payments SET status = $2, evidence = $3, updated_at = CURRENT_TIMESTAMP
            WHERE order_code = $1 AND status = 'Pending'
            RETURNING *;
        "#,
    )
    .bind(code.as_str())
    .bind(new_status.to_string())
    .bind(evidence)
    .fetch_optional(conn)
    .await?;
    Ok(payment)
}

/// Moves the booking's live collection attempt (if any) to `new_status`. Used when the hold dies
/// under the link: expiry voids it as `Expired`, cancellation as `Cancelled`. At most one row can
/// match thanks to the live-payment unique index.
pub async fn void_live_payment(
    booking_id: i64,
    new_status: PaymentStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, sqlx::Error> {
    let payment = sqlx::query_as(
        r#"
            UPDATE payments SET status = $2, updated_at = CURRENT_TIMESTAMP
            WHERE booking_id = $1 AND status = 'Pending' AND amount >= 0
            RETURNING *;
        "#,
    )
    .bind(booking_id)
    .bind(new_status.to_string())
    .fetch_optional(conn)
    .await?;
    Ok(payment)
}
