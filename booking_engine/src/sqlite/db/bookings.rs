use chrono::{DateTime, NaiveDate, Utc};
use log::trace;
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    bke_api::booking_objects::BookingQueryFilter,
    db_types::{Booking, BookingStatus, CancelReason, NewBooking},
};

/// Inserts a new hold, with the conflict check fused into the insert itself.
///
/// The `WHERE NOT EXISTS` guard and the insert execute as one statement, so two requests for
/// overlapping intervals can never both pass the check: SQLite serializes the writes and the
/// second one inserts nothing. A conflict is any active booking on the same resource whose
/// half-open interval overlaps the requested one; `[a, b)` and `[b, c)` touch but do not overlap.
///
/// Returns `None` when the interval was taken.
pub async fn insert_reservation(
    booking: NewBooking,
    expires_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Booking>, sqlx::Error> {
    let booking = sqlx::query_as(
        r#"
            INSERT INTO bookings (
                resource_id,
                requester_id,
                start_date,
                end_date,
                participant_count,
                amount,
                status,
                expires_at
            )
            SELECT $1, $2, $3, $4, $5, $6, 'Reserved', $7
            WHERE NOT EXISTS (
                SELECT 1 FROM bookings
                WHERE resource_id = $1
                  AND status IN ('Reserved', 'Confirmed')
                  AND start_date < $4
                  AND end_date > $3
            )
            RETURNING *;
        "#,
    )
    .bind(booking.resource_id)
    .bind(booking.requester_id)
    .bind(booking.start_date)
    .bind(booking.end_date)
    .bind(booking.participant_count)
    .bind(booking.amount.value())
    .bind(expires_at)
    .fetch_optional(conn)
    .await?;
    Ok(booking)
}

pub async fn fetch_booking_by_id(id: i64, conn: &mut SqliteConnection) -> Result<Option<Booking>, sqlx::Error> {
    let booking = sqlx::query_as("SELECT * FROM bookings WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(booking)
}

pub async fn fetch_bookings_for_requester(
    requester_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<Booking>, sqlx::Error> {
    let bookings = sqlx::query_as("SELECT * FROM bookings WHERE requester_id = $1 ORDER BY created_at ASC, id ASC")
        .bind(requester_id)
        .fetch_all(conn)
        .await?;
    Ok(bookings)
}

/// Whether `[start, end)` on the resource overlaps no active booking. Derived from booking rows at
/// call time; there is no availability counter to drift out of sync.
pub async fn interval_is_free(
    resource_id: &str,
    start: NaiveDate,
    end: NaiveDate,
    excluding: Option<i64>,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let clashes: i64 = sqlx::query_scalar(
        r#"
            SELECT COUNT(*) FROM bookings
            WHERE resource_id = $1
              AND status IN ('Reserved', 'Confirmed')
              AND start_date < $3
              AND end_date > $2
              AND id <> $4
        "#,
    )
    .bind(resource_id)
    .bind(start)
    .bind(end)
    .bind(excluding.unwrap_or(-1))
    .fetch_one(conn)
    .await?;
    Ok(clashes == 0)
}

/// Fetches bookings according to criteria specified in the `BookingQueryFilter`
///
/// Resulting bookings are ordered by `created_at` in ascending order
pub async fn search_bookings(
    query: BookingQueryFilter,
    conn: &mut SqliteConnection,
) -> Result<Vec<Booking>, sqlx::Error> {
    let mut builder = QueryBuilder::new(
        r#"
    SELECT * FROM bookings
    "#,
    );
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(resource_id) = query.resource_id {
        where_clause.push("resource_id = ");
        where_clause.push_bind_unseparated(resource_id);
    }
    if let Some(requester_id) = query.requester_id {
        where_clause.push("requester_id = ");
        where_clause.push_bind_unseparated(requester_id);
    }
    if let Some(active_on) = query.active_on {
        where_clause.push("start_date <= ");
        where_clause.push_bind_unseparated(active_on);
        where_clause.push("end_date > ");
        where_clause.push_bind_unseparated(active_on);
    }
    if query.status.as_ref().map(|s| !s.is_empty()).unwrap_or(false) {
        let mut statuses = vec![];
        query.status.as_ref().unwrap().iter().for_each(|s| {
            statuses.push(format!("'{s}'"));
        });
        let status_clause = statuses.join(",");
        where_clause.push(format!("status IN ({status_clause})"));
    }
    if let Some(since) = query.since {
        where_clause.push("created_at >= ");
        where_clause.push_bind_unseparated(since);
    }
    if let Some(until) = query.until {
        where_clause.push("created_at <= ");
        where_clause.push_bind_unseparated(until);
    }
    builder.push(" ORDER BY created_at ASC");

    trace!("📝️ Executing query: {}", builder.sql());
    let query = builder.build_query_as::<Booking>();
    let bookings = query.fetch_all(conn).await?;
    trace!("📝️ Result of search_bookings: {:?}", bookings.len());
    Ok(bookings)
}

/// The winner-only half of payment settlement: `Reserved` → `Confirmed`, clearing the expiry
/// deadline. Returns `None` when the hold is no longer `Reserved`.
pub async fn confirm_hold(booking_id: i64, conn: &mut SqliteConnection) -> Result<Option<Booking>, sqlx::Error> {
    let booking = sqlx::query_as(
        r#"
            UPDATE bookings SET status = 'Confirmed', expires_at = NULL, updated_at = CURRENT_TIMESTAMP
            WHERE id = $1 AND status = 'Reserved'
            RETURNING *;
        "#,
    )
    .bind(booking_id)
    .fetch_optional(conn)
    .await?;
    Ok(booking)
}

/// Every hold whose deadline has passed as of `now`, most overdue first.
pub async fn fetch_due_holds(now: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<Vec<Booking>, sqlx::Error> {
    let bookings =
        sqlx::query_as("SELECT * FROM bookings WHERE status = 'Reserved' AND expires_at <= $1 ORDER BY expires_at ASC")
            .bind(now)
            .fetch_all(conn)
            .await?;
    Ok(bookings)
}

/// Releases one overdue hold. The row must still be `Reserved` *and* still overdue when the update
/// runs, so a hold that was settled, cancelled or extended since selection matches nothing and
/// `None` comes back.
pub async fn expire_hold(
    booking_id: i64,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Booking>, sqlx::Error> {
    let booking = sqlx::query_as(
        r#"
            UPDATE bookings SET
                status = 'Cancelled',
                expires_at = NULL,
                cancel_reason = 'Expired',
                cancelled_by = 'sweeper',
                cancelled_at = $2,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $1 AND status = 'Reserved' AND expires_at <= $2
            RETURNING *;
        "#,
    )
    .bind(booking_id)
    .bind(now)
    .fetch_optional(conn)
    .await?;
    Ok(booking)
}

/// Explicit cancellation: only `Reserved` or `Confirmed` bookings can be cancelled. Releasing the
/// interval *is* this status change; there is no separate release step.
pub async fn cancel_booking(
    booking_id: i64,
    cancelled_by: &str,
    reason: CancelReason,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Booking>, sqlx::Error> {
    let booking = sqlx::query_as(
        r#"
            UPDATE bookings SET
                status = 'Cancelled',
                expires_at = NULL,
                cancel_reason = $3,
                cancelled_by = $2,
                cancelled_at = $4,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $1 AND status IN ('Reserved', 'Confirmed')
            RETURNING *;
        "#,
    )
    .bind(booking_id)
    .bind(cancelled_by)
    .bind(reason.to_string())
    .bind(now)
    .fetch_optional(conn)
    .await?;
    Ok(booking)
}

/// `Confirmed` → `Completed`, the service-consumed transition.
pub async fn complete_booking(booking_id: i64, conn: &mut SqliteConnection) -> Result<Option<Booking>, sqlx::Error> {
    let booking = sqlx::query_as(
        r#"
            UPDATE bookings SET status = 'Completed', updated_at = CURRENT_TIMESTAMP
            WHERE id = $1 AND status = 'Confirmed'
            RETURNING *;
        "#,
    )
    .bind(booking_id)
    .fetch_optional(conn)
    .await?;
    Ok(booking)
}

/// Unguarded status write for the administrative override. Keeps the row consistent with the
/// status: `Reserved` carries the supplied deadline, forcing into `Cancelled` records who forced
/// it, and leaving `Cancelled` clears the cancellation fields.
pub async fn force_status(
    booking_id: i64,
    status: BookingStatus,
    expires_at: Option<DateTime<Utc>>,
    forced_by: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Booking>, sqlx::Error> {
    let expires_at = if status == BookingStatus::Reserved { expires_at } else { None };
    let booking = match status {
        BookingStatus::Cancelled => {
            sqlx::query_as(
                r#"
                    UPDATE bookings SET
                        status = 'Cancelled',
                        expires_at = NULL,
                        cancel_reason = 'Admin',
                        cancelled_by = $2,
                        cancelled_at = CURRENT_TIMESTAMP,
                        updated_at = CURRENT_TIMESTAMP
                    WHERE id = $1
                    RETURNING *;
                "#,
            )
            .bind(booking_id)
            .bind(forced_by)
            .fetch_optional(conn)
            .await?
        },
        _ => {
            sqlx::query_as(
                r#"
                    UPDATE bookings SET
                        status = $2,
                        expires_at = $3,
                        cancel_reason = NULL,
                        cancelled_by = NULL,
                        cancelled_at = NULL,
                        updated_at = CURRENT_TIMESTAMP
                    WHERE id = $1
                    RETURNING *;
                "#,
            )
            .bind(booking_id)
            .bind(status.to_string())
            .bind(expires_at)
            .fetch_optional(conn)
            .await?
        },
    };
    Ok(booking)
}
