use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use skyway_core::models::{Booking, SalesRow};
use skyway_core::repository::BookingRepository;
use skyway_core::{CoreError, CoreResult};

use crate::database::{db_error, is_unique_violation};

/// Seat claims run as one transaction: a conditional `UPDATE seats ... WHERE
/// is_available` takes the row lock and flips the flag, then the booking is
/// inserted. A concurrent claimer blocks on the row lock and re-evaluates the
/// condition after commit, so it sees zero rows. The partial unique index on
/// live bookings backs this up.
pub struct PostgresBookingRepository {
    pool: PgPool,
}

impl PostgresBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn booking_exists(&self, id: Uuid) -> CoreResult<bool> {
        let row: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM bookings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(row.is_some())
    }

    /// Works out why the conditional update matched nothing.
    async fn explain_failed_claim(
        tx: &mut Transaction<'_, Postgres>,
        flight_id: Uuid,
        seat_number: &str,
    ) -> CoreResult<CoreError> {
        let seat: Option<(bool,)> = sqlx::query_as(
            "SELECT is_available FROM seats WHERE flight_id = $1 AND seat_number = $2",
        )
        .bind(flight_id)
        .bind(seat_number)
        .fetch_optional(&mut **tx)
        .await
        .map_err(db_error)?;

        if seat.is_some() {
            return Ok(CoreError::Conflict(format!("Seat {} is already taken", seat_number)));
        }

        let flight: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM flights WHERE id = $1")
            .bind(flight_id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(db_error)?;

        Ok(match flight {
            Some(_) => CoreError::ValidationError(format!("Seat {} does not exist on this flight", seat_number)),
            None => CoreError::NotFound(format!("Flight {} not found", flight_id)),
        })
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    user_id: Uuid,
    flight_id: Uuid,
    seat_number: String,
    seat_class: String,
    status: String,
    price_amount: i32,
    price_currency: String,
    payment_reference: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = CoreError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        Ok(Booking {
            id: row.id,
            user_id: row.user_id,
            flight_id: row.flight_id,
            seat_number: row.seat_number,
            seat_class: row.seat_class.parse()?,
            status: row.status.parse()?,
            price_amount: row.price_amount,
            price_currency: row.price_currency,
            payment_reference: row.payment_reference,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_bookings(rows: Vec<BookingRow>) -> CoreResult<Vec<Booking>> {
    rows.into_iter().map(Booking::try_from).collect()
}

#[derive(sqlx::FromRow)]
struct SalesRecord {
    flight_id: Uuid,
    flight_number: String,
    confirmed_bookings: i64,
    total_revenue: i64,
    currency: String,
}

#[async_trait]
impl BookingRepository for PostgresBookingRepository {
    async fn claim_seat(&self, booking: &Booking) -> CoreResult<Booking> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let claimed: Option<(String,)> = sqlx::query_as(
            r#"
            UPDATE seats SET is_available = FALSE
            WHERE flight_id = $1 AND seat_number = $2 AND is_available
            RETURNING seat_class
            "#,
        )
        .bind(booking.flight_id)
        .bind(&booking.seat_number)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error)?;

        let Some((seat_class,)) = claimed else {
            let err = Self::explain_failed_claim(&mut tx, booking.flight_id, &booking.seat_number).await?;
            tx.rollback().await.map_err(db_error)?;
            return Err(err);
        };

        let inserted: Result<BookingRow, sqlx::Error> = sqlx::query_as(
            r#"
            INSERT INTO bookings (id, user_id, flight_id, seat_number, seat_class, status, price_amount, price_currency, payment_reference, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id, user_id, flight_id, seat_number, seat_class, status, price_amount, price_currency, payment_reference, created_at, updated_at
            "#,
        )
        .bind(booking.id)
        .bind(booking.user_id)
        .bind(booking.flight_id)
        .bind(&booking.seat_number)
        .bind(&seat_class)
        .bind(booking.status.as_str())
        .bind(booking.price_amount)
        .bind(&booking.price_currency)
        .bind(&booking.payment_reference)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .fetch_one(&mut *tx)
        .await;

        let row = match inserted {
            Ok(row) => row,
            Err(e) if is_unique_violation(&e) => {
                tx.rollback().await.map_err(db_error)?;
                return Err(CoreError::Conflict(format!("Seat {} is already booked", booking.seat_number)));
            }
            Err(e) => return Err(db_error(e)),
        };

        tx.commit().await.map_err(db_error)?;
        row.try_into()
    }

    async fn confirm_booking(&self, id: Uuid, payment_reference: &str) -> CoreResult<Booking> {
        let row: Option<BookingRow> = sqlx::query_as(
            r#"
            UPDATE bookings SET status = 'CONFIRMED', payment_reference = $2, updated_at = NOW()
            WHERE id = $1 AND status = 'PENDING'
            RETURNING id, user_id, flight_id, seat_number, seat_class, status, price_amount, price_currency, payment_reference, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(payment_reference)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        match row {
            Some(row) => row.try_into(),
            None if self.booking_exists(id).await? => {
                Err(CoreError::Conflict(format!("Booking {} is no longer pending", id)))
            }
            None => Err(CoreError::NotFound(format!("Booking {} not found", id))),
        }
    }

    async fn cancel_booking(&self, id: Uuid) -> CoreResult<Booking> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let row: Option<BookingRow> = sqlx::query_as(
            r#"
            UPDATE bookings SET status = 'CANCELLED', updated_at = NOW()
            WHERE id = $1 AND status <> 'CANCELLED'
            RETURNING id, user_id, flight_id, seat_number, seat_class, status, price_amount, price_currency, payment_reference, created_at, updated_at
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error)?;

        let Some(row) = row else {
            tx.rollback().await.map_err(db_error)?;
            return if self.booking_exists(id).await? {
                Err(CoreError::Conflict(format!("Booking {} is already cancelled", id)))
            } else {
                Err(CoreError::NotFound(format!("Booking {} not found", id)))
            };
        };

        sqlx::query("UPDATE seats SET is_available = TRUE WHERE flight_id = $1 AND seat_number = $2")
            .bind(row.flight_id)
            .bind(&row.seat_number)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;
        row.try_into()
    }

    async fn get_booking(&self, id: Uuid) -> CoreResult<Option<Booking>> {
        let row: Option<BookingRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, flight_id, seat_number, seat_class, status, price_amount, price_currency, payment_reference, created_at, updated_at
            FROM bookings WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.map(Booking::try_from).transpose()
    }

    async fn list_bookings_for_user(&self, user_id: Uuid) -> CoreResult<Vec<Booking>> {
        let rows: Vec<BookingRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, flight_id, seat_number, seat_class, status, price_amount, price_currency, payment_reference, created_at, updated_at
            FROM bookings WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        into_bookings(rows)
    }

    async fn list_bookings_for_flight(&self, flight_id: Uuid) -> CoreResult<Vec<Booking>> {
        let rows: Vec<BookingRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, flight_id, seat_number, seat_class, status, price_amount, price_currency, payment_reference, created_at, updated_at
            FROM bookings WHERE flight_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(flight_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        into_bookings(rows)
    }

    async fn release_expired_holds(&self, cutoff: DateTime<Utc>) -> CoreResult<Vec<Booking>> {
        // One statement: expire the bookings and free their seats together.
        let rows: Vec<BookingRow> = sqlx::query_as(
            r#"
            WITH expired AS (
                UPDATE bookings SET status = 'CANCELLED', updated_at = NOW()
                WHERE status = 'PENDING' AND created_at < $1
                RETURNING id, user_id, flight_id, seat_number, seat_class, status, price_amount, price_currency, payment_reference, created_at, updated_at
            ), released AS (
                UPDATE seats s SET is_available = TRUE
                FROM expired e
                WHERE s.flight_id = e.flight_id AND s.seat_number = e.seat_number
            )
            SELECT * FROM expired
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        into_bookings(rows)
    }

    async fn sales_report(&self) -> CoreResult<Vec<SalesRow>> {
        let rows: Vec<SalesRecord> = sqlx::query_as(
            r#"
            SELECT f.id AS flight_id,
                   f.flight_number,
                   COUNT(b.id) AS confirmed_bookings,
                   COALESCE(SUM(b.price_amount), 0)::BIGINT AS total_revenue,
                   f.price_currency AS currency
            FROM bookings b
            JOIN flights f ON f.id = b.flight_id
            WHERE b.status = 'CONFIRMED'
            GROUP BY f.id, f.flight_number, f.price_currency
            ORDER BY total_revenue DESC, f.flight_number
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(rows
            .into_iter()
            .map(|r| SalesRow {
                flight_id: r.flight_id,
                flight_number: r.flight_number,
                confirmed_bookings: r.confirmed_bookings,
                total_revenue: r.total_revenue,
                currency: r.currency,
            })
            .collect())
    }
}
