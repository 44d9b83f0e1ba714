use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use skyway_core::models::{Flight, Seat};
use skyway_core::repository::FlightRepository;
use skyway_core::search::FlightSearchQuery;
use skyway_core::CoreResult;

use crate::database::db_error;

pub struct PostgresFlightRepository {
    pool: PgPool,
}

impl PostgresFlightRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_seats(&self, flight_ids: &[Uuid]) -> CoreResult<HashMap<Uuid, Vec<Seat>>> {
        let rows: Vec<SeatRow> = sqlx::query_as(
            r#"
            SELECT flight_id, seat_number, seat_class, is_available
            FROM seats
            WHERE flight_id = ANY($1)
            ORDER BY flight_id, position
            "#,
        )
        .bind(flight_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        let mut seats: HashMap<Uuid, Vec<Seat>> = HashMap::new();
        for row in rows {
            seats.entry(row.flight_id).or_default().push(Seat {
                seat_class: row.seat_class.parse()?,
                seat_number: row.seat_number,
                is_available: row.is_available,
            });
        }
        Ok(seats)
    }
}

#[derive(sqlx::FromRow)]
struct FlightRow {
    id: Uuid,
    flight_number: String,
    airline: String,
    origin: String,
    destination: String,
    departure_time: DateTime<Utc>,
    arrival_time: DateTime<Utc>,
    price_amount: i32,
    price_currency: String,
}

impl FlightRow {
    fn into_flight(self, seats: Vec<Seat>) -> Flight {
        Flight {
            id: self.id,
            flight_number: self.flight_number,
            airline: self.airline,
            origin: self.origin,
            destination: self.destination,
            departure_time: self.departure_time,
            arrival_time: self.arrival_time,
            price_amount: self.price_amount,
            price_currency: self.price_currency,
            seats,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SeatRow {
    flight_id: Uuid,
    seat_number: String,
    seat_class: String,
    is_available: bool,
}

/// Escapes LIKE wildcards so user input only matches literally.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[async_trait]
impl FlightRepository for PostgresFlightRepository {
    async fn create_flight(&self, flight: &Flight) -> CoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        sqlx::query(
            r#"
            INSERT INTO flights (id, flight_number, airline, origin, destination, departure_time, arrival_time, price_amount, price_currency)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(flight.id)
        .bind(&flight.flight_number)
        .bind(&flight.airline)
        .bind(&flight.origin)
        .bind(&flight.destination)
        .bind(flight.departure_time)
        .bind(flight.arrival_time)
        .bind(flight.price_amount)
        .bind(&flight.price_currency)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        for (position, seat) in flight.seats.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO seats (flight_id, seat_number, seat_class, is_available, position)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(flight.id)
            .bind(&seat.seat_number)
            .bind(seat.seat_class.as_str())
            .bind(seat.is_available)
            .bind(position as i32)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        }

        tx.commit().await.map_err(db_error)?;
        Ok(())
    }

    async fn get_flight(&self, id: Uuid) -> CoreResult<Option<Flight>> {
        let row: Option<FlightRow> = sqlx::query_as(
            r#"
            SELECT id, flight_number, airline, origin, destination, departure_time, arrival_time, price_amount, price_currency
            FROM flights
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut seats = self.load_seats(&[id]).await?;
        Ok(Some(row.into_flight(seats.remove(&id).unwrap_or_default())))
    }

    async fn search_flights(&self, query: &FlightSearchQuery) -> CoreResult<Vec<Flight>> {
        let origin = query.origin.as_deref().map(like_pattern);
        let destination = query.destination.as_deref().map(like_pattern);

        let rows: Vec<FlightRow> = sqlx::query_as(
            r#"
            SELECT id, flight_number, airline, origin, destination, departure_time, arrival_time, price_amount, price_currency
            FROM flights
            WHERE ($1::TEXT IS NULL OR origin ILIKE $1)
              AND ($2::TEXT IS NULL OR destination ILIKE $2)
              AND ($3::DATE IS NULL OR (departure_time AT TIME ZONE 'UTC')::DATE = $3)
            ORDER BY departure_time
            "#,
        )
        .bind(origin)
        .bind(destination)
        .bind(query.date)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut seats = self.load_seats(&ids).await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let flight_seats = seats.remove(&row.id).unwrap_or_default();
                row.into_flight(flight_seats)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("jfk"), "%jfk%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }
}
