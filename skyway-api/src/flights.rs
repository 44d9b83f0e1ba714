use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Extension, Json, Router,
};
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use uuid::Uuid;

use skyway_core::models::{Booking, Flight, Seat};
use skyway_core::search::{FlightOption, FlightSearchQuery, FlightSearchResult};

use crate::bookings::claim_seat;
use crate::error::AppError;
use crate::middleware::auth::{auth_middleware, AuthUser};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SelectSeatRequest {
    pub seat_number: String,
}

#[derive(Debug, Serialize)]
pub struct SeatMap {
    pub flight_id: Uuid,
    pub flight_number: String,
    pub total_seats: usize,
    pub available_seats: usize,
    pub booked_seats: usize,
    pub seats: Vec<Seat>,
}

impl From<Flight> for SeatMap {
    fn from(f: Flight) -> Self {
        let total_seats = f.total_seats();
        let available_seats = f.available_seats();
        Self {
            flight_id: f.id,
            flight_number: f.flight_number,
            total_seats,
            available_seats,
            booked_seats: total_seats - available_seats,
            seats: f.seats,
        }
    }
}

pub fn routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/v1/flights/{id}/seats/select", post(select_seat))
        .route_layer(from_fn_with_state(state, auth_middleware));

    Router::new()
        .route("/v1/flights", get(search_flights))
        .route("/v1/flights/{id}", get(get_flight))
        .route("/v1/flights/{id}/seats", get(get_seat_map))
        .route("/v1/flights/{id}/seats/stream", get(seat_stream))
        .merge(protected)
}

async fn search_flights(
    State(state): State<AppState>,
    Query(query): Query<FlightSearchQuery>,
) -> Result<Json<FlightSearchResult>, AppError> {
    let query = query.normalized();
    let flights = state.flights.search_flights(&query).await?;
    tracing::debug!("Flight search {:?} matched {} flights", query, flights.len());

    Ok(Json(FlightSearchResult {
        flights: flights.iter().map(FlightOption::from).collect(),
    }))
}

async fn load_flight(state: &AppState, id: Uuid) -> Result<Flight, AppError> {
    state
        .flights
        .get_flight(id)
        .await?
        .ok_or_else(|| AppError::NotFoundError(format!("Flight {} not found", id)))
}

async fn get_flight(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<FlightOption>, AppError> {
    let flight = load_flight(&state, id).await?;
    Ok(Json(FlightOption::from(&flight)))
}

async fn get_seat_map(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SeatMap>, AppError> {
    let flight = load_flight(&state, id).await?;
    Ok(Json(SeatMap::from(flight)))
}

/// Live `seat_claimed` / `seat_released` events for one flight.
async fn seat_stream(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    load_flight(&state, id).await?;

    let rx = state.sse_tx.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(move |result| match result {
        Ok(event) if event.flight_id == id => {
            let data = serde_json::to_string(&event).unwrap_or_default();
            Some(Ok::<_, Infallible>(Event::default().event(event.kind.as_str()).data(data)))
        }
        Ok(_) => None,
        // Lagged receivers skip what they missed
        Err(_) => None,
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

async fn select_seat(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<SelectSeatRequest>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let booking = claim_seat(&state, &auth, id, &req.seat_number).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}
