use axum::{
    extract::State,
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{get, post},
    Extension, Json, Router,
};

use skyway_core::access::Capability;
use skyway_core::models::{Flight, NewFlight, SalesRow};

use crate::error::AppError;
use crate::middleware::auth::{auth_middleware, AuthUser};
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/v1/admin/flights", post(create_flight))
        .route("/v1/admin/sales", get(sales_report))
        .route_layer(from_fn_with_state(state, auth_middleware))
}

async fn create_flight(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<NewFlight>,
) -> Result<(StatusCode, Json<Flight>), AppError> {
    auth.require(Capability::ManageFlights)?;

    let flight = req.into_flight(&state.business_rules.default_currency)?;
    state.flights.create_flight(&flight).await?;

    tracing::info!(
        "Admin {} created flight {} ({} -> {}, {} seats)",
        auth.user_id(), flight.flight_number, flight.origin, flight.destination, flight.total_seats()
    );
    Ok((StatusCode::CREATED, Json(flight)))
}

async fn sales_report(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<SalesRow>>, AppError> {
    auth.require(Capability::ViewSales)?;
    let rows = state.booking_service.sales_report(&auth.principal).await?;
    Ok(Json(rows))
}
