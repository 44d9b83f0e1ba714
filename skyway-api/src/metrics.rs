use axum::{extract::State, http::header, response::IntoResponse};
use prometheus::{opts, Encoder, IntCounter, IntCounterVec, Registry, TextEncoder};

use crate::error::AppError;
use crate::state::AppState;

/// Business counters scraped at `/metrics`. Each state owns its registry so
/// test apps never collide on registration.
pub struct Metrics {
    registry: Registry,
    /// Labels: `outcome` (claimed, conflict, rejected)
    seat_claims: IntCounterVec,
    /// Labels: `outcome` (succeeded, declined, invalid)
    payments: IntCounterVec,
    holds_released: IntCounter,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let seat_claims = IntCounterVec::new(
            opts!("skyway_seat_claims_total", "Seat claim attempts by outcome"),
            &["outcome"],
        )?;
        let payments = IntCounterVec::new(
            opts!("skyway_payments_total", "Payment attempts by outcome"),
            &["outcome"],
        )?;
        let holds_released = IntCounter::new(
            "skyway_holds_released_total",
            "Pending bookings cancelled after their hold expired",
        )?;

        registry.register(Box::new(seat_claims.clone()))?;
        registry.register(Box::new(payments.clone()))?;
        registry.register(Box::new(holds_released.clone()))?;

        Ok(Self { registry, seat_claims, payments, holds_released })
    }

    pub fn record_seat_claim(&self, outcome: &str) {
        self.seat_claims.with_label_values(&[outcome]).inc();
    }

    pub fn record_payment(&self, outcome: &str) {
        self.payments.with_label_values(&[outcome]).inc();
    }

    pub fn record_holds_released(&self, count: usize) {
        self.holds_released.inc_by(count as u64);
    }

    /// Prometheus text exposition format.
    pub fn export(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

pub async fn metrics_handler(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let body = state
        .metrics
        .export()
        .map_err(|e| AppError::InternalServerError(format!("Metrics encoding failed: {}", e)))?;

    Ok(([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_contains_counters() {
        let metrics = Metrics::new().unwrap();
        metrics.record_seat_claim("claimed");
        metrics.record_seat_claim("conflict");
        metrics.record_payment("declined");
        metrics.record_holds_released(3);

        let text = metrics.export().unwrap();
        assert!(text.contains("skyway_seat_claims_total{outcome=\"claimed\"} 1"));
        assert!(text.contains("skyway_payments_total{outcome=\"declined\"} 1"));
        assert!(text.contains("skyway_holds_released_total 3"));
    }
}
