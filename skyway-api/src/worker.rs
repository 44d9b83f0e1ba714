use chrono::{Duration as ChronoDuration, Utc};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{error, info};

use skyway_shared::models::events::{BookingCancelledEvent, SeatEventKind};
use skyway_store::events::TOPIC_BOOKINGS_CANCELLED;

use crate::error::AppError;
use crate::state::AppState;

/// Releases unpaid holds every `hold_sweep_interval_seconds`. Runs until the
/// process exits.
pub async fn start_hold_expiry_worker(state: AppState) {
    let period = Duration::from_secs(state.business_rules.hold_sweep_interval_seconds.max(1));
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        "Hold expiry worker started: holds last {}s, sweeping every {}s",
        state.business_rules.booking_hold_seconds,
        period.as_secs()
    );

    loop {
        ticker.tick().await;
        if let Err(e) = sweep_expired_holds(&state).await {
            error!("Hold sweep failed: {}", e);
        }
    }
}

/// One sweep: cancels expired pending bookings and announces the freed seats.
pub async fn sweep_expired_holds(state: &AppState) -> Result<usize, AppError> {
    let seconds = state.business_rules.booking_hold_seconds;
    let hold = i64::try_from(seconds)
        .ok()
        .and_then(ChronoDuration::try_seconds)
        .ok_or_else(|| AppError::ValidationError(format!("Booking hold of {}s is out of range", seconds)))?;
    let released = state.booking_service.release_expired_holds(hold).await?;

    for booking in &released {
        state.seat_changed(SeatEventKind::SeatReleased, booking).await;
        let event = BookingCancelledEvent {
            booking_id: booking.id,
            flight_id: booking.flight_id,
            seat_number: booking.seat_number.clone(),
            reason: "hold_expired".to_string(),
            timestamp: Utc::now().timestamp(),
        };
        state.publish(TOPIC_BOOKINGS_CANCELLED, &booking.id.to_string(), &event).await;
    }

    state.metrics.record_holds_released(released.len());
    Ok(released.len())
}
