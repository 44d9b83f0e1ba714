use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Seat map change broadcast to live subscribers and published to the event bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeatEvent {
    pub kind: SeatEventKind,
    pub flight_id: Uuid,
    pub seat_number: String,
    pub booking_id: Uuid,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SeatEventKind {
    SeatClaimed,
    SeatReleased,
}

impl SeatEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeatEventKind::SeatClaimed => "seat_claimed",
            SeatEventKind::SeatReleased => "seat_released",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingConfirmedEvent {
    pub booking_id: Uuid,
    pub flight_id: Uuid,
    pub user_id: Uuid,
    pub seat_number: String,
    pub amount: i32,
    pub currency: String,
    pub transaction_id: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingCancelledEvent {
    pub booking_id: Uuid,
    pub flight_id: Uuid,
    pub seat_number: String,
    pub reason: String,
    pub timestamp: i64,
}
