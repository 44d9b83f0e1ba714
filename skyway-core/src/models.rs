use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::{CoreError, CoreResult};

// ============================================================================
// Flights & Seats
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatClass {
    First,
    Business,
    Economy,
}

impl SeatClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeatClass::First => "FIRST",
            SeatClass::Business => "BUSINESS",
            SeatClass::Economy => "ECONOMY",
        }
    }
}

impl fmt::Display for SeatClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeatClass {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "FIRST" => Ok(SeatClass::First),
            "BUSINESS" => Ok(SeatClass::Business),
            "ECONOMY" => Ok(SeatClass::Economy),
            other => Err(CoreError::ValidationError(format!("Unknown seat class: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Seat {
    pub seat_number: String,
    pub seat_class: SeatClass,
    pub is_available: bool,
}

impl Seat {
    pub fn new(seat_number: impl Into<String>, seat_class: SeatClass) -> Self {
        Self {
            seat_number: seat_number.into(),
            seat_class,
            is_available: true,
        }
    }
}

/// Upper bound on seats per flight, whether listed or generated.
pub const MAX_SEATS_PER_FLIGHT: u32 = 1000;

/// Per-class seat counts used to generate a layout. Seats are numbered from "1"
/// upwards: First class first, then Business, then Economy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeatLayout {
    pub first: u32,
    pub business: u32,
    pub economy: u32,
}

impl Default for SeatLayout {
    fn default() -> Self {
        Self { first: 10, business: 20, economy: 30 }
    }
}

impl SeatLayout {
    /// `None` when the counts overflow `u32`.
    pub fn total(&self) -> Option<u32> {
        self.first.checked_add(self.business)?.checked_add(self.economy)
    }

    pub fn validate(&self) -> CoreResult<()> {
        match self.total() {
            Some(total) if total <= MAX_SEATS_PER_FLIGHT => Ok(()),
            _ => Err(CoreError::ValidationError(format!(
                "A flight may have at most {} seats",
                MAX_SEATS_PER_FLIGHT
            ))),
        }
    }

    pub fn generate(&self) -> Vec<Seat> {
        let classes = [
            (SeatClass::First, self.first),
            (SeatClass::Business, self.business),
            (SeatClass::Economy, self.economy),
        ];

        let capacity = self.total().unwrap_or(MAX_SEATS_PER_FLIGHT).min(MAX_SEATS_PER_FLIGHT);
        let mut seats = Vec::with_capacity(capacity as usize);
        let mut number = 1u64;
        for (class, count) in classes {
            for _ in 0..count {
                seats.push(Seat::new(number.to_string(), class));
                number += 1;
            }
        }
        seats
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flight {
    pub id: Uuid,
    pub flight_number: String,
    pub airline: String,
    pub origin: String,
    pub destination: String,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    pub price_amount: i32,
    pub price_currency: String,
    pub seats: Vec<Seat>,
}

impl Flight {
    pub fn seat(&self, seat_number: &str) -> Option<&Seat> {
        self.seats.iter().find(|s| s.seat_number == seat_number)
    }

    pub fn seat_mut(&mut self, seat_number: &str) -> Option<&mut Seat> {
        self.seats.iter_mut().find(|s| s.seat_number == seat_number)
    }

    pub fn total_seats(&self) -> usize {
        self.seats.len()
    }

    pub fn available_seats(&self) -> usize {
        self.seats.iter().filter(|s| s.is_available).count()
    }
}

/// Admin input for a new flight. Either an explicit seat list or a layout;
/// the default layout is used when both are absent.
#[derive(Debug, Clone, Deserialize)]
pub struct NewFlight {
    pub flight_number: String,
    #[serde(default)]
    pub airline: String,
    pub origin: String,
    pub destination: String,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    pub price_amount: i32,
    pub price_currency: Option<String>,
    pub seats: Option<Vec<NewSeat>>,
    pub layout: Option<SeatLayout>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewSeat {
    pub seat_number: String,
    pub seat_class: SeatClass,
}

impl NewFlight {
    pub fn into_flight(self, default_currency: &str) -> CoreResult<Flight> {
        let flight_number = required("flight_number", &self.flight_number)?;
        let origin = required("origin", &self.origin)?;
        let destination = required("destination", &self.destination)?;

        if origin.eq_ignore_ascii_case(&destination) {
            return Err(CoreError::ValidationError("Origin and destination must differ".to_string()));
        }
        if self.arrival_time <= self.departure_time {
            return Err(CoreError::ValidationError("Arrival must be after departure".to_string()));
        }
        if self.price_amount <= 0 {
            return Err(CoreError::ValidationError("Price must be positive".to_string()));
        }

        let seats = match (self.seats, self.layout) {
            (Some(explicit), _) => {
                if explicit.len() > MAX_SEATS_PER_FLIGHT as usize {
                    return Err(CoreError::ValidationError(format!(
                        "A flight may have at most {} seats",
                        MAX_SEATS_PER_FLIGHT
                    )));
                }
                let mut seen = HashSet::new();
                let mut seats = Vec::with_capacity(explicit.len());
                for s in explicit {
                    let number = required("seat_number", &s.seat_number)?;
                    if !seen.insert(number.clone()) {
                        return Err(CoreError::ValidationError(format!("Duplicate seat number: {}", number)));
                    }
                    seats.push(Seat::new(number, s.seat_class));
                }
                seats
            }
            (None, Some(layout)) => {
                layout.validate()?;
                layout.generate()
            }
            (None, None) => SeatLayout::default().generate(),
        };

        if seats.is_empty() {
            return Err(CoreError::ValidationError("A flight needs at least one seat".to_string()));
        }

        let price_currency = self
            .price_currency
            .map(|c| c.trim().to_ascii_uppercase())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| default_currency.to_string());

        Ok(Flight {
            id: Uuid::new_v4(),
            flight_number,
            airline: self.airline.trim().to_string(),
            origin,
            destination,
            departure_time: self.departure_time,
            arrival_time: self.arrival_time,
            price_amount: self.price_amount,
            price_currency,
            seats,
        })
    }
}

fn required(field: &str, value: &str) -> CoreResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CoreError::ValidationError(format!("Missing or empty field: {}", field)));
    }
    Ok(trimmed.to_string())
}

// ============================================================================
// Bookings
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Cancelled => "CANCELLED",
        }
    }

    /// Pending and confirmed bookings hold their seat.
    pub fn holds_seat(&self) -> bool {
        !matches!(self, BookingStatus::Cancelled)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(BookingStatus::Pending),
            "CONFIRMED" => Ok(BookingStatus::Confirmed),
            "CANCELLED" => Ok(BookingStatus::Cancelled),
            other => Err(CoreError::InternalError(format!("Unknown booking status: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub user_id: Uuid,
    pub flight_id: Uuid,
    pub seat_number: String,
    pub seat_class: SeatClass,
    pub status: BookingStatus,
    pub price_amount: i32,
    pub price_currency: String,
    pub payment_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// A fresh hold on `seat`, priced at the flight's fare.
    pub fn pending(user_id: Uuid, flight: &Flight, seat: &Seat) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            flight_id: flight.id,
            seat_number: seat.seat_number.clone(),
            seat_class: seat.seat_class,
            status: BookingStatus::Pending,
            price_amount: flight.price_amount,
            price_currency: flight.price_currency.clone(),
            payment_reference: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Confirmed sales aggregated per flight.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SalesRow {
    pub flight_id: Uuid,
    pub flight_number: String,
    pub confirmed_bookings: i64,
    pub total_revenue: i64,
    pub currency: String,
}

// ============================================================================
// Users
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Customer,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "CUSTOMER",
            Role::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CUSTOMER" => Ok(Role::Customer),
            "ADMIN" => Ok(Role::Admin),
            other => Err(CoreError::ValidationError(format!("Unknown role: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_flight() -> NewFlight {
        let departure = Utc::now() + Duration::days(3);
        NewFlight {
            flight_number: "SW100".to_string(),
            airline: "Skyway".to_string(),
            origin: "New York (JFK)".to_string(),
            destination: "Miami (MIA)".to_string(),
            departure_time: departure,
            arrival_time: departure + Duration::hours(3),
            price_amount: 25000,
            price_currency: None,
            seats: None,
            layout: None,
        }
    }

    #[test]
    fn test_default_layout_matches_class_bands() {
        let seats = SeatLayout::default().generate();
        assert_eq!(seats.len(), 60);
        assert_eq!(seats[0].seat_number, "1");
        assert_eq!(seats[0].seat_class, SeatClass::First);
        assert_eq!(seats[9].seat_class, SeatClass::First);
        assert_eq!(seats[10].seat_number, "11");
        assert_eq!(seats[10].seat_class, SeatClass::Business);
        assert_eq!(seats[30].seat_number, "31");
        assert_eq!(seats[30].seat_class, SeatClass::Economy);
        assert!(seats.iter().all(|s| s.is_available));
    }

    #[test]
    fn test_new_flight_uses_default_currency_and_layout() {
        let flight = new_flight().into_flight("USD").unwrap();
        assert_eq!(flight.price_currency, "USD");
        assert_eq!(flight.total_seats(), 60);
        assert_eq!(flight.available_seats(), 60);
    }

    #[test]
    fn test_new_flight_rejects_bad_input() {
        let mut same_city = new_flight();
        same_city.destination = "new york (jfk)".to_string();
        assert!(matches!(same_city.into_flight("USD"), Err(CoreError::ValidationError(_))));

        let mut backwards = new_flight();
        backwards.arrival_time = backwards.departure_time - Duration::hours(1);
        assert!(matches!(backwards.into_flight("USD"), Err(CoreError::ValidationError(_))));

        let mut free = new_flight();
        free.price_amount = 0;
        assert!(matches!(free.into_flight("USD"), Err(CoreError::ValidationError(_))));

        let mut duplicate = new_flight();
        duplicate.seats = Some(vec![
            NewSeat { seat_number: "1".to_string(), seat_class: SeatClass::Economy },
            NewSeat { seat_number: "1".to_string(), seat_class: SeatClass::Economy },
        ]);
        assert!(matches!(duplicate.into_flight("USD"), Err(CoreError::ValidationError(_))));
    }

    #[test]
    fn test_new_flight_rejects_oversized_layouts() {
        let mut overflowing = new_flight();
        overflowing.layout = Some(SeatLayout { first: u32::MAX, business: 1, economy: 0 });
        assert!(matches!(overflowing.into_flight("USD"), Err(CoreError::ValidationError(_))));

        let mut huge = new_flight();
        huge.layout = Some(SeatLayout { first: 0, business: 0, economy: 2_000_000_000 });
        assert!(matches!(huge.into_flight("USD"), Err(CoreError::ValidationError(_))));

        let mut at_cap = new_flight();
        at_cap.layout = Some(SeatLayout { first: 0, business: 0, economy: MAX_SEATS_PER_FLIGHT });
        assert_eq!(at_cap.into_flight("USD").unwrap().total_seats(), MAX_SEATS_PER_FLIGHT as usize);

        let mut long_list = new_flight();
        long_list.seats = Some(
            (1..=MAX_SEATS_PER_FLIGHT + 1)
                .map(|n| NewSeat { seat_number: n.to_string(), seat_class: SeatClass::Economy })
                .collect(),
        );
        assert!(matches!(long_list.into_flight("USD"), Err(CoreError::ValidationError(_))));

        assert_eq!(SeatLayout { first: u32::MAX, business: 1, economy: 0 }.total(), None);
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("CONFIRMED".parse::<BookingStatus>().unwrap(), BookingStatus::Confirmed);
        assert!(BookingStatus::Pending.holds_seat());
        assert!(!BookingStatus::Cancelled.holds_seat());
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
    }

    #[test]
    fn test_password_hash_is_not_serialized() {
        let user = User {
            id: Uuid::new_v4(),
            name: "Jane".to_string(),
            email: "jane@example.com".to_string(),
            password_hash: "$2b$04$secret".to_string(),
            role: Role::Customer,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "CUSTOMER");
    }
}
