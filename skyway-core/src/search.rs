use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, NaiveDate, Utc};

use crate::models::Flight;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FlightSearchQuery {
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub date: Option<NaiveDate>, // departure date in UTC
}

impl FlightSearchQuery {
    /// Trims the text filters and drops the empty ones.
    pub fn normalized(self) -> Self {
        fn clean(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }

        Self {
            origin: clean(self.origin),
            destination: clean(self.destination),
            date: self.date,
        }
    }

    /// Case-insensitive substring match on origin/destination, exact match on date.
    pub fn matches(&self, flight: &Flight) -> bool {
        fn contains(haystack: &str, needle: &Option<String>) -> bool {
            match needle {
                Some(n) => haystack.to_lowercase().contains(&n.to_lowercase()),
                None => true,
            }
        }

        let date_ok = match self.date {
            Some(d) => flight.departure_time.date_naive() == d,
            None => true,
        };

        date_ok && contains(&flight.origin, &self.origin) && contains(&flight.destination, &self.destination)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FlightSearchResult {
    pub flights: Vec<FlightOption>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FlightOption {
    pub flight_id: Uuid,
    pub flight_number: String,
    pub airline: String,
    pub origin: String,
    pub destination: String,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    pub price_amount: i32,
    pub price_currency: String,
    pub total_seats: usize,
    pub remaining_seats: usize,
}

impl From<&Flight> for FlightOption {
    fn from(f: &Flight) -> Self {
        Self {
            flight_id: f.id,
            flight_number: f.flight_number.clone(),
            airline: f.airline.clone(),
            origin: f.origin.clone(),
            destination: f.destination.clone(),
            departure_time: f.departure_time,
            arrival_time: f.arrival_time,
            price_amount: f.price_amount,
            price_currency: f.price_currency.clone(),
            total_seats: f.total_seats(),
            remaining_seats: f.available_seats(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SeatLayout;
    use chrono::TimeZone;

    fn flight(origin: &str, destination: &str, departure: DateTime<Utc>) -> Flight {
        Flight {
            id: Uuid::new_v4(),
            flight_number: "SW1".to_string(),
            airline: "Skyway".to_string(),
            origin: origin.to_string(),
            destination: destination.to_string(),
            departure_time: departure,
            arrival_time: departure + chrono::Duration::hours(2),
            price_amount: 10000,
            price_currency: "USD".to_string(),
            seats: SeatLayout { first: 0, business: 0, economy: 3 }.generate(),
        }
    }

    #[test]
    fn test_query_deserialization() {
        let json = r#"{ "origin": "jfk", "date": "2024-12-25" }"#;
        let query: FlightSearchQuery = serde_json::from_str(json).expect("Failed to deserialize");
        assert_eq!(query.origin.as_deref(), Some("jfk"));
        assert!(query.destination.is_none());
        assert_eq!(query.date, NaiveDate::from_ymd_opt(2024, 12, 25));
    }

    #[test]
    fn test_partial_case_insensitive_match() {
        let departure = Utc.with_ymd_and_hms(2024, 12, 25, 9, 30, 0).unwrap();
        let f = flight("New York (JFK)", "Los Angeles (LAX)", departure);

        let query = FlightSearchQuery {
            origin: Some("  new york ".to_string()),
            destination: Some("lax".to_string()),
            date: None,
        }
        .normalized();
        assert!(query.matches(&f));

        let wrong_way = FlightSearchQuery {
            origin: Some("LAX".to_string()),
            ..Default::default()
        };
        assert!(!wrong_way.matches(&f));
    }

    #[test]
    fn test_date_must_match_departure_day() {
        let departure = Utc.with_ymd_and_hms(2024, 12, 25, 23, 0, 0).unwrap();
        let f = flight("Chicago (ORD)", "Miami (MIA)", departure);

        let same_day = FlightSearchQuery { date: NaiveDate::from_ymd_opt(2024, 12, 25), ..Default::default() };
        let next_day = FlightSearchQuery { date: NaiveDate::from_ymd_opt(2024, 12, 26), ..Default::default() };
        assert!(same_day.matches(&f));
        assert!(!next_day.matches(&f));
    }

    #[test]
    fn test_blank_filters_are_ignored() {
        let query = FlightSearchQuery {
            origin: Some("   ".to_string()),
            destination: Some(String::new()),
            date: None,
        }
        .normalized();
        assert!(query.origin.is_none());
        assert!(query.destination.is_none());
    }

    #[test]
    fn test_option_counts_seats() {
        let mut f = flight("A", "B", Utc::now());
        f.seats[0].is_available = false;
        let option = FlightOption::from(&f);
        assert_eq!(option.total_seats, 3);
        assert_eq!(option.remaining_seats, 2);
    }
}
