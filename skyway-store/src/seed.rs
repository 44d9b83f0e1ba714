use chrono::{Duration, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::info;
use uuid::Uuid;

use skyway_core::models::{Flight, SeatLayout};
use skyway_core::repository::FlightRepository;
use skyway_core::CoreResult;

const AIRPORTS: &[&str] = &[
    "New York (JFK)",
    "Los Angeles (LAX)",
    "Chicago (ORD)",
    "Miami (MIA)",
    "San Francisco (SFO)",
    "Seattle (SEA)",
    "Houston (IAH)",
    "Atlanta (ATL)",
];

const AIRLINES: &[(&str, &str)] = &[
    ("DL", "Delta Airlines"),
    ("AA", "American Airlines"),
    ("UA", "United Airlines"),
    ("WN", "Southwest Airlines"),
];

/// Random flights departing 1 to 30 days from now, priced between 100.00 and
/// 1000.00 in `currency`, each with the default seat layout.
pub fn demo_flights(count: usize, currency: &str) -> Vec<Flight> {
    let mut rng = rand::thread_rng();
    let mut flights = Vec::with_capacity(count);

    for _ in 0..count {
        let origin = AIRPORTS.choose(&mut rng).copied().unwrap_or(AIRPORTS[0]);
        let destination = loop {
            let candidate = AIRPORTS.choose(&mut rng).copied().unwrap_or(AIRPORTS[1]);
            if candidate != origin {
                break candidate;
            }
        };
        let (code, airline) = AIRLINES.choose(&mut rng).copied().unwrap_or(AIRLINES[0]);

        let departure = Utc::now() + Duration::days(rng.gen_range(1..=30)) + Duration::minutes(rng.gen_range(0..24 * 60));
        let arrival = departure + Duration::hours(rng.gen_range(2..=6));

        flights.push(Flight {
            id: Uuid::new_v4(),
            flight_number: format!("{}{}", code, rng.gen_range(100..10000)),
            airline: airline.to_string(),
            origin: origin.to_string(),
            destination: destination.to_string(),
            departure_time: departure,
            arrival_time: arrival,
            price_amount: rng.gen_range(10_000..=100_000),
            price_currency: currency.to_string(),
            seats: SeatLayout::default().generate(),
        });
    }

    flights
}

/// Inserts `count` demo flights through `repo`.
pub async fn seed_demo_flights(repo: &dyn FlightRepository, count: usize, currency: &str) -> CoreResult<usize> {
    let flights = demo_flights(count, currency);
    for flight in &flights {
        repo.create_flight(flight).await?;
    }
    info!("Seeded {} demo flights", flights.len());
    Ok(flights.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use skyway_core::search::FlightSearchQuery;

    #[test]
    fn test_demo_flights_are_valid() {
        let flights = demo_flights(50, "USD");
        assert_eq!(flights.len(), 50);
        for f in &flights {
            assert_ne!(f.origin, f.destination);
            assert!(f.arrival_time > f.departure_time);
            assert!(f.departure_time > Utc::now());
            assert!((10_000..=100_000).contains(&f.price_amount));
            assert_eq!(f.total_seats(), 60);
            assert_eq!(f.available_seats(), 60);
        }
    }

    #[tokio::test]
    async fn test_seed_into_store() {
        let store = MemoryStore::new();
        let inserted = seed_demo_flights(&store, 5, "EUR").await.unwrap();
        assert_eq!(inserted, 5);

        let all = store.search_flights(&FlightSearchQuery::default()).await.unwrap();
        assert_eq!(all.len(), 5);
        assert!(all.iter().all(|f| f.price_currency == "EUR"));
    }
}
