use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use skyway_shared::pii::{card_tail, Masked};
use uuid::Uuid;

use crate::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Succeeded,
    Declined,
}

/// Card details as submitted by the customer. Never logged unmasked.
#[derive(Debug, Clone, Deserialize)]
pub struct CardDetails {
    pub card_number: Masked<String>,
    pub expiry: String, // MM/YY
    pub cvv: Masked<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub booking_id: Uuid,
    pub amount: i32,
    pub currency: String,
    pub status: PaymentStatus,
    pub transaction_id: Option<String>,
    pub card_last4: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait PaymentAdapter: Send + Sync {
    /// Validates the card and charges it. Malformed cards fail with
    /// `ValidationError`; a processed but refused charge returns `Declined`.
    async fn process_payment(
        &self,
        booking_id: Uuid,
        amount: i32,
        currency: &str,
        card: &CardDetails,
    ) -> CoreResult<PaymentIntent>;
}

// ============================================================================
// Card validation
// ============================================================================

/// Luhn checksum over a string of ASCII digits.
pub fn luhn_valid(digits: &str) -> bool {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }

    let sum: u32 = digits
        .bytes()
        .rev()
        .enumerate()
        .map(|(i, b)| {
            let d = u32::from(b - b'0');
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                d
            }
        })
        .sum();

    sum % 10 == 0
}

/// Strips spaces and dashes, then requires exactly 16 digits passing Luhn.
pub fn normalize_card_number(raw: &str) -> CoreResult<String> {
    let compact: String = raw.chars().filter(|c| *c != ' ' && *c != '-').collect();

    if compact.len() != 16 || !compact.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CoreError::ValidationError("Card number must be 16 digits".to_string()));
    }
    if !luhn_valid(&compact) {
        return Err(CoreError::ValidationError("Invalid card number".to_string()));
    }
    Ok(compact)
}

/// `MM/YY`; the card is valid through the last day of that month.
pub fn validate_expiry(expiry: &str, today: NaiveDate) -> CoreResult<()> {
    let invalid = || CoreError::ValidationError("Invalid expiry date format (MM/YY)".to_string());

    let (mm, yy) = expiry.trim().split_once('/').ok_or_else(invalid)?;
    if mm.len() != 2 || yy.len() != 2 {
        return Err(invalid());
    }
    let month: u32 = mm.parse().map_err(|_| invalid())?;
    let year: i32 = yy.parse().map_err(|_| invalid())?;
    if !(1..=12).contains(&month) {
        return Err(invalid());
    }

    let year = 2000 + year;
    if (year, month) < (today.year(), today.month()) {
        return Err(CoreError::ValidationError("Card has expired".to_string()));
    }
    Ok(())
}

pub fn validate_cvv(cvv: &str) -> CoreResult<()> {
    if cvv.len() == 3 && cvv.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(CoreError::ValidationError("Invalid CVV".to_string()))
    }
}

pub fn validate_card(card: &CardDetails, today: NaiveDate) -> CoreResult<String> {
    let number = normalize_card_number(card.card_number.expose())?;
    validate_expiry(&card.expiry, today)?;
    validate_cvv(card.cvv.expose())?;
    Ok(number)
}

// ============================================================================
// Mock gateway
// ============================================================================

/// Stand-in processor: format checks, then a weighted coin flip.
pub struct MockPaymentGateway {
    success_rate: f64,
}

impl MockPaymentGateway {
    pub fn new(success_rate: f64) -> Self {
        Self {
            // NaN would make `gen_bool` panic
            success_rate: if success_rate.is_finite() { success_rate.clamp(0.0, 1.0) } else { 0.5 },
        }
    }

    fn approve(&self) -> bool {
        rand::thread_rng().gen_bool(self.success_rate)
    }
}

impl Default for MockPaymentGateway {
    fn default() -> Self {
        Self::new(0.5)
    }
}

#[async_trait]
impl PaymentAdapter for MockPaymentGateway {
    async fn process_payment(
        &self,
        booking_id: Uuid,
        amount: i32,
        currency: &str,
        card: &CardDetails,
    ) -> CoreResult<PaymentIntent> {
        let now = Utc::now();
        let number = validate_card(card, now.date_naive())?;
        let card_last4 = card_tail(&number);

        let (status, transaction_id) = if self.approve() {
            (PaymentStatus::Succeeded, Some(format!("txn_{}", Uuid::new_v4().simple())))
        } else {
            (PaymentStatus::Declined, None)
        };

        tracing::info!(
            "Mock payment for booking {} ({} {}) with card {}: {:?}",
            booking_id, amount, currency, card_last4, status
        );

        Ok(PaymentIntent {
            booking_id,
            amount,
            currency: currency.to_string(),
            status,
            transaction_id,
            card_last4,
            created_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(number: &str, expiry: &str, cvv: &str) -> CardDetails {
        CardDetails {
            card_number: Masked::new(number.to_string()),
            expiry: expiry.to_string(),
            cvv: Masked::new(cvv.to_string()),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, 15).unwrap()
    }

    #[test]
    fn test_luhn() {
        assert!(luhn_valid("4111111111111111"));
        assert!(luhn_valid("5555555555554444"));
        assert!(!luhn_valid("4111111111111112"));
        assert!(!luhn_valid("41111111111a1111"));
        assert!(!luhn_valid(""));
    }

    #[test]
    fn test_card_number_format() {
        assert_eq!(normalize_card_number("4111 1111-1111 1111").unwrap(), "4111111111111111");
        assert!(normalize_card_number("411111111111111").is_err());
        assert!(normalize_card_number("41111111111111111").is_err());
        assert!(normalize_card_number("4111111111111112").is_err());
    }

    #[test]
    fn test_expiry() {
        assert!(validate_expiry("06/26", today()).is_ok());
        assert!(validate_expiry("01/30", today()).is_ok());
        assert!(validate_expiry("05/26", today()).is_err());
        assert!(validate_expiry("13/27", today()).is_err());
        assert!(validate_expiry("6/27", today()).is_err());
        assert!(validate_expiry("0627", today()).is_err());
    }

    #[test]
    fn test_cvv() {
        assert!(validate_cvv("123").is_ok());
        assert!(validate_cvv("12").is_err());
        assert!(validate_cvv("1234").is_err());
        assert!(validate_cvv("12a").is_err());
    }

    #[tokio::test]
    async fn test_luhn_failure_rejected_even_when_gateway_always_approves() {
        let gateway = MockPaymentGateway::new(1.0);
        let result = gateway
            .process_payment(Uuid::new_v4(), 1000, "USD", &card("4111111111111112", "12/99", "123"))
            .await;
        assert!(matches!(result, Err(CoreError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_gateway_outcomes() {
        let good = card("4111111111111111", "12/99", "123");

        let approve = MockPaymentGateway::new(1.0);
        let intent = approve.process_payment(Uuid::new_v4(), 1000, "USD", &good).await.unwrap();
        assert_eq!(intent.status, PaymentStatus::Succeeded);
        let txn = intent.transaction_id.unwrap();
        assert!(txn.starts_with("txn_"));
        assert_eq!(txn.len(), 4 + 32);
        assert_eq!(intent.card_last4, "************1111");

        let decline = MockPaymentGateway::new(0.0);
        let intent = decline.process_payment(Uuid::new_v4(), 1000, "USD", &good).await.unwrap();
        assert_eq!(intent.status, PaymentStatus::Declined);
        assert!(intent.transaction_id.is_none());
    }

    #[tokio::test]
    async fn test_non_finite_success_rate_falls_back_to_even_odds() {
        let good = card("4111111111111111", "12/99", "123");
        for rate in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let gateway = MockPaymentGateway::new(rate);
            assert_eq!(gateway.success_rate, 0.5);
            assert!(gateway.process_payment(Uuid::new_v4(), 1000, "USD", &good).await.is_ok());
        }
        assert_eq!(MockPaymentGateway::new(7.0).success_rate, 1.0);
        assert_eq!(MockPaymentGateway::new(-1.0).success_rate, 0.0);
    }
}
