use serde::Serialize;
use crate::models::PaymentType;

/// Share of the total collected up front for DEPOSIT bookings.
pub const DEPOSIT_RATE: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Quote {
    pub total: i64,
    pub deposit: i64,
    pub remaining: i64,
    /// What the customer pays now: the deposit, or the full total.
    pub amount_due: i64,
}

/// Price a booking of `hours` whole hours at `price_per_hour`.
///
/// The deposit is rounded half-up to the nearest currency unit and the
/// remainder absorbs the rounding, so `deposit + remaining == total` holds
/// for every positive total.
pub fn quote(price_per_hour: i64, hours: i64, payment_type: PaymentType) -> Quote {
    let total = price_per_hour * hours;
    match payment_type {
        PaymentType::FULL => Quote {
            total,
            deposit: 0,
            remaining: 0,
            amount_due: total,
        },
        PaymentType::DEPOSIT => {
            let deposit = (total as f64 * DEPOSIT_RATE).round() as i64;
            Quote {
                total,
                deposit,
                remaining: total - deposit,
                amount_due: deposit,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_payment_has_no_split() {
        let q = quote(100_000, 2, PaymentType::FULL);
        assert_eq!(q.total, 200_000);
        assert_eq!(q.deposit, 0);
        assert_eq!(q.remaining, 0);
        assert_eq!(q.amount_due, 200_000);
    }

    #[test]
    fn deposit_is_thirty_percent() {
        let q = quote(100_000, 2, PaymentType::DEPOSIT);
        assert_eq!(q.total, 200_000);
        assert_eq!(q.deposit, 60_000);
        assert_eq!(q.remaining, 140_000);
        assert_eq!(q.amount_due, 60_000);
    }

    #[test]
    fn deposit_rounds_half_up() {
        // 30% of 45 is 13.5, which rounds up to 14.
        let q = quote(45, 1, PaymentType::DEPOSIT);
        assert_eq!(q.deposit, 14);
        assert_eq!(q.remaining, 31);
    }

    #[test]
    fn split_always_sums_to_total() {
        for rate in [1, 7, 99, 12_345, 100_000, 250_000] {
            for hours in 1..=8 {
                let q = quote(rate, hours, PaymentType::DEPOSIT);
                assert_eq!(q.deposit + q.remaining, q.total, "rate={} hours={}", rate, hours);
                assert_eq!(q.deposit, ((rate * hours) as f64 * 0.3).round() as i64);
            }
        }
    }
}
