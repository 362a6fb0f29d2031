//! Limits and overflow-checked arithmetic for monetary amounts.
//!
//! `Decimal` operators panic on overflow. Every sum, quotient and product over
//! stored amounts goes through these helpers instead and surfaces overflow as a
//! [`ComputeError`].

use rust_decimal::Decimal;

use crate::error::{ComputeError, Result};

/// Amounts must stay strictly below this value (10^8).
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(100_000_000, 0, 0, false, 0);

/// Decimal places an amount may carry.
pub const AMOUNT_DECIMAL_PLACES: u32 = 2;

/// True when the amount is positive, below [`MAX_AMOUNT`] and has at most two
/// significant decimal places.
pub fn is_valid_amount(amount: &Decimal) -> bool {
    *amount > Decimal::ZERO
        && *amount < MAX_AMOUNT
        && amount.normalize().scale() <= AMOUNT_DECIMAL_PLACES
}

pub fn checked_add(lhs: Decimal, rhs: Decimal) -> Result<Decimal> {
    lhs.checked_add(rhs)
        .ok_or_else(|| ComputeError::Runtime(format!("Amount overflow adding {} and {}", lhs, rhs)))
}

/// Sum of all amounts, failing on overflow.
pub fn checked_sum<I>(amounts: I) -> Result<Decimal>
where
    I: IntoIterator<Item = Decimal>,
{
    amounts
        .into_iter()
        .try_fold(Decimal::ZERO, checked_add)
}

/// `part / whole * 100`, or zero when `whole` is not positive.
pub fn checked_percentage(part: Decimal, whole: Decimal) -> Result<Decimal> {
    if whole <= Decimal::ZERO {
        return Ok(Decimal::ZERO);
    }
    part.checked_div(whole)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .ok_or_else(|| {
            ComputeError::Budget(format!("Percentage of {} over {} overflowed", part, whole))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(value: &str) -> Decimal {
        value.parse().unwrap()
    }

    #[test]
    fn test_amount_limits() {
        assert!(is_valid_amount(&dec("0.01")));
        assert!(is_valid_amount(&dec("99999999.99")));
        assert!(is_valid_amount(&dec("5.000")));

        assert!(!is_valid_amount(&Decimal::ZERO));
        assert!(!is_valid_amount(&dec("-1")));
        assert!(!is_valid_amount(&dec("100000000")));
        assert!(!is_valid_amount(&dec("1.001")));
    }

    #[test]
    fn test_checked_sum_overflow() {
        let huge = dec("70000000000000000000000000000");
        assert_eq!(checked_sum([dec("1.5"), dec("2.25")]).unwrap(), dec("3.75"));
        assert!(matches!(checked_sum([huge, huge]), Err(ComputeError::Runtime(_))));
    }

    #[test]
    fn test_checked_percentage_overflow() {
        assert_eq!(checked_percentage(dec("85"), dec("100")).unwrap(), dec("85"));
        assert_eq!(checked_percentage(dec("5"), Decimal::ZERO).unwrap(), Decimal::ZERO);

        let result = checked_percentage(dec("1000000000000000000000"), dec("0.0000000001"));
        assert!(matches!(result, Err(ComputeError::Budget(_))));
    }
}
