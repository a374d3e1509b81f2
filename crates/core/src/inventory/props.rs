//! Property-based tests for the weighted-average cost calculation.

use proptest::prelude::*;
use rust_decimal::Decimal;

use super::cost::weighted_average_cost;

/// Strategy for stock quantities (0.0000 to 10,000.0000).
fn quantity() -> impl Strategy<Value = Decimal> {
    (0i64..100_000_000i64).prop_map(|v| Decimal::new(v, 4))
}

/// Strategy for positive quantities (at least 0.0001).
fn positive_quantity() -> impl Strategy<Value = Decimal> {
    (1i64..100_000_000i64).prop_map(|v| Decimal::new(v, 4))
}

/// Strategy for unit costs (0.0000 to 100,000.0000).
fn cost() -> impl Strategy<Value = Decimal> {
    (0i64..1_000_000_000i64).prop_map(|v| Decimal::new(v, 4))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// The average never leaves the interval spanned by the two costs.
    #[test]
    fn average_is_bounded_by_inputs(
        stock in quantity(),
        current in cost(),
        qty in positive_quantity(),
        incoming in cost(),
    ) {
        let avg = weighted_average_cost(stock, current, qty, incoming);
        let lo = current.min(incoming);
        let hi = current.max(incoming);
        if stock.is_zero() {
            prop_assert_eq!(avg, incoming);
        } else {
            prop_assert!(avg >= lo && avg <= hi);
        }
    }

    /// The average is never negative for non-negative inputs.
    #[test]
    fn average_is_non_negative(
        stock in quantity(),
        current in cost(),
        qty in quantity(),
        incoming in cost(),
    ) {
        prop_assert!(weighted_average_cost(stock, current, qty, incoming) >= Decimal::ZERO);
    }

    /// Entering stock at the current cost leaves the cost unchanged.
    #[test]
    fn entry_at_current_cost_is_identity(
        stock in positive_quantity(),
        current in cost(),
        qty in positive_quantity(),
    ) {
        let avg = weighted_average_cost(stock, current, qty, current);
        prop_assert_eq!(avg.round_dp(4), current.round_dp(4));
    }
}
