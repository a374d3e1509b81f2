//! Weighted-average cost calculation.

use rust_decimal::Decimal;

/// Computes the new weighted-average cost after an IN movement:
///
/// `(current_stock * current_cost + qty_in * cost_in) / (current_stock + qty_in)`
///
/// Returns zero when the resulting stock would be zero or negative, so a
/// first entry against an empty stock row yields exactly `cost_in`.
#[must_use]
pub fn weighted_average_cost(
    current_stock: Decimal,
    current_cost: Decimal,
    qty_in: Decimal,
    cost_in: Decimal,
) -> Decimal {
    let total_qty = current_stock + qty_in;
    if total_qty <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let total_value = current_stock * current_cost + qty_in * cost_in;
    total_value / total_qty
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn first_entry_takes_entry_cost() {
        let cost = weighted_average_cost(dec!(0), dec!(0), dec!(10), dec!(50));
        assert_eq!(cost, dec!(50));
    }

    #[test]
    fn averages_existing_and_incoming() {
        // 10 units at 100 plus 10 units at 200 -> 150
        let cost = weighted_average_cost(dec!(10), dec!(100), dec!(10), dec!(200));
        assert_eq!(cost, dec!(150));
    }

    #[test]
    fn uneven_quantities_weight_the_average() {
        // 30 units at 10 plus 10 units at 50 -> (300 + 500) / 40 = 20
        let cost = weighted_average_cost(dec!(30), dec!(10), dec!(10), dec!(50));
        assert_eq!(cost, dec!(20));
    }

    #[test]
    fn zero_total_guards_division() {
        let cost = weighted_average_cost(dec!(0), dec!(0), dec!(0), dec!(50));
        assert_eq!(cost, Decimal::ZERO);
    }
}
