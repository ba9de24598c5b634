//! Moving-average costing.
//!
//! Invoked by the ledger on inbound movements only. Outbound movements
//! are always valued at the current average and never trigger a
//! recomputation.

use rust_decimal::Decimal;

/// Weighted-average unit cost after receiving `inbound_qty` units at
/// `inbound_unit_cost` on top of `old_qty` units carried at `old_avg_cost`.
///
/// When the combined quantity is zero the inbound cost is returned as-is
/// (first-ever stock, or an inbound exactly cancelling negative stock).
pub fn moving_average(
    old_qty: i64,
    old_avg_cost: Decimal,
    inbound_qty: i64,
    inbound_unit_cost: Decimal,
) -> Decimal {
    let total_qty = old_qty + inbound_qty;
    if total_qty == 0 {
        return inbound_unit_cost;
    }
    let old_value = old_avg_cost * Decimal::from(old_qty);
    let inbound_value = inbound_unit_cost * Decimal::from(inbound_qty);
    (old_value + inbound_value) / Decimal::from(total_qty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal::prelude::FromPrimitive;

    fn dec(v: f64) -> Decimal {
        Decimal::from_f64(v).unwrap()
    }

    #[test]
    fn weighted_average_of_two_receipts() {
        // 100 @ 10.00 + 50 @ 16.00 = 150 @ 12.00
        let new_cost = moving_average(100, dec(10.0), 50, dec(16.0));
        assert_eq!(new_cost, dec(12.0));
    }

    #[test]
    fn first_ever_stock_takes_inbound_cost() {
        assert_eq!(moving_average(0, Decimal::ZERO, 10, dec(7.5)), dec(7.5));
    }

    #[test]
    fn zero_total_quantity_avoids_division() {
        // Negative stock brought back to exactly zero.
        assert_eq!(moving_average(-10, dec(4.0), 10, dec(6.0)), dec(6.0));
    }

    #[test]
    fn zero_inbound_is_identity() {
        assert_eq!(moving_average(40, dec(3.25), 0, dec(99.0)), dec(3.25));
    }

    proptest! {
        /// Property: receiving zero units at any cost never changes the
        /// average while stock is held.
        #[test]
        fn zero_inbound_identity(qty in 1i64..1_000_000, cost in 0u32..100_000u32, any_cost in 0u32..100_000u32) {
            let avg = Decimal::from(cost) / Decimal::from(100);
            let other = Decimal::from(any_cost) / Decimal::from(100);
            prop_assert_eq!(moving_average(qty, avg, 0, other), avg);
        }

        /// Property: the new average lies between the old average and the
        /// inbound cost (inclusive) whenever both quantities are positive.
        #[test]
        fn average_is_bounded(
            old_qty in 1i64..100_000,
            inbound_qty in 1i64..100_000,
            old_cost in 0u32..1_000_000u32,
            inbound_cost in 0u32..1_000_000u32,
        ) {
            let old = Decimal::from(old_cost) / Decimal::from(100);
            let inbound = Decimal::from(inbound_cost) / Decimal::from(100);
            let new = moving_average(old_qty, old, inbound_qty, inbound);
            let (lo, hi) = if old <= inbound { (old, inbound) } else { (inbound, old) };
            prop_assert!(new >= lo && new <= hi, "avg {new} outside [{lo}, {hi}]");
        }
    }
}
