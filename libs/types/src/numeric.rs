//! Integer units for quantities, prices and steps
//!
//! All value amounts are expressed in the smallest value unit. Arithmetic that
//! can overflow goes through the checked helpers below; callers turn `None`
//! into a rejection instead of wrapping.

/// Units of an item type.
pub type Quantity = u64;

/// Value in the smallest unit (unit prices, payments, refunds).
pub type Amount = u64;

/// Monotonic ledger step (block height) supplied by the execution environment.
pub type Step = u64;

/// `price × quantity`, or `None` when the product does not fit an [`Amount`].
pub fn checked_cost(price: Amount, quantity: Quantity) -> Option<Amount> {
    price.checked_mul(quantity)
}

/// Last step at which an action anchored at `anchor` is still inside `window`.
///
/// Saturates instead of overflowing: an anchor close to `u64::MAX` simply
/// never expires.
pub fn window_deadline(anchor: Step, window: Step) -> Step {
    anchor.saturating_add(window)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_cost() {
        assert_eq!(checked_cost(10, 2), Some(20));
        assert_eq!(checked_cost(u64::MAX, 2), None);
        assert_eq!(checked_cost(0, 5), Some(0));
    }

    #[test]
    fn test_window_deadline_saturates() {
        assert_eq!(window_deadline(100, 100), 200);
        assert_eq!(window_deadline(u64::MAX - 1, 100), u64::MAX);
    }

    mod fuzz {
        use crate::numeric::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn fuzz_checked_cost_matches_wide_product(price in any::<u64>(), quantity in any::<u64>()) {
                let wide = price as u128 * quantity as u128;
                match checked_cost(price, quantity) {
                    Some(cost) => prop_assert_eq!(cost as u128, wide),
                    None => prop_assert!(wide > u64::MAX as u128),
                }
            }

            #[test]
            fn fuzz_window_deadline_never_before_anchor(anchor in any::<u64>(), window in any::<u64>()) {
                let deadline = window_deadline(anchor, window);
                prop_assert!(deadline >= anchor);
                prop_assert_eq!(deadline as u128, (anchor as u128 + window as u128).min(u64::MAX as u128));
            }
        }
    }
}
