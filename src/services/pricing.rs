//! Checkout arithmetic: shipping, tax and the order total.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::Serialize;
use utoipa::ToSchema;

/// Pricing rules applied once, when an order is placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricingPolicy {
    pub tax_rate: Decimal,
    /// Subtotals strictly greater than this ship free
    pub free_shipping_threshold: Decimal,
    pub flat_shipping_cost: Decimal,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            tax_rate: dec!(0.10),
            free_shipping_threshold: dec!(100),
            flat_shipping_cost: dec!(9.99),
        }
    }
}

/// Monetary snapshot stored on the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

impl PricingPolicy {
    pub fn shipping_for(&self, subtotal: Decimal) -> Decimal {
        if subtotal > self.free_shipping_threshold {
            Decimal::ZERO
        } else {
            self.flat_shipping_cost
        }
    }

    /// Tax rounded to cents, half away from zero.
    pub fn tax_for(&self, subtotal: Decimal) -> Decimal {
        (subtotal * self.tax_rate).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    }

    pub fn quote(&self, subtotal: Decimal) -> OrderTotals {
        let shipping_cost = self.shipping_for(subtotal);
        let tax = self.tax_for(subtotal);
        OrderTotals {
            subtotal,
            shipping_cost,
            tax,
            total: subtotal + shipping_cost + tax,
        }
    }
}
