use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Supply/VAT/total amounts for a quantity at a unit price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AmountBreakdown {
    pub supply: Decimal,
    pub vat: Decimal,
    pub total: Decimal,
}

/// Computes the amount breakdown under the 10% VAT regime.
///
/// VAT-inclusive prices back-calculate the untaxed supply amount:
/// `supply = floor(qty * price / 1.1)`, `vat = qty * price - supply`.
/// Otherwise `supply = qty * price`, `vat = floor(supply * 0.1)`.
pub fn breakdown(quantity: i32, unit_price: Decimal, vat_included: bool) -> AmountBreakdown {
    let gross = Decimal::from(quantity) * unit_price;

    if vat_included {
        let supply = (gross / dec!(1.1)).floor();
        AmountBreakdown {
            supply,
            vat: gross - supply,
            total: gross,
        }
    } else {
        let vat = (gross * dec!(0.1)).floor();
        AmountBreakdown {
            supply: gross,
            vat,
            total: gross + vat,
        }
    }
}
