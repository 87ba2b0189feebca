// core/src/model/money.rs

//! Exact decimal money and the bounds of the `NUMERIC(14, 2)` columns it is
//! stored in.

use rust_decimal::Decimal;

/// Monetary amounts. Exact decimal arithmetic, stored as NUMERIC.
pub type Money = Decimal;

/// Fractional digits every money column keeps.
pub const MONEY_SCALE: u32 = 2;

/// Integer digits every money column holds (precision 14 minus scale 2).
pub const MONEY_INTEGER_DIGITS: u32 = 12;

/// Exclusive upper bound of a storable amount: `10^12`.
pub fn money_limit() -> Money {
  Money::from(10i64.pow(MONEY_INTEGER_DIGITS))
}

/// True when `amount` is stored without rounding or overflow.
pub fn money_fits(amount: Money) -> bool {
  amount.normalize().scale() <= MONEY_SCALE && amount.abs() < money_limit()
}
