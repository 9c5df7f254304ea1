//! Freight pricing
//!
//! All money math is exact decimal arithmetic. Components round to two
//! decimal places individually; the final amount is derived from the
//! already-rounded components and never goes below zero.

use rust_decimal::Decimal;

/// Base freight rate: 0.85 per km
pub const BASE_RATE_PER_KM: Decimal = Decimal::from_parts(85, 0, 0, false, 2);

/// Fuel price above which a surcharge applies (per liter)
pub const FUEL_VOLATILITY_THRESHOLD: Decimal = Decimal::from_parts(120, 0, 0, false, 2);

/// Customs wait-time covered by the base rate, in hours
pub const CUSTOMS_GRACE_HOURS: Decimal = Decimal::from_parts(4, 0, 0, false, 0);

/// Penalty per hour of customs wait beyond the grace window
pub const CUSTOMS_PENALTY_PER_HOUR: Decimal = Decimal::from_parts(850, 0, 0, false, 2);

/// Minimum surcharge drift that triggers a reprice
pub const FUEL_REPRICE_MATERIALITY: Decimal = Decimal::from_parts(50, 0, 0, false, 2);

/// Distance-based price component: distance_km * 0.85, rounded to cents
pub fn base_price(distance_km: Decimal) -> Decimal {
    (distance_km * BASE_RATE_PER_KM).round_dp(2)
}

/// Fuel volatility surcharge.
///
/// Zero at or below the 1.20 threshold; above it the surcharge scales the
/// base price by the relative excess over the threshold.
pub fn fuel_surcharge(base_price: Decimal, fuel_price_per_liter: Decimal) -> Decimal {
    if fuel_price_per_liter <= FUEL_VOLATILITY_THRESHOLD {
        return Decimal::ZERO;
    }
    let excess = fuel_price_per_liter - FUEL_VOLATILITY_THRESHOLD;
    (base_price * excess / FUEL_VOLATILITY_THRESHOLD).round_dp(2)
}

/// Customs delay penalty for a single checkpoint.
///
/// The first four hours of waiting are free; each hour beyond that costs
/// 8.50, pro-rated for fractional hours.
pub fn customs_penalty(wait_hours: Decimal) -> Decimal {
    if wait_hours <= CUSTOMS_GRACE_HOURS {
        return Decimal::ZERO;
    }
    ((wait_hours - CUSTOMS_GRACE_HOURS) * CUSTOMS_PENALTY_PER_HOUR).round_dp(2)
}

/// Settled amount: held total minus accumulated penalties, floored at zero
pub fn final_amount(total_freight_amount: Decimal, customs_delay_penalty: Decimal) -> Decimal {
    let amount = total_freight_amount - customs_delay_penalty;
    if amount < Decimal::ZERO {
        Decimal::ZERO
    } else {
        amount
    }
}
