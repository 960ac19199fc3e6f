//! Stay pricing: rate tier selection and itemized breakdowns.
//!
//! Everything here is pure. The booking service calls it at submission time
//! with rates freshly loaded from the catalog, so a preview shown earlier is
//! never trusted.

use chrono::{Months, NaiveDate};
use serde::Serialize;

use crate::{
    domain::{PriceLine, PriceType, RoomRate},
    error::{AppError, Result},
};

pub mod schedule;

pub use schedule::{schedule, ScheduledMilestone};

const DAYS_PER_WEEK: i64 = 7;
const DAYS_PER_MONTH: i64 = 30;

/// Result of pricing one stay against one room.
#[derive(Debug, Clone, Serialize)]
pub struct StayPricing {
    pub price_type: PriceType,
    pub nights: i64,
    pub unit_price_cents: i64,
    /// Booking fee configured on the rate, if any.
    pub booking_price_cents: Option<i64>,
    pub breakdown: Vec<PriceLine>,
    pub room_subtotal_cents: i64,
}

/// Picks the rate tier for a stay of `nights`.
///
/// A single tier always wins. Otherwise the longest tier the stay qualifies
/// for is preferred (Month from 30 nights, Week from 7, then Day), falling
/// back to the shortest tier on offer so longer stays never select a shorter
/// tier than shorter stays do.
pub fn determine_price_type(nights: i64, tiers: &[RoomRate]) -> Option<PriceType> {
    if tiers.len() == 1 {
        return Some(tiers[0].price_type);
    }

    let has = |price_type: PriceType| tiers.iter().any(|t| t.price_type == price_type);

    if nights >= DAYS_PER_MONTH && has(PriceType::Month) {
        return Some(PriceType::Month);
    }
    if nights >= DAYS_PER_WEEK && has(PriceType::Week) {
        return Some(PriceType::Week);
    }
    if has(PriceType::Day) {
        return Some(PriceType::Day);
    }

    // min_by_key keeps the first of equal keys, so catalog order breaks ties
    tiers.iter().map(|t| t.price_type).min_by_key(|p| *p)
}

/// Finds the first rate record of the given tier.
pub fn resolve_rate(tiers: &[RoomRate], price_type: PriceType) -> Result<&RoomRate> {
    tiers
        .iter()
        .find(|t| t.price_type == price_type)
        .ok_or_else(|| {
            AppError::PricingUnavailable(format!("No {} rate is configured for this room", price_type))
        })
}

/// Itemizes a stay under a single rate.
///
/// Monthly stays bill one full month per started 30-night block; the last
/// month is never prorated.
pub fn build_breakdown(rate: &RoomRate, nights: i64, stay_start: NaiveDate) -> Result<Vec<PriceLine>> {
    if nights < 1 {
        return Err(AppError::Validation("A stay must be at least one night".to_string()));
    }

    let unit = rate.unit_price_cents();

    let lines = match rate.price_type {
        PriceType::Month => {
            let months = ceil_div(nights, DAYS_PER_MONTH);
            (0..months)
                .map(|i| {
                    let month_start = add_months(stay_start, i)?;
                    Ok(PriceLine {
                        price_type: PriceType::Month,
                        quantity: 1,
                        unit_price_cents: unit,
                        line_total_cents: unit,
                        description: month_start.format("%B %Y").to_string(),
                    })
                })
                .collect::<Result<Vec<_>>>()?
        }
        PriceType::Week => {
            let weeks = ceil_div(nights, DAYS_PER_WEEK);
            vec![PriceLine {
                price_type: PriceType::Week,
                quantity: weeks,
                unit_price_cents: unit,
                line_total_cents: checked_total(unit, weeks)?,
                description: format!("{} week(s)", weeks),
            }]
        }
        PriceType::Day => vec![PriceLine {
            price_type: PriceType::Day,
            quantity: nights,
            unit_price_cents: unit,
            line_total_cents: checked_total(unit, nights)?,
            description: format!("{} night(s)", nights),
        }],
    };

    Ok(lines)
}

/// Prices a stay from `start` to `end` against a room's rate tiers.
pub fn price_stay(tiers: &[RoomRate], start: NaiveDate, end: NaiveDate) -> Result<StayPricing> {
    if end <= start {
        return Err(AppError::Validation("End date must be after start date".to_string()));
    }
    let nights = (end - start).num_days();

    let price_type = determine_price_type(nights, tiers).ok_or_else(|| {
        AppError::PricingUnavailable("This room has no rates configured".to_string())
    })?;
    let rate = resolve_rate(tiers, price_type)?;
    let breakdown = build_breakdown(rate, nights, start)?;
    let room_subtotal_cents = breakdown_total(&breakdown);

    Ok(StayPricing {
        price_type,
        nights,
        unit_price_cents: rate.unit_price_cents(),
        booking_price_cents: rate.booking_price_cents,
        breakdown,
        room_subtotal_cents,
    })
}

pub fn breakdown_total(breakdown: &[PriceLine]) -> i64 {
    breakdown.iter().map(|line| line.line_total_cents).sum()
}

pub(crate) fn add_months(date: NaiveDate, months: i64) -> Result<NaiveDate> {
    u32::try_from(months)
        .ok()
        .and_then(|m| date.checked_add_months(Months::new(m)))
        .ok_or_else(|| AppError::Validation("Stay dates are out of range".to_string()))
}

fn ceil_div(value: i64, divisor: i64) -> i64 {
    (value + divisor - 1) / divisor
}

fn checked_total(unit: i64, quantity: i64) -> Result<i64> {
    unit.checked_mul(quantity)
        .ok_or_else(|| AppError::Validation("Price overflow".to_string()))
}
