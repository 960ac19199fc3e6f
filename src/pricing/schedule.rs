use chrono::{Days, NaiveDate};
use serde::Serialize;

use crate::{
    domain::{MilestoneType, PriceLine, PriceType},
    error::{AppError, Result},
};

use super::add_months;

/// A payment obligation before it is attached to a persisted booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduledMilestone {
    pub milestone_type: MilestoneType,
    pub milestone_number: i64,
    pub due_date: NaiveDate,
    pub amount_cents: i64,
}

/// Turns a breakdown into a dated payment schedule.
///
/// Milestone 0 is the booking fee, due `today`. Breakdown line `i` becomes
/// milestone `i + 1`, due `i` periods of its tier after the stay starts.
/// The deposit is charged on top of the stay price, never deducted from it.
pub fn schedule(
    breakdown: &[PriceLine],
    deposit_cents: i64,
    stay_start: NaiveDate,
    today: NaiveDate,
) -> Result<Vec<ScheduledMilestone>> {
    let mut milestones = Vec::with_capacity(breakdown.len() + 1);

    milestones.push(ScheduledMilestone {
        milestone_type: MilestoneType::BookingFee,
        milestone_number: 0,
        due_date: today,
        amount_cents: deposit_cents,
    });

    for (i, line) in breakdown.iter().enumerate() {
        let offset = i as u64;
        let due_date = match line.price_type {
            PriceType::Month => add_months(stay_start, i as i64)?,
            PriceType::Week => add_days(stay_start, offset * 7)?,
            PriceType::Day => add_days(stay_start, offset)?,
        };

        milestones.push(ScheduledMilestone {
            milestone_type: MilestoneType::from(line.price_type),
            milestone_number: i as i64 + 1,
            due_date,
            amount_cents: line.line_total_cents,
        });
    }

    Ok(milestones)
}

fn add_days(date: NaiveDate, days: u64) -> Result<NaiveDate> {
    date.checked_add_days(Days::new(days))
        .ok_or_else(|| AppError::Validation("Stay dates are out of range".to_string()))
}
