use crate::backend::{AppointmentFilter, ScheduleBackend, StoreError};
use crate::booking::round_to_cents;
use crate::time_window::{format_date, has_plain_year, parse_date, ShopTimezone};
use crate::types::AppointmentStatus;
use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

/// Appointments are read from the store in pages of this size.
pub const REPORT_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeriodError {
    #[error("Please provide either a 'date' or a 'month', not both")]
    Ambiguous,
    #[error("Invalid date format. Please use YYYY-MM-DD")]
    Date,
    #[error("Invalid month format. Please use YYYY-MM")]
    Month,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportPeriod {
    Today(NaiveDate),
    Day(NaiveDate),
    /// First day of the month.
    Month(NaiveDate),
}

impl ReportPeriod {
    pub fn parse(
        date: Option<&str>,
        month: Option<&str>,
        today: NaiveDate,
    ) -> Result<Self, PeriodError> {
        match (date, month) {
            (Some(_), Some(_)) => Err(PeriodError::Ambiguous),
            (Some(date), None) => parse_date(date)
                .map(ReportPeriod::Day)
                .map_err(|_| PeriodError::Date),
            (None, Some(month)) => {
                let month = month.trim();
                if !has_plain_year(month) {
                    return Err(PeriodError::Month);
                }
                let (year, month) = month.split_once('-').ok_or(PeriodError::Month)?;
                let year: i32 = year.parse().map_err(|_| PeriodError::Month)?;
                let month: u32 = month.parse().map_err(|_| PeriodError::Month)?;
                NaiveDate::from_ymd_opt(year, month, 1)
                    .map(ReportPeriod::Month)
                    .ok_or(PeriodError::Month)
            }
            (None, None) => Ok(ReportPeriod::Today(today)),
        }
    }

    /// `[start, end)` in UTC, following local midnights.
    pub fn bounds(&self, timezone: &ShopTimezone) -> (DateTime<Utc>, DateTime<Utc>) {
        match self {
            ReportPeriod::Today(day) | ReportPeriod::Day(day) => timezone.day_bounds_utc(*day),
            ReportPeriod::Month(first) => {
                let next = first.checked_add_months(Months::new(1)).unwrap_or(*first);
                (
                    timezone.day_bounds_utc(*first).0,
                    timezone.day_bounds_utc(next).0,
                )
            }
        }
    }

    pub fn describe(&self) -> String {
        match self {
            ReportPeriod::Today(day) => format!("for today, {}", format_date(*day)),
            ReportPeriod::Day(day) => format!("for date {}", format_date(*day)),
            ReportPeriod::Month(first) => {
                format!("for month {:04}-{:02}", first.year(), first.month())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialsReport {
    pub total_revenue_before_tax: f64,
    pub total_tax_collected: f64,
    pub total_revenue_after_tax: f64,
    pub total_appointments: usize,
    pub filter_period: String,
}

/// Totals over the completed appointments that started inside `period`,
/// for one shop or for every shop.
pub fn financials_report<B: ScheduleBackend>(
    backend: &B,
    timezone: &ShopTimezone,
    period: ReportPeriod,
    shop_id: Option<Uuid>,
) -> Result<FinancialsReport, StoreError> {
    let (start, end) = period.bounds(timezone);
    let mut filter = AppointmentFilter::default()
        .with_status(vec![AppointmentStatus::Completed])
        .starting_within(start, end);
    let mut filter_period = period.describe();
    match shop_id {
        Some(shop_id) => {
            filter = filter.shop(shop_id);
            filter_period.push_str(&format!(" for shop {shop_id}"));
        }
        None => filter_period.push_str(" for all shops"),
    }

    let mut before_tax = 0.0;
    let mut after_tax = 0.0;
    let mut count = 0;
    let mut offset = 0;
    loop {
        let page = backend.appointments(&filter.clone().page(REPORT_PAGE_SIZE, offset))?;
        for appointment in &page {
            before_tax += appointment.bill_amount;
            after_tax += appointment.total_amount;
        }
        count += page.len();
        if page.len() < REPORT_PAGE_SIZE {
            break;
        }
        offset += REPORT_PAGE_SIZE;
    }

    info!(appointments = count, "Generated financial report {filter_period}");
    Ok(FinancialsReport {
        total_revenue_before_tax: round_to_cents(before_tax),
        total_tax_collected: round_to_cents(after_tax - before_tax),
        total_revenue_after_tax: round_to_cents(after_tax),
        total_appointments: count,
        filter_period,
    })
}
