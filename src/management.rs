use crate::booking::PHONE_NUMBER;
use crate::backend::{AppointmentFilter, BarberFilter, ScheduleBackend, ScheduleFilter, StoreError};
use crate::time_window::{parse_clock, ShopTimezone};
use crate::types::{
    Appointment, Barber, DayOfWeek, NewBarber, NewShop, ScheduleEntry, Shop, TimingEntry,
    WeeklySchedule,
};
use chrono::{NaiveDate, NaiveTime};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

/// Staff listings never return more than this many barbers.
pub const STAFF_LIST_LIMIT: usize = 100;

lazy_static! {
    static ref CLOCK_TIME: Regex = Regex::new(r"^([01][0-9]|2[0-3]):[0-5][0-9]$").unwrap();
}

#[derive(Debug, Error)]
pub enum ManagementError {
    #[error("{0}")]
    Invalid(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for ManagementError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => ManagementError::NotFound(what),
            other => ManagementError::Store(other),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct StaffRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(max = 100))]
    pub contact_info: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ScheduleEntryRequest {
    pub day_of_week: DayOfWeek,
    #[validate(regex(path = *CLOCK_TIME))]
    pub start_time: String,
    #[validate(regex(path = *CLOCK_TIME))]
    pub end_time: String,
    #[serde(default)]
    pub is_day_off: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ScheduleUpdate {
    #[validate(length(max = 7), nested)]
    pub entries: Vec<ScheduleEntryRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TimingRequest {
    pub day_of_week: DayOfWeek,
    #[validate(regex(path = *CLOCK_TIME))]
    pub open_time: String,
    #[validate(regex(path = *CLOCK_TIME))]
    pub close_time: String,
    #[serde(default)]
    pub is_closed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ShopRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 1, max = 200))]
    pub address: String,
    #[validate(regex(path = *PHONE_NUMBER))]
    pub phone_number: String,
    /// Percent.
    #[validate(range(min = 0.0, max = 100.0))]
    pub tax_rate: f64,
    #[validate(length(max = 7), nested)]
    pub timings: Vec<TimingRequest>,
}

fn clock(value: &str) -> Result<NaiveTime, ManagementError> {
    parse_clock(value).map_err(|err| ManagementError::Invalid(err.to_string()))
}

/// One entry per day at most; working entries must start before they end.
fn check_week(
    days: impl Iterator<Item = (DayOfWeek, NaiveTime, NaiveTime, bool)>,
) -> Result<(), ManagementError> {
    let mut seen = HashSet::new();
    for (day, start, end, off) in days {
        if !seen.insert(day) {
            return Err(ManagementError::Invalid(format!("{day} is listed twice")));
        }
        if !off && start >= end {
            return Err(ManagementError::Invalid(format!(
                "{day} must start before it ends"
            )));
        }
    }
    Ok(())
}

impl ScheduleUpdate {
    pub fn into_entries(self) -> Result<Vec<ScheduleEntry>, ManagementError> {
        let entries = self
            .entries
            .into_iter()
            .map(|entry| {
                Ok(ScheduleEntry {
                    day_of_week: entry.day_of_week,
                    start_time: clock(&entry.start_time)?,
                    end_time: clock(&entry.end_time)?,
                    is_day_off: entry.is_day_off,
                })
            })
            .collect::<Result<Vec<_>, ManagementError>>()?;
        check_week(
            entries
                .iter()
                .map(|e| (e.day_of_week, e.start_time, e.end_time, e.is_day_off)),
        )?;
        Ok(entries)
    }
}

impl ShopRequest {
    pub fn into_new_shop(self) -> Result<NewShop, ManagementError> {
        let timings = self
            .timings
            .into_iter()
            .map(|timing| {
                Ok(TimingEntry {
                    day_of_week: timing.day_of_week,
                    open_time: clock(&timing.open_time)?,
                    close_time: clock(&timing.close_time)?,
                    is_closed: timing.is_closed,
                })
            })
            .collect::<Result<Vec<_>, ManagementError>>()?;
        check_week(
            timings
                .iter()
                .map(|t| (t.day_of_week, t.open_time, t.close_time, t.is_closed)),
        )?;
        Ok(NewShop {
            name: self.name,
            address: self.address,
            phone_number: self.phone_number,
            tax_rate: self.tax_rate,
            timings,
        })
    }
}

/// Appointments of the shop starting on the local `date`, earliest first.
pub fn day_appointments<B: ScheduleBackend>(
    backend: &B,
    timezone: &ShopTimezone,
    shop_id: Uuid,
    date: NaiveDate,
) -> Result<Vec<Appointment>, StoreError> {
    let (start, end) = timezone.day_bounds_utc(date);
    backend.appointments(&AppointmentFilter::for_shop(shop_id).starting_within(start, end))
}

pub fn staff<B: ScheduleBackend>(
    backend: &B,
    shop_id: Option<Uuid>,
) -> Result<Vec<Barber>, StoreError> {
    let filter = match shop_id {
        Some(shop_id) => BarberFilter::for_shop(shop_id),
        None => BarberFilter::default(),
    };
    backend.barbers(&filter.limit(STAFF_LIST_LIMIT))
}

pub fn add_staff<B: ScheduleBackend>(
    backend: &B,
    shop_id: Uuid,
    request: StaffRequest,
) -> Result<Barber, ManagementError> {
    let shop = backend.shop(shop_id)?;
    let barber = backend.add_barber(NewBarber {
        name: request.name,
        contact_info: request.contact_info,
        shop_id: shop.id,
    })?;
    info!(barber_id = %barber.id, %shop_id, "Added staff member");
    Ok(barber)
}

pub fn barber_schedule<B: ScheduleBackend>(
    backend: &B,
    barber_id: Uuid,
) -> Result<Vec<WeeklySchedule>, ManagementError> {
    backend.barber(barber_id)?;
    Ok(backend.schedules(&ScheduleFilter::for_barber(barber_id))?)
}

pub fn replace_barber_schedule<B: ScheduleBackend>(
    backend: &B,
    barber_id: Uuid,
    update: ScheduleUpdate,
) -> Result<Vec<WeeklySchedule>, ManagementError> {
    let entries = update.into_entries()?;
    let barber = backend.barber(barber_id)?;
    let replaced = backend.replace_schedule(barber.id, barber.shop_id, entries)?;
    info!(%barber_id, days = replaced.len(), "Replaced weekly schedule");
    Ok(replaced)
}

pub fn add_shop<B: ScheduleBackend>(
    backend: &B,
    request: ShopRequest,
) -> Result<Shop, ManagementError> {
    let shop = backend.add_shop(request.into_new_shop()?)?;
    info!(shop_id = %shop.id, name = %shop.name, "Added shop");
    Ok(shop)
}
