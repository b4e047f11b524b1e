use crate::types::{
    Appointment, AppointmentStatus, Barber, DayOfWeek, NewAppointment, NewBarber, NewShop,
    ScheduleEntry, Service, Shop, WeeklySchedule, WeeklyTiming,
};
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Stored record is malformed: {0}")]
    Corrupt(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BarberFilter {
    pub shop_id: Option<Uuid>,
    pub ids: Option<Vec<Uuid>>,
    pub limit: Option<usize>,
}

impl BarberFilter {
    pub fn for_shop(shop_id: Uuid) -> Self {
        Self {
            shop_id: Some(shop_id),
            ..Self::default()
        }
    }

    pub fn with_ids(ids: Vec<Uuid>) -> Self {
        Self {
            ids: Some(ids),
            ..Self::default()
        }
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, barber: &Barber) -> bool {
        self.shop_id.map_or(true, |shop_id| barber.shop_id == shop_id)
            && self
                .ids
                .as_ref()
                .map_or(true, |ids| ids.contains(&barber.id))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleFilter {
    pub barber_id: Option<Uuid>,
    pub shop_id: Option<Uuid>,
    pub day: Option<DayOfWeek>,
    /// Only entries that are not a day off.
    pub working_only: bool,
    pub limit: Option<usize>,
}

impl ScheduleFilter {
    pub fn for_barber(barber_id: Uuid) -> Self {
        Self {
            barber_id: Some(barber_id),
            ..Self::default()
        }
    }

    pub fn for_shop(shop_id: Uuid) -> Self {
        Self {
            shop_id: Some(shop_id),
            ..Self::default()
        }
    }

    pub fn on(mut self, day: DayOfWeek) -> Self {
        self.day = Some(day);
        self
    }

    pub fn working_only(mut self) -> Self {
        self.working_only = true;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, schedule: &WeeklySchedule) -> bool {
        self.barber_id.map_or(true, |id| schedule.barber_id == id)
            && self.shop_id.map_or(true, |id| schedule.shop_id == id)
            && self.day.map_or(true, |day| schedule.day_of_week == day)
            && !(self.working_only && schedule.is_day_off)
    }
}

/// Appointment query. Every populated field narrows the result; results are
/// always ordered by `start_time` ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppointmentFilter {
    pub shop_id: Option<Uuid>,
    pub barber_ids: Option<Vec<Uuid>>,
    pub statuses: Option<Vec<AppointmentStatus>>,
    pub excluded_statuses: Vec<AppointmentStatus>,
    /// `start_time >= start_from`
    pub start_from: Option<DateTime<Utc>>,
    /// `start_time < start_before`
    pub start_before: Option<DateTime<Utc>>,
    /// `end_time > end_after`
    pub end_after: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl AppointmentFilter {
    pub fn for_shop(shop_id: Uuid) -> Self {
        Self {
            shop_id: Some(shop_id),
            ..Self::default()
        }
    }

    pub fn for_barbers(barber_ids: Vec<Uuid>) -> Self {
        Self {
            barber_ids: Some(barber_ids),
            ..Self::default()
        }
    }

    pub fn shop(mut self, shop_id: Uuid) -> Self {
        self.shop_id = Some(shop_id);
        self
    }

    pub fn with_status(mut self, statuses: Vec<AppointmentStatus>) -> Self {
        self.statuses = Some(statuses);
        self
    }

    pub fn excluding(mut self, status: AppointmentStatus) -> Self {
        self.excluded_statuses.push(status);
        self
    }

    pub fn starting_within(mut self, from: DateTime<Utc>, before: DateTime<Utc>) -> Self {
        self.start_from = Some(from);
        self.start_before = Some(before);
        self
    }

    /// Keeps appointments whose `[start_time, end_time)` intersects `[start, end)`.
    pub fn overlapping(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start_before = Some(end);
        self.end_after = Some(start);
        self
    }

    pub fn page(mut self, limit: usize, offset: usize) -> Self {
        self.limit = Some(limit);
        self.offset = Some(offset);
        self
    }

    pub fn matches(&self, appointment: &Appointment) -> bool {
        self.shop_id.map_or(true, |id| appointment.shop_id == id)
            && self
                .barber_ids
                .as_ref()
                .map_or(true, |ids| ids.contains(&appointment.barber_id))
            && self
                .statuses
                .as_ref()
                .map_or(true, |statuses| statuses.contains(&appointment.status))
            && !self.excluded_statuses.contains(&appointment.status)
            && self
                .start_from
                .map_or(true, |from| appointment.start_time >= from)
            && self
                .start_before
                .map_or(true, |before| appointment.start_time < before)
            && self
                .end_after
                .map_or(true, |after| appointment.end_time > after)
    }
}

/// The document store the availability engine reads from and the booking
/// flow writes to. Calls block; async callers run them on the blocking pool.
pub trait ScheduleBackend: Clone + Send + Sync + 'static {
    fn shops(&self) -> Result<Vec<Shop>, StoreError>;
    fn shop(&self, id: Uuid) -> Result<Shop, StoreError>;
    fn add_shop(&self, shop: NewShop) -> Result<Shop, StoreError>;
    /// Timings of a shop, optionally for one day only.
    fn shop_timings(
        &self,
        shop_id: Uuid,
        day: Option<DayOfWeek>,
    ) -> Result<Vec<WeeklyTiming>, StoreError>;

    fn services(&self) -> Result<Vec<Service>, StoreError>;
    /// Services are provisioned outside the service; tests add their own.
    #[cfg(test)]
    fn add_service(&self, name: String, duration: u32, price: f64) -> Result<Service, StoreError>;

    fn barber(&self, id: Uuid) -> Result<Barber, StoreError>;
    fn barbers(&self, filter: &BarberFilter) -> Result<Vec<Barber>, StoreError>;
    fn add_barber(&self, barber: NewBarber) -> Result<Barber, StoreError>;

    fn schedules(&self, filter: &ScheduleFilter) -> Result<Vec<WeeklySchedule>, StoreError>;
    /// Drops every schedule entry of the barber and stores `entries` instead.
    fn replace_schedule(
        &self,
        barber_id: Uuid,
        shop_id: Uuid,
        entries: Vec<ScheduleEntry>,
    ) -> Result<Vec<WeeklySchedule>, StoreError>;

    fn appointment(&self, id: Uuid) -> Result<Appointment, StoreError>;
    fn appointments(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, StoreError>;
    fn create_appointment(&self, appointment: NewAppointment) -> Result<Appointment, StoreError>;
    fn update_appointment_status(
        &self,
        id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Appointment, StoreError>;
}
