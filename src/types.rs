use crate::time_window::clock_format;
use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayOfWeek {
    pub const ALL: [DayOfWeek; 7] = [
        DayOfWeek::Monday,
        DayOfWeek::Tuesday,
        DayOfWeek::Wednesday,
        DayOfWeek::Thursday,
        DayOfWeek::Friday,
        DayOfWeek::Saturday,
        DayOfWeek::Sunday,
    ];

    pub fn of(date: NaiveDate) -> Self {
        date.weekday().into()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DayOfWeek::Monday => "Monday",
            DayOfWeek::Tuesday => "Tuesday",
            DayOfWeek::Wednesday => "Wednesday",
            DayOfWeek::Thursday => "Thursday",
            DayOfWeek::Friday => "Friday",
            DayOfWeek::Saturday => "Saturday",
            DayOfWeek::Sunday => "Sunday",
        }
    }
}

impl From<Weekday> for DayOfWeek {
    fn from(weekday: Weekday) -> Self {
        match weekday {
            Weekday::Mon => DayOfWeek::Monday,
            Weekday::Tue => DayOfWeek::Tuesday,
            Weekday::Wed => DayOfWeek::Wednesday,
            Weekday::Thu => DayOfWeek::Thursday,
            Weekday::Fri => DayOfWeek::Friday,
            Weekday::Sat => DayOfWeek::Saturday,
            Weekday::Sun => DayOfWeek::Sunday,
        }
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DayOfWeek {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        DayOfWeek::ALL
            .into_iter()
            .find(|day| day.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| format!("Unknown day of week '{value}'"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AppointmentStatus {
    Booked,
    InProgress,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Booked => "Booked",
            AppointmentStatus::InProgress => "InProgress",
            AppointmentStatus::Completed => "Completed",
            AppointmentStatus::Cancelled => "Cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed | AppointmentStatus::Cancelled
        )
    }

    /// Booked -> InProgress -> Completed, or -> Cancelled from any non-terminal state.
    pub fn can_transition_to(&self, next: AppointmentStatus) -> bool {
        match (self, next) {
            (AppointmentStatus::Booked, AppointmentStatus::InProgress) => true,
            (AppointmentStatus::InProgress, AppointmentStatus::Completed) => true,
            (current, AppointmentStatus::Cancelled) => !current.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "Booked" => Ok(AppointmentStatus::Booked),
            "InProgress" => Ok(AppointmentStatus::InProgress),
            "Completed" => Ok(AppointmentStatus::Completed),
            "Cancelled" => Ok(AppointmentStatus::Cancelled),
            other => Err(format!("Unknown appointment status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shop {
    pub id: Uuid,
    pub name: String,
    pub address: String,
    pub phone_number: String,
    /// Percent, e.g. `18.0`.
    pub tax_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyTiming {
    pub id: Uuid,
    pub shop_id: Uuid,
    pub day_of_week: DayOfWeek,
    #[serde(with = "clock_format")]
    pub open_time: NaiveTime,
    #[serde(with = "clock_format")]
    pub close_time: NaiveTime,
    pub is_closed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Barber {
    pub id: Uuid,
    pub name: String,
    pub contact_info: Option<String>,
    pub shop_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklySchedule {
    pub id: Uuid,
    pub barber_id: Uuid,
    pub shop_id: Uuid,
    pub day_of_week: DayOfWeek,
    #[serde(with = "clock_format")]
    pub start_time: NaiveTime,
    #[serde(with = "clock_format")]
    pub end_time: NaiveTime,
    pub is_day_off: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub id: Uuid,
    pub name: String,
    /// Minutes.
    pub duration: u32,
    pub price: f64,
}

/// Copy of a catalogue entry taken when an appointment is booked. Later
/// catalogue edits never reach existing appointments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceSnapshot {
    pub id: Uuid,
    pub name: String,
    pub duration: u32,
    pub price: f64,
}

impl From<&Service> for ServiceSnapshot {
    fn from(service: &Service) -> Self {
        Self {
            id: service.id,
            name: service.name.clone(),
            duration: service.duration,
            price: service.price,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub shop_id: Uuid,
    pub shop_name: String,
    pub barber_id: Uuid,
    pub barber_name: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_gender: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub is_walk_in: bool,
    pub bill_amount: f64,
    pub tax_rate_snapshot: f64,
    pub total_amount: f64,
    pub services_snapshot: Vec<ServiceSnapshot>,
}

impl Appointment {
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start_time < end && self.end_time > start
    }
}

/// An appointment before the store has assigned its id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAppointment {
    pub shop_id: Uuid,
    pub shop_name: String,
    pub barber_id: Uuid,
    pub barber_name: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_gender: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub is_walk_in: bool,
    pub bill_amount: f64,
    pub tax_rate_snapshot: f64,
    pub total_amount: f64,
    pub services_snapshot: Vec<ServiceSnapshot>,
}

impl NewAppointment {
    pub fn with_id(self, id: Uuid) -> Appointment {
        Appointment {
            id,
            shop_id: self.shop_id,
            shop_name: self.shop_name,
            barber_id: self.barber_id,
            barber_name: self.barber_name,
            customer_name: self.customer_name,
            customer_phone: self.customer_phone,
            customer_gender: self.customer_gender,
            start_time: self.start_time,
            end_time: self.end_time,
            status: self.status,
            is_walk_in: self.is_walk_in,
            bill_amount: self.bill_amount,
            tax_rate_snapshot: self.tax_rate_snapshot,
            total_amount: self.total_amount,
            services_snapshot: self.services_snapshot,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBarber {
    pub name: String,
    pub contact_info: Option<String>,
    pub shop_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub day_of_week: DayOfWeek,
    #[serde(with = "clock_format")]
    pub start_time: NaiveTime,
    #[serde(with = "clock_format")]
    pub end_time: NaiveTime,
    pub is_day_off: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingEntry {
    pub day_of_week: DayOfWeek,
    #[serde(with = "clock_format")]
    pub open_time: NaiveTime,
    #[serde(with = "clock_format")]
    pub close_time: NaiveTime,
    pub is_closed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewShop {
    pub name: String,
    pub address: String,
    pub phone_number: String,
    pub tax_rate: f64,
    pub timings: Vec<TimingEntry>,
}

#[cfg(test)]
mod test {
    use super::*;
    use test_case::test_case;

    #[test_case(AppointmentStatus::Booked, AppointmentStatus::InProgress, true)]
    #[test_case(AppointmentStatus::InProgress, AppointmentStatus::Completed, true)]
    #[test_case(AppointmentStatus::Booked, AppointmentStatus::Cancelled, true)]
    #[test_case(AppointmentStatus::InProgress, AppointmentStatus::Cancelled, true)]
    #[test_case(AppointmentStatus::Booked, AppointmentStatus::Completed, false)]
    #[test_case(AppointmentStatus::Completed, AppointmentStatus::Cancelled, false)]
    #[test_case(AppointmentStatus::Cancelled, AppointmentStatus::Booked, false)]
    #[test_case(AppointmentStatus::Booked, AppointmentStatus::Booked, false)]
    fn test_status_transitions(from: AppointmentStatus, to: AppointmentStatus, allowed: bool) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[test]
    fn test_day_of_week_names_match_stored_records() {
        let date = NaiveDate::from_ymd_opt(2025, 9, 15).unwrap();
        assert_eq!(DayOfWeek::of(date), DayOfWeek::Monday);
        assert_eq!("sunday".parse::<DayOfWeek>().unwrap(), DayOfWeek::Sunday);
        assert_eq!(
            serde_json::to_string(&DayOfWeek::Wednesday).unwrap(),
            "\"Wednesday\""
        );
        "Caturday".parse::<DayOfWeek>().unwrap_err();
    }

    #[test]
    fn test_schedule_times_serialize_as_clock_strings() {
        let entry: ScheduleEntry = serde_json::from_str(
            r#"{"day_of_week":"Monday","start_time":"09:30","end_time":"18:30","is_day_off":false}"#,
        )
        .unwrap();
        assert_eq!(entry.start_time, NaiveTime::from_hms_opt(9, 30, 0).unwrap());
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["end_time"], "18:30");
    }

    #[test]
    fn test_overlap_is_half_open() {
        let at = |h, m| {
            NaiveDate::from_ymd_opt(2025, 9, 15)
                .unwrap()
                .and_hms_opt(h, m, 0)
                .unwrap()
                .and_utc()
        };
        let appointment = NewAppointment {
            shop_id: Uuid::new_v4(),
            shop_name: "Shop".into(),
            barber_id: Uuid::new_v4(),
            barber_name: "Barber".into(),
            customer_name: "Customer".into(),
            customer_phone: "9876543210".into(),
            customer_gender: None,
            start_time: at(10, 0),
            end_time: at(10, 30),
            status: AppointmentStatus::Booked,
            is_walk_in: false,
            bill_amount: 0.0,
            tax_rate_snapshot: 0.0,
            total_amount: 0.0,
            services_snapshot: vec![],
        }
        .with_id(Uuid::new_v4());

        assert!(!appointment.overlaps(at(10, 30), at(11, 0)));
        assert!(!appointment.overlaps(at(9, 30), at(10, 0)));
        assert!(appointment.overlaps(at(10, 15), at(10, 45)));
        assert!(appointment.overlaps(at(9, 0), at(12, 0)));
    }
}
