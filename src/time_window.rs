use chrono::{
    DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, SecondsFormat,
    Utc,
};
use thiserror::Error;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const CLOCK_FORMAT: &str = "%H:%M";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeFormatError {
    #[error("Invalid date '{0}'. Please use YYYY-MM-DD")]
    Date(String),
    #[error("Invalid time of day '{0}'. Please use HH:MM")]
    Clock(String),
    #[error("Invalid timestamp '{0}'. Please use ISO-8601")]
    Instant(String),
    #[error("Invalid UTC offset '{0}'. Please use +HH:MM or -HH:MM")]
    Offset(String),
}

/// Strict `YYYY-MM-DD` with an unsigned four-digit year.
pub fn parse_date(value: &str) -> Result<NaiveDate, TimeFormatError> {
    let trimmed = value.trim();
    if !has_plain_year(trimmed) || trimmed.len() != 10 {
        return Err(TimeFormatError::Date(value.to_owned()));
    }
    NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
        .map_err(|_| TimeFormatError::Date(value.to_owned()))
}

/// "YYYY-" prefix with an unsigned four-digit year.
pub fn has_plain_year(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() > 4 && bytes[..4].iter().all(u8::is_ascii_digit) && bytes[4] == b'-'
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Accepts "HH:MM" and, for records written by other tools, "HH:MM:SS".
pub fn parse_clock(value: &str) -> Result<NaiveTime, TimeFormatError> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, CLOCK_FORMAT)
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|_| TimeFormatError::Clock(value.to_owned()))
}

pub fn format_clock(time: NaiveTime) -> String {
    time.format(CLOCK_FORMAT).to_string()
}

/// Parses an ISO-8601 instant. Strings without an offset are read as UTC.
pub fn parse_instant(value: &str) -> Result<DateTime<Utc>, TimeFormatError> {
    let value = value.trim();
    if !has_plain_year(value) {
        return Err(TimeFormatError::Instant(value.to_owned()));
    }
    if let Ok(instant) = DateTime::parse_from_rfc3339(value) {
        return Ok(instant.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|_| TimeFormatError::Instant(value.to_owned()))
}

pub fn format_instant(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// The single fixed offset in which every wall-clock value is interpreted:
/// weekly hours, day boundaries, "now" for walk-ins and slot labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShopTimezone {
    offset: FixedOffset,
}

impl ShopTimezone {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn utc() -> Self {
        Self::new(Utc.fix())
    }

    pub fn from_minutes(minutes: i32) -> Option<Self> {
        FixedOffset::east_opt(minutes.checked_mul(60)?).map(Self::new)
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn to_local(&self, instant: DateTime<Utc>) -> NaiveDateTime {
        instant.with_timezone(&self.offset).naive_local()
    }

    pub fn to_utc(&self, local: NaiveDateTime) -> DateTime<Utc> {
        local.and_utc() - Duration::seconds(i64::from(self.offset.local_minus_utc()))
    }

    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        self.to_local(now).date()
    }

    /// `[local midnight, next local midnight)` of `date`, expressed in UTC.
    pub fn day_bounds_utc(&self, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = date.and_time(NaiveTime::MIN);
        (
            self.to_utc(start),
            self.to_utc(start + Duration::days(1)),
        )
    }
}

impl Default for ShopTimezone {
    fn default() -> Self {
        Self::utc()
    }
}

/// Parses "+HH:MM", "-HH:MM" or "Z".
pub fn parse_timezone(value: &str) -> Result<ShopTimezone, TimeFormatError> {
    let error = || TimeFormatError::Offset(value.to_owned());
    let value = value.trim();
    if value.eq_ignore_ascii_case("z") || value.eq_ignore_ascii_case("utc") {
        return Ok(ShopTimezone::utc());
    }

    let (sign, rest) = match value.chars().next() {
        Some('+') => (1, &value[1..]),
        Some('-') => (-1, &value[1..]),
        _ => return Err(error()),
    };
    let (hours, minutes) = rest.split_once(':').ok_or_else(error)?;
    let hours: i32 = hours.parse().map_err(|_| error())?;
    let minutes: i32 = minutes.parse().map_err(|_| error())?;
    if !(0..=23).contains(&hours) || !(0..=59).contains(&minutes) {
        return Err(error());
    }

    ShopTimezone::from_minutes(sign * (hours * 60 + minutes)).ok_or_else(error)
}

/// Serde adapter keeping times of day in the "HH:MM" shape clients send.
pub mod clock_format {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_clock(*time))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_clock(&raw).map_err(serde::de::Error::custom)
    }
}

/// Serde adapter for request instants: ISO-8601 in, RFC 3339 UTC out.
pub mod instant_format {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        instant: &DateTime<Utc>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_instant(*instant))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_instant(&raw).map_err(serde::de::Error::custom)
    }
}
