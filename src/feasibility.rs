use crate::backend::{ScheduleBackend, ScheduleFilter, StoreError};
use crate::lookup::Lookup;
use crate::time_window::format_date;
use crate::types::{DayOfWeek, WeeklySchedule, WeeklyTiming};
use chrono::{Duration, NaiveDate};
use futures::future::join_all;
use std::collections::HashMap;
use tracing::{debug, error};
use uuid::Uuid;

/// Number of dates offered for booking, today included.
pub const BOOKING_HORIZON_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarberChoice {
    Any,
    Specific(Uuid),
}

impl std::str::FromStr for BarberChoice {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.trim().eq_ignore_ascii_case("any") {
            return Ok(BarberChoice::Any);
        }
        Uuid::parse_str(value.trim())
            .map(BarberChoice::Specific)
            .map_err(|_| format!("barber_id must be 'any' or a barber id, got '{value}'"))
    }
}

impl<'de> serde::Deserialize<'de> for BarberChoice {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

pub fn horizon(today: NaiveDate, days: i64) -> Vec<NaiveDate> {
    (0..days).map(|offset| today + Duration::days(offset)).collect()
}

/// A day is workable when the barber has a working entry and the shop is open.
/// Both the per-day and the batch scan decide through this one predicate.
fn is_workable(schedule: Option<&WeeklySchedule>, timing: Option<&WeeklyTiming>) -> bool {
    matches!(
        (schedule, timing),
        (Some(schedule), Some(timing)) if !schedule.is_day_off && !timing.is_closed
    )
}

/// Per-day answer for one barber; the reference the batch scan is checked against.
#[cfg(test)]
pub fn is_barber_working_on<B: ScheduleBackend>(
    backend: &B,
    barber_id: Uuid,
    shop_id: Uuid,
    date: NaiveDate,
) -> Result<bool, StoreError> {
    let day = DayOfWeek::of(date);
    let schedule = backend
        .schedules(&ScheduleFilter::for_barber(barber_id).on(day).limit(1))?
        .into_iter()
        .next();
    let timing = backend.shop_timings(shop_id, Some(day))?.into_iter().next();
    Ok(is_workable(schedule.as_ref(), timing.as_ref()))
}

pub fn is_any_barber_working_on<B: ScheduleBackend>(
    backend: &B,
    shop_id: Uuid,
    date: NaiveDate,
) -> Result<bool, StoreError> {
    let day = DayOfWeek::of(date);
    let open = backend
        .shop_timings(shop_id, Some(day))?
        .first()
        .is_some_and(|timing| !timing.is_closed);
    if !open {
        return Ok(false);
    }
    let scheduled = backend.schedules(
        &ScheduleFilter::for_shop(shop_id)
            .on(day)
            .working_only()
            .limit(1),
    )?;
    Ok(!scheduled.is_empty())
}

/// Same answer as [`is_barber_working_on`] for every date, from exactly two
/// store reads: the whole weekly schedule and the whole weekly timing.
pub fn workable_dates_batch<B: ScheduleBackend>(
    backend: &B,
    barber_id: Uuid,
    shop_id: Uuid,
    dates: &[NaiveDate],
) -> Result<Vec<NaiveDate>, StoreError> {
    let mut schedules: HashMap<DayOfWeek, WeeklySchedule> = HashMap::new();
    for schedule in backend.schedules(&ScheduleFilter::for_barber(barber_id))? {
        schedules.entry(schedule.day_of_week).or_insert(schedule);
    }
    let mut timings: HashMap<DayOfWeek, WeeklyTiming> = HashMap::new();
    for timing in backend.shop_timings(shop_id, None)? {
        timings.entry(timing.day_of_week).or_insert(timing);
    }

    Ok(dates
        .iter()
        .copied()
        .filter(|date| {
            let day = DayOfWeek::of(*date);
            is_workable(schedules.get(&day), timings.get(&day))
        })
        .collect())
}

/// Dates within the booking horizon starting at `today` on which the choice
/// of barber can work, as "YYYY-MM-DD".
pub async fn available_dates<B: ScheduleBackend>(
    backend: &B,
    shop_id: Uuid,
    choice: BarberChoice,
    today: NaiveDate,
) -> Lookup<Vec<String>> {
    let dates = horizon(today, BOOKING_HORIZON_DAYS);

    let workable = match choice {
        BarberChoice::Specific(barber_id) => {
            let backend = backend.clone();
            let scan = tokio::task::spawn_blocking(move || {
                workable_dates_batch(&backend, barber_id, shop_id, &dates)
            })
            .await;
            match scan {
                Ok(Ok(workable)) => workable,
                Ok(Err(err)) => return Lookup::Failed(err),
                Err(err) => return Lookup::Failed(StoreError::Unavailable(err.to_string())),
            }
        }
        BarberChoice::Any => {
            let checks = dates.iter().copied().map(|date| {
                let backend = backend.clone();
                tokio::task::spawn_blocking(move || {
                    (date, is_any_barber_working_on(&backend, shop_id, date))
                })
            });
            join_all(checks)
                .await
                .into_iter()
                .filter_map(|result| match result {
                    Ok((date, Ok(true))) => Some(date),
                    Ok((_, Ok(false))) => None,
                    Ok((date, Err(err))) => {
                        error!(%err, %date, "Any-barber date check failed, treating as closed");
                        None
                    }
                    Err(err) => {
                        error!(?err, "Date check task failed");
                        None
                    }
                })
                .collect()
        }
    };

    debug!(%shop_id, ?choice, workable = workable.len(), "Scanned booking horizon");
    Lookup::Found(workable.into_iter().map(format_date).collect())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::local_store::LocalStore;
    use crate::testutils::{
        seed_barber, seed_closed_shop, seed_schedule, seed_shop, MockScheduleBackend,
    };
    use crate::time_window::{parse_clock, parse_date};
    use crate::types::ScheduleEntry;
    use std::sync::atomic::Ordering;
    use test_case::test_case;

    fn monday() -> NaiveDate {
        parse_date("2025-09-15").unwrap()
    }

    #[test]
    fn test_horizon_is_seven_consecutive_days() {
        let dates = horizon(monday(), BOOKING_HORIZON_DAYS);
        assert_eq!(dates.len(), 7);
        assert_eq!(dates[0], monday());
        assert_eq!(dates[6], parse_date("2025-09-21").unwrap());
    }

    #[test_case("any", BarberChoice::Any ; "lowercase any")]
    #[test_case("ANY", BarberChoice::Any ; "uppercase any")]
    #[test_case("6f9619ff-8b86-d011-b42d-00cf4fc964ff", BarberChoice::Specific(Uuid::parse_str("6f9619ff-8b86-d011-b42d-00cf4fc964ff").unwrap()) ; "barber id")]
    fn test_parse_barber_choice(value: &str, expected: BarberChoice) {
        assert_eq!(value.parse::<BarberChoice>().unwrap(), expected);
    }

    #[test]
    fn test_parse_barber_choice_rejects_garbage() {
        "someone".parse::<BarberChoice>().unwrap_err();
    }

    #[test]
    fn test_batch_matches_per_day_scan() {
        let store = LocalStore::default();
        let shop = seed_closed_shop(&store, DayOfWeek::Wednesday);
        let barber = seed_barber(&store, &shop, "Ravi");
        let entry = |day, is_day_off| ScheduleEntry {
            day_of_week: day,
            start_time: parse_clock("10:00").unwrap(),
            end_time: parse_clock("16:00").unwrap(),
            is_day_off,
        };
        store
            .replace_schedule(
                barber.id,
                shop.id,
                vec![
                    entry(DayOfWeek::Monday, false),
                    entry(DayOfWeek::Tuesday, true),
                    entry(DayOfWeek::Wednesday, false),
                    entry(DayOfWeek::Friday, false),
                    entry(DayOfWeek::Sunday, false),
                ],
            )
            .unwrap();
        let dates = horizon(monday(), 21);

        let batch = workable_dates_batch(&store, barber.id, shop.id, &dates).unwrap();
        let per_day: Vec<NaiveDate> = dates
            .iter()
            .copied()
            .filter(|date| is_barber_working_on(&store, barber.id, shop.id, *date).unwrap())
            .collect();

        assert_eq!(batch, per_day);
        let days: Vec<DayOfWeek> = batch.iter().take(3).map(|d| DayOfWeek::of(*d)).collect();
        assert_eq!(
            days,
            vec![DayOfWeek::Monday, DayOfWeek::Friday, DayOfWeek::Sunday]
        );
    }

    #[test]
    fn test_batch_uses_two_reads() {
        let backend = MockScheduleBackend::new();
        let shop = seed_shop(&backend, "09:00", "18:00");
        let barber = seed_barber(&backend, &shop, "Ravi");
        seed_schedule(&backend, &barber, &[(DayOfWeek::Monday, "10:00", "16:00")]);
        backend.reset_counters();

        let dates = horizon(monday(), BOOKING_HORIZON_DAYS);
        let workable = workable_dates_batch(&backend, barber.id, shop.id, &dates).unwrap();

        assert_eq!(workable, vec![monday()]);
        assert_eq!(backend.0.calls_to_schedules.load(Ordering::SeqCst), 1);
        assert_eq!(backend.0.calls_to_shop_timings.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_any_barber_needs_open_shop_and_working_barber() {
        let store = LocalStore::default();
        let shop = seed_closed_shop(&store, DayOfWeek::Monday);
        let ravi = seed_barber(&store, &shop, "Ravi");
        let arjun = seed_barber(&store, &shop, "Arjun");
        seed_schedule(
            &store,
            &ravi,
            &[(DayOfWeek::Monday, "10:00", "16:00"), (DayOfWeek::Tuesday, "10:00", "16:00")],
        );
        seed_schedule(&store, &arjun, &[(DayOfWeek::Thursday, "10:00", "16:00")]);

        let tuesday = monday() + Duration::days(1);
        let wednesday = monday() + Duration::days(2);
        let thursday = monday() + Duration::days(3);
        assert!(!is_any_barber_working_on(&store, shop.id, monday()).unwrap());
        assert!(is_any_barber_working_on(&store, shop.id, tuesday).unwrap());
        assert!(!is_any_barber_working_on(&store, shop.id, wednesday).unwrap());
        assert!(is_any_barber_working_on(&store, shop.id, thursday).unwrap());
    }

    #[tokio::test]
    async fn test_available_dates_for_any_and_specific() {
        let store = LocalStore::default();
        let shop = seed_shop(&store, "09:00", "18:00");
        let ravi = seed_barber(&store, &shop, "Ravi");
        let arjun = seed_barber(&store, &shop, "Arjun");
        seed_schedule(&store, &ravi, &[(DayOfWeek::Monday, "10:00", "16:00")]);
        seed_schedule(&store, &arjun, &[(DayOfWeek::Saturday, "10:00", "16:00")]);

        let any = available_dates(&store, shop.id, BarberChoice::Any, monday())
            .await
            .into_degraded("test");
        let specific = available_dates(&store, shop.id, BarberChoice::Specific(arjun.id), monday())
            .await
            .into_degraded("test");

        assert_eq!(any, vec!["2025-09-15", "2025-09-20"]);
        assert_eq!(specific, vec!["2025-09-20"]);
    }

    #[tokio::test]
    async fn test_available_dates_failure_is_empty() {
        let backend = MockScheduleBackend::new();
        let shop = seed_shop(&backend, "09:00", "18:00");
        let barber = seed_barber(&backend, &shop, "Ravi");
        seed_schedule(&backend, &barber, &[(DayOfWeek::Monday, "10:00", "16:00")]);
        backend.0.success.store(false, Ordering::SeqCst);

        let specific =
            available_dates(&backend, shop.id, BarberChoice::Specific(barber.id), monday()).await;
        let any = available_dates(&backend, shop.id, BarberChoice::Any, monday()).await;

        assert!(matches!(specific, Lookup::Failed(_)));
        assert_eq!(any, Lookup::Found(vec![]));
    }
}
