use crate::backend::{
    AppointmentFilter, BarberFilter, ScheduleBackend, ScheduleFilter, StoreError,
};
use crate::lookup::{EmptyReason, Lookup};
use crate::time_window::{format_clock, ShopTimezone};
use crate::types::{AppointmentStatus, Barber, DayOfWeek};
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use tracing::debug;
use uuid::Uuid;

/// Barbers of the shop who can start a `duration_minutes` job at `now` and
/// finish it without running into their shift end or a known appointment.
pub fn find_walk_in_barbers<B: ScheduleBackend>(
    backend: &B,
    timezone: &ShopTimezone,
    shop_id: Uuid,
    duration_minutes: u32,
    now: DateTime<Utc>,
) -> Lookup<Vec<Barber>> {
    compute_walk_in_barbers(backend, timezone, shop_id, duration_minutes, now).into()
}

fn compute_walk_in_barbers<B: ScheduleBackend>(
    backend: &B,
    timezone: &ShopTimezone,
    shop_id: Uuid,
    duration_minutes: u32,
    now: DateTime<Utc>,
) -> Result<Lookup<Vec<Barber>>, StoreError> {
    if duration_minutes == 0 {
        return Ok(Lookup::Empty(EmptyReason::InvalidDuration));
    }
    let required_end = now + Duration::minutes(i64::from(duration_minutes));
    let now_local = timezone.to_local(now);
    let required_end_local = timezone.to_local(required_end);
    // Shifts are same-day wall-clock ranges; nothing covers a job past midnight.
    if required_end_local.date() != now_local.date() {
        return Ok(Lookup::Empty(EmptyReason::NoBarbersOnShift));
    }
    let today = DayOfWeek::of(now_local.date());

    let on_shift: Vec<Uuid> = backend
        .schedules(&ScheduleFilter::for_shop(shop_id).on(today).working_only())?
        .into_iter()
        .filter(|schedule| {
            schedule.start_time <= now_local.time()
                && schedule.end_time >= required_end_local.time()
        })
        .map(|schedule| schedule.barber_id)
        .collect();
    if on_shift.is_empty() {
        return Ok(Lookup::Empty(EmptyReason::NoBarbersOnShift));
    }

    // A booking that has already started counts as running even before a
    // manager marks it in progress.
    let busy: HashSet<Uuid> = backend
        .appointments(
            &AppointmentFilter::for_barbers(on_shift.clone())
                .with_status(vec![AppointmentStatus::InProgress, AppointmentStatus::Booked])
                .overlapping(now, required_end),
        )?
        .into_iter()
        .map(|appointment| appointment.barber_id)
        .collect();
    let candidates: Vec<Uuid> = on_shift
        .into_iter()
        .filter(|barber_id| !busy.contains(barber_id))
        .collect();
    if candidates.is_empty() {
        return Ok(Lookup::Empty(EmptyReason::FullyBooked));
    }

    let (_, day_end) = timezone.day_bounds_utc(now_local.date());
    let upcoming = backend.appointments(
        &AppointmentFilter::for_barbers(candidates.clone())
            .excluding(AppointmentStatus::Cancelled)
            .excluding(AppointmentStatus::InProgress)
            .starting_within(now, day_end),
    )?;
    // Ordered by start, so the first hit per barber is the next appointment.
    let mut next_start: HashMap<Uuid, DateTime<Utc>> = HashMap::new();
    for appointment in upcoming {
        next_start
            .entry(appointment.barber_id)
            .or_insert(appointment.start_time);
    }

    let available: Vec<Uuid> = candidates
        .into_iter()
        .filter(|barber_id| {
            next_start
                .get(barber_id)
                .map_or(true, |start| required_end <= *start)
        })
        .collect();

    debug!(
        %shop_id,
        now = %format_clock(now_local.time()),
        required_end = %format_clock(required_end_local.time()),
        available = available.len(),
        "Walk-in availability"
    );
    if available.is_empty() {
        return Ok(Lookup::Empty(EmptyReason::FullyBooked));
    }

    Ok(Lookup::Found(
        backend.barbers(&BarberFilter::with_ids(available))?,
    ))
}
