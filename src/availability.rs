use crate::backend::{AppointmentFilter, ScheduleBackend, ScheduleFilter, StoreError};
use crate::lookup::{EmptyReason, Lookup};
use crate::time_window::{format_clock, parse_date, ShopTimezone};
use crate::types::{AppointmentStatus, DayOfWeek, WeeklySchedule, WeeklyTiming};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use tracing::debug;
use uuid::Uuid;

/// Distance between two candidate slot starts.
pub const SLOT_GRANULARITY_MINUTES: i64 = 30;

/// Half-open local wall-clock interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Interval {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotRequest<'a> {
    pub barber_id: Uuid,
    pub shop_id: Uuid,
    pub date: &'a str,
    pub duration_minutes: u32,
}

/// Intersection of the barber's shift and the shop's hours on `date`.
pub fn working_window(
    date: NaiveDate,
    schedule: &WeeklySchedule,
    timing: &WeeklyTiming,
) -> Option<Interval> {
    let start = schedule.start_time.max(timing.open_time);
    let end = schedule.end_time.min(timing.close_time);
    (start < end).then(|| Interval::new(date.and_time(start), date.and_time(end)))
}

/// Sweeps `busy` (sorted by start) across `window` and returns the gaps.
/// Gaps never extend past the window.
pub fn free_blocks(window: Interval, busy: &[Interval]) -> Vec<Interval> {
    let mut blocks = Vec::new();
    let mut cursor = window.start;

    for taken in busy {
        if cursor >= window.end {
            break;
        }
        if taken.start > cursor {
            let end = taken.start.min(window.end);
            blocks.push(Interval::new(cursor, end));
        }
        cursor = cursor.max(taken.end);
    }
    if window.end > cursor {
        blocks.push(Interval::new(cursor, window.end));
    }
    blocks
}

/// Candidate starts every [`SLOT_GRANULARITY_MINUTES`] from each block start
/// that leave room for `duration` before the block ends.
pub fn slot_starts(blocks: &[Interval], duration: Duration) -> Vec<NaiveDateTime> {
    let step = Duration::minutes(SLOT_GRANULARITY_MINUTES);
    let mut slots = Vec::new();
    for block in blocks {
        let mut candidate = block.start;
        while candidate + duration <= block.end {
            slots.push(candidate);
            candidate += step;
        }
    }
    slots
}

/// Bookable "HH:MM" starts for one barber on one date, in chronological order.
pub fn barber_slots<B: ScheduleBackend>(
    backend: &B,
    timezone: &ShopTimezone,
    request: &SlotRequest<'_>,
) -> Lookup<Vec<String>> {
    compute_barber_slots(backend, timezone, request).into()
}

fn compute_barber_slots<B: ScheduleBackend>(
    backend: &B,
    timezone: &ShopTimezone,
    request: &SlotRequest<'_>,
) -> Result<Lookup<Vec<String>>, StoreError> {
    let Ok(date) = parse_date(request.date) else {
        return Ok(Lookup::Empty(EmptyReason::MalformedDate));
    };
    if request.duration_minutes == 0 {
        return Ok(Lookup::Empty(EmptyReason::InvalidDuration));
    }
    let day = DayOfWeek::of(date);

    let schedule = backend
        .schedules(&ScheduleFilter::for_barber(request.barber_id).on(day).limit(1))?
        .into_iter()
        .next();
    let timing = backend
        .shop_timings(request.shop_id, Some(day))?
        .into_iter()
        .next();
    let (Some(schedule), Some(timing)) = (schedule, timing) else {
        return Ok(Lookup::Empty(EmptyReason::NoSchedule));
    };
    if schedule.is_day_off {
        return Ok(Lookup::Empty(EmptyReason::DayOff));
    }
    if timing.is_closed {
        return Ok(Lookup::Empty(EmptyReason::ShopClosed));
    }
    let Some(window) = working_window(date, &schedule, &timing) else {
        return Ok(Lookup::Empty(EmptyReason::NoWorkingWindow));
    };

    let (day_start, day_end) = timezone.day_bounds_utc(date);
    let appointments = backend.appointments(
        &AppointmentFilter::for_barbers(vec![request.barber_id])
            .excluding(AppointmentStatus::Cancelled)
            .starting_within(day_start, day_end),
    )?;
    let mut busy: Vec<Interval> = appointments
        .iter()
        .map(|appointment| {
            Interval::new(
                timezone.to_local(appointment.start_time),
                timezone.to_local(appointment.end_time),
            )
        })
        .collect();
    busy.sort_by_key(|interval| interval.start);

    let blocks = free_blocks(window, &busy);
    let slots: Vec<String> = slot_starts(
        &blocks,
        Duration::minutes(i64::from(request.duration_minutes)),
    )
    .into_iter()
    .map(|slot| format_clock(slot.time()))
    .collect();

    debug!(
        barber_id = %request.barber_id,
        date = request.date,
        appointments = appointments.len(),
        free_blocks = blocks.len(),
        slots = slots.len(),
        "Calculated barber availability"
    );

    if slots.is_empty() {
        Ok(Lookup::Empty(EmptyReason::FullyBooked))
    } else {
        Ok(Lookup::Found(slots))
    }
}
