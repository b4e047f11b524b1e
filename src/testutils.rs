use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

use chrono::{DateTime, NaiveDateTime, Utc};
use uuid::Uuid;

use crate::{
    backend::{AppointmentFilter, BarberFilter, ScheduleBackend, ScheduleFilter, StoreError},
    local_store::LocalStore,
    time_window::{parse_clock, parse_date, ShopTimezone},
    types::{
        Appointment, AppointmentStatus, Barber, DayOfWeek, NewAppointment, NewBarber, NewShop,
        ScheduleEntry, Service, Shop, TimingEntry, WeeklySchedule, WeeklyTiming,
    },
};

/// Local wall-clock time on `date`.
pub fn local(date: &str, time: &str) -> NaiveDateTime {
    parse_date(date).unwrap().and_time(parse_clock(time).unwrap())
}

/// `date` and `time` read as UTC.
pub fn at(date: &str, time: &str) -> DateTime<Utc> {
    local(date, time).and_utc()
}

/// `date` and `time` read as wall-clock time in `timezone`.
pub fn at_local(timezone: &ShopTimezone, date: &str, time: &str) -> DateTime<Utc> {
    timezone.to_utc(local(date, time))
}

pub fn new_appointment(barber: &Barber, start: DateTime<Utc>, minutes: i64) -> NewAppointment {
    NewAppointment {
        shop_id: barber.shop_id,
        shop_name: "Test Shop".into(),
        barber_id: barber.id,
        barber_name: barber.name.clone(),
        customer_name: "Customer".into(),
        customer_phone: "9876543210".into(),
        customer_gender: None,
        start_time: start,
        end_time: start + chrono::Duration::minutes(minutes),
        status: AppointmentStatus::Booked,
        is_walk_in: false,
        bill_amount: 100.0,
        tax_rate_snapshot: 18.0,
        total_amount: 118.0,
        services_snapshot: vec![],
    }
}

fn timings(open: &str, close: &str, closed_on: Option<DayOfWeek>) -> Vec<TimingEntry> {
    DayOfWeek::ALL
        .into_iter()
        .map(|day| TimingEntry {
            day_of_week: day,
            open_time: parse_clock(open).unwrap(),
            close_time: parse_clock(close).unwrap(),
            is_closed: Some(day) == closed_on,
        })
        .collect()
}

fn add_test_shop(backend: &impl ScheduleBackend, timings: Vec<TimingEntry>) -> Shop {
    backend
        .add_shop(NewShop {
            name: "Test Shop".into(),
            address: "1 Main Road".into(),
            phone_number: "9876543210".into(),
            tax_rate: 18.0,
            timings,
        })
        .unwrap()
}

/// Shop open every day between `open` and `close`, with 18% tax.
pub fn seed_shop(backend: &impl ScheduleBackend, open: &str, close: &str) -> Shop {
    add_test_shop(backend, timings(open, close, None))
}

/// Shop open 09:00-18:00 except on `closed_on`.
pub fn seed_closed_shop(backend: &impl ScheduleBackend, closed_on: DayOfWeek) -> Shop {
    add_test_shop(backend, timings("09:00", "18:00", Some(closed_on)))
}

pub fn seed_barber(backend: &impl ScheduleBackend, shop: &Shop, name: &str) -> Barber {
    backend
        .add_barber(NewBarber {
            name: name.into(),
            contact_info: None,
            shop_id: shop.id,
        })
        .unwrap()
}

/// Replaces the barber's week with working `(day, start, end)` entries.
pub fn seed_schedule(backend: &impl ScheduleBackend, barber: &Barber, days: &[(DayOfWeek, &str, &str)]) {
    let entries = days
        .iter()
        .map(|(day, start, end)| ScheduleEntry {
            day_of_week: *day,
            start_time: parse_clock(start).unwrap(),
            end_time: parse_clock(end).unwrap(),
            is_day_off: false,
        })
        .collect();
    backend
        .replace_schedule(barber.id, barber.shop_id, entries)
        .unwrap();
}

/// Counts calls and fails every one of them once `success` is cleared.
/// Records live in an in-memory store.
pub struct MockScheduleBackendInner {
    pub success: AtomicBool,
    pub calls_to_shops: AtomicU64,
    pub calls_to_shop_timings: AtomicU64,
    pub calls_to_services: AtomicU64,
    pub calls_to_barbers: AtomicU64,
    pub calls_to_schedules: AtomicU64,
    pub calls_to_replace_schedule: AtomicU64,
    pub calls_to_appointments: AtomicU64,
    pub calls_to_create_appointment: AtomicU64,
    pub calls_to_update_appointment_status: AtomicU64,
    pub store: LocalStore,
}

#[derive(Clone)]
pub struct MockScheduleBackend(pub Arc<MockScheduleBackendInner>);

impl MockScheduleBackendInner {
    fn new() -> Self {
        Self {
            success: AtomicBool::new(true),
            calls_to_shops: AtomicU64::default(),
            calls_to_shop_timings: AtomicU64::default(),
            calls_to_services: AtomicU64::default(),
            calls_to_barbers: AtomicU64::default(),
            calls_to_schedules: AtomicU64::default(),
            calls_to_replace_schedule: AtomicU64::default(),
            calls_to_appointments: AtomicU64::default(),
            calls_to_create_appointment: AtomicU64::default(),
            calls_to_update_appointment_status: AtomicU64::default(),
            store: LocalStore::default(),
        }
    }

    fn counters(&self) -> [&AtomicU64; 9] {
        [
            &self.calls_to_shops,
            &self.calls_to_shop_timings,
            &self.calls_to_services,
            &self.calls_to_barbers,
            &self.calls_to_schedules,
            &self.calls_to_replace_schedule,
            &self.calls_to_appointments,
            &self.calls_to_create_appointment,
            &self.calls_to_update_appointment_status,
        ]
    }
}

impl MockScheduleBackend {
    pub fn new() -> Self {
        Self(Arc::new(MockScheduleBackendInner::new()))
    }

    pub fn reset_counters(&self) {
        for counter in self.0.counters() {
            counter.store(0, Ordering::SeqCst);
        }
    }

    fn result(&self, counter: &AtomicU64) -> Result<(), StoreError> {
        counter.fetch_add(1, Ordering::SeqCst);
        self.check()
    }

    fn check(&self) -> Result<(), StoreError> {
        match self.0.success.load(Ordering::SeqCst) {
            true => Ok(()),
            false => Err(StoreError::Unavailable("Supposed to fail".into())),
        }
    }
}

impl ScheduleBackend for MockScheduleBackend {
    fn shops(&self) -> Result<Vec<Shop>, StoreError> {
        self.result(&self.0.calls_to_shops)?;
        self.0.store.shops()
    }

    fn shop(&self, id: Uuid) -> Result<Shop, StoreError> {
        self.result(&self.0.calls_to_shops)?;
        self.0.store.shop(id)
    }

    fn add_shop(&self, shop: NewShop) -> Result<Shop, StoreError> {
        self.check()?;
        self.0.store.add_shop(shop)
    }

    fn shop_timings(
        &self,
        shop_id: Uuid,
        day: Option<DayOfWeek>,
    ) -> Result<Vec<WeeklyTiming>, StoreError> {
        self.result(&self.0.calls_to_shop_timings)?;
        self.0.store.shop_timings(shop_id, day)
    }

    fn services(&self) -> Result<Vec<Service>, StoreError> {
        self.result(&self.0.calls_to_services)?;
        self.0.store.services()
    }

    fn add_service(&self, name: String, duration: u32, price: f64) -> Result<Service, StoreError> {
        self.check()?;
        self.0.store.add_service(name, duration, price)
    }

    fn barber(&self, id: Uuid) -> Result<Barber, StoreError> {
        self.result(&self.0.calls_to_barbers)?;
        self.0.store.barber(id)
    }

    fn barbers(&self, filter: &BarberFilter) -> Result<Vec<Barber>, StoreError> {
        self.result(&self.0.calls_to_barbers)?;
        self.0.store.barbers(filter)
    }

    fn add_barber(&self, barber: NewBarber) -> Result<Barber, StoreError> {
        self.check()?;
        self.0.store.add_barber(barber)
    }

    fn schedules(&self, filter: &ScheduleFilter) -> Result<Vec<WeeklySchedule>, StoreError> {
        self.result(&self.0.calls_to_schedules)?;
        self.0.store.schedules(filter)
    }

    fn replace_schedule(
        &self,
        barber_id: Uuid,
        shop_id: Uuid,
        entries: Vec<ScheduleEntry>,
    ) -> Result<Vec<WeeklySchedule>, StoreError> {
        self.result(&self.0.calls_to_replace_schedule)?;
        self.0.store.replace_schedule(barber_id, shop_id, entries)
    }

    fn appointment(&self, id: Uuid) -> Result<Appointment, StoreError> {
        self.result(&self.0.calls_to_appointments)?;
        self.0.store.appointment(id)
    }

    fn appointments(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, StoreError> {
        self.result(&self.0.calls_to_appointments)?;
        self.0.store.appointments(filter)
    }

    fn create_appointment(&self, appointment: NewAppointment) -> Result<Appointment, StoreError> {
        self.result(&self.0.calls_to_create_appointment)?;
        self.0.store.create_appointment(appointment)
    }

    fn update_appointment_status(
        &self,
        id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Appointment, StoreError> {
        self.result(&self.0.calls_to_update_appointment_status)?;
        self.0.store.update_appointment_status(id, status)
    }
}
