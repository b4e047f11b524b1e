use crate::backend::{AppointmentFilter, BarberFilter, ScheduleBackend, ScheduleFilter, StoreError};
use crate::types::{
    Appointment, AppointmentStatus, Barber, DayOfWeek, NewAppointment, NewBarber, NewShop,
    ScheduleEntry, Service, Shop, WeeklySchedule, WeeklyTiming,
};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs,
    path::Path,
    sync::{Arc, Mutex, MutexGuard},
};
use tracing::info;
use uuid::Uuid;

/// Initial records for an in-memory store, usually read from a JSON file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedData {
    pub shops: Vec<Shop>,
    pub shop_timings: Vec<WeeklyTiming>,
    pub services: Vec<Service>,
    pub barbers: Vec<Barber>,
    pub schedules: Vec<WeeklySchedule>,
    pub appointments: Vec<Appointment>,
}

#[derive(Debug, Default)]
struct Collections {
    shops: HashMap<Uuid, Shop>,
    shop_timings: Vec<WeeklyTiming>,
    services: HashMap<Uuid, Service>,
    barbers: HashMap<Uuid, Barber>,
    schedules: Vec<WeeklySchedule>,
    appointments: HashMap<Uuid, Appointment>,
}

/// Non-persistent backend. Everything is lost when the process exits.
#[derive(Debug, Clone, Default)]
pub struct LocalStore {
    collections: Arc<Mutex<Collections>>,
}

impl LocalStore {
    pub fn from_seed(seed: SeedData) -> Self {
        let collections = Collections {
            shops: seed.shops.into_iter().map(|shop| (shop.id, shop)).collect(),
            shop_timings: seed.shop_timings,
            services: seed
                .services
                .into_iter()
                .map(|service| (service.id, service))
                .collect(),
            barbers: seed
                .barbers
                .into_iter()
                .map(|barber| (barber.id, barber))
                .collect(),
            schedules: seed.schedules,
            appointments: seed
                .appointments
                .into_iter()
                .map(|appointment| (appointment.id, appointment))
                .collect(),
        };
        Self {
            collections: Arc::new(Mutex::new(collections)),
        }
    }

    pub fn load_seed_file(path: &Path) -> Result<Self, StoreError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            StoreError::Unavailable(format!("Can't read seed file {}: {err}", path.display()))
        })?;
        let seed: SeedData = serde_json::from_str(&contents).map_err(|err| {
            StoreError::Corrupt(format!("Seed file {} is invalid: {err}", path.display()))
        })?;
        info!(
            shops = seed.shops.len(),
            barbers = seed.barbers.len(),
            appointments = seed.appointments.len(),
            "Loaded seed data from {}",
            path.display()
        );
        Ok(Self::from_seed(seed))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Collections>, StoreError> {
        self.collections
            .lock()
            .map_err(|_| StoreError::Unavailable("local store lock poisoned".into()))
    }

    /// Edits a catalogue entry in place.
    #[cfg(test)]
    pub fn replace_service(&self, service: Service) -> Result<(), StoreError> {
        let mut collections = self.lock()?;
        let stored = collections
            .services
            .get_mut(&service.id)
            .ok_or_else(|| StoreError::NotFound(format!("Service {}", service.id)))?;
        *stored = service;
        Ok(())
    }
}

fn take_limit<T>(records: Vec<T>, limit: Option<usize>) -> Vec<T> {
    match limit {
        Some(limit) => records.into_iter().take(limit).collect(),
        None => records,
    }
}

impl ScheduleBackend for LocalStore {
    fn shops(&self) -> Result<Vec<Shop>, StoreError> {
        let mut shops: Vec<Shop> = self.lock()?.shops.values().cloned().collect();
        shops.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(shops)
    }

    fn shop(&self, id: Uuid) -> Result<Shop, StoreError> {
        self.lock()?
            .shops
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("Shop {id}")))
    }

    fn add_shop(&self, shop: NewShop) -> Result<Shop, StoreError> {
        let mut collections = self.lock()?;
        let created = Shop {
            id: Uuid::new_v4(),
            name: shop.name,
            address: shop.address,
            phone_number: shop.phone_number,
            tax_rate: shop.tax_rate,
        };
        for timing in shop.timings {
            collections.shop_timings.retain(|existing| {
                existing.shop_id != created.id || existing.day_of_week != timing.day_of_week
            });
            collections.shop_timings.push(WeeklyTiming {
                id: Uuid::new_v4(),
                shop_id: created.id,
                day_of_week: timing.day_of_week,
                open_time: timing.open_time,
                close_time: timing.close_time,
                is_closed: timing.is_closed,
            });
        }
        collections.shops.insert(created.id, created.clone());
        Ok(created)
    }

    fn shop_timings(
        &self,
        shop_id: Uuid,
        day: Option<DayOfWeek>,
    ) -> Result<Vec<WeeklyTiming>, StoreError> {
        let mut timings: Vec<WeeklyTiming> = self
            .lock()?
            .shop_timings
            .iter()
            .filter(|timing| timing.shop_id == shop_id)
            .filter(|timing| day.map_or(true, |day| timing.day_of_week == day))
            .cloned()
            .collect();
        timings.sort_by_key(|timing| timing.day_of_week);
        Ok(timings)
    }

    fn services(&self) -> Result<Vec<Service>, StoreError> {
        let mut services: Vec<Service> = self.lock()?.services.values().cloned().collect();
        services.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(services)
    }

    #[cfg(test)]
    fn add_service(&self, name: String, duration: u32, price: f64) -> Result<Service, StoreError> {
        let service = Service {
            id: Uuid::new_v4(),
            name,
            duration,
            price,
        };
        self.lock()?.services.insert(service.id, service.clone());
        Ok(service)
    }

    fn barber(&self, id: Uuid) -> Result<Barber, StoreError> {
        self.lock()?
            .barbers
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("Barber {id}")))
    }

    fn barbers(&self, filter: &BarberFilter) -> Result<Vec<Barber>, StoreError> {
        let mut barbers: Vec<Barber> = self
            .lock()?
            .barbers
            .values()
            .filter(|barber| filter.matches(barber))
            .cloned()
            .collect();
        barbers.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(take_limit(barbers, filter.limit))
    }

    fn add_barber(&self, barber: NewBarber) -> Result<Barber, StoreError> {
        let created = Barber {
            id: Uuid::new_v4(),
            name: barber.name,
            contact_info: barber.contact_info,
            shop_id: barber.shop_id,
        };
        self.lock()?.barbers.insert(created.id, created.clone());
        Ok(created)
    }

    fn schedules(&self, filter: &ScheduleFilter) -> Result<Vec<WeeklySchedule>, StoreError> {
        let mut schedules: Vec<WeeklySchedule> = self
            .lock()?
            .schedules
            .iter()
            .filter(|schedule| filter.matches(schedule))
            .cloned()
            .collect();
        schedules.sort_by_key(|schedule| (schedule.day_of_week, schedule.barber_id));
        Ok(take_limit(schedules, filter.limit))
    }

    fn replace_schedule(
        &self,
        barber_id: Uuid,
        shop_id: Uuid,
        entries: Vec<ScheduleEntry>,
    ) -> Result<Vec<WeeklySchedule>, StoreError> {
        let mut collections = self.lock()?;
        if !collections.barbers.contains_key(&barber_id) {
            return Err(StoreError::NotFound(format!("Barber {barber_id}")));
        }
        collections
            .schedules
            .retain(|schedule| schedule.barber_id != barber_id);

        let mut replaced: Vec<WeeklySchedule> = entries
            .into_iter()
            .map(|entry| WeeklySchedule {
                id: Uuid::new_v4(),
                barber_id,
                shop_id,
                day_of_week: entry.day_of_week,
                start_time: entry.start_time,
                end_time: entry.end_time,
                is_day_off: entry.is_day_off,
            })
            .collect();
        replaced.sort_by_key(|schedule| schedule.day_of_week);
        collections.schedules.extend(replaced.iter().cloned());
        Ok(replaced)
    }

    fn appointment(&self, id: Uuid) -> Result<Appointment, StoreError> {
        self.lock()?
            .appointments
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("Appointment {id}")))
    }

    fn appointments(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, StoreError> {
        let mut appointments: Vec<Appointment> = self
            .lock()?
            .appointments
            .values()
            .filter(|appointment| filter.matches(appointment))
            .cloned()
            .collect();
        appointments.sort_by(|a, b| a.start_time.cmp(&b.start_time).then(a.id.cmp(&b.id)));

        let appointments = appointments
            .into_iter()
            .skip(filter.offset.unwrap_or(0))
            .collect();
        Ok(take_limit(appointments, filter.limit))
    }

    fn create_appointment(&self, appointment: NewAppointment) -> Result<Appointment, StoreError> {
        let created = appointment.with_id(Uuid::new_v4());
        self.lock()?
            .appointments
            .insert(created.id, created.clone());
        Ok(created)
    }

    fn update_appointment_status(
        &self,
        id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Appointment, StoreError> {
        let mut collections = self.lock()?;
        let appointment = collections
            .appointments
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("Appointment {id}")))?;
        appointment.status = status;
        Ok(appointment.clone())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testutils::{at, new_appointment, seed_barber, seed_shop};
    use std::io::Write;

    #[test]
    fn test_appointments_are_filtered_and_ordered() {
        let store = LocalStore::default();
        let shop = seed_shop(&store, "09:00", "18:00");
        let barber = seed_barber(&store, &shop, "Ravi");
        let other = seed_barber(&store, &shop, "Arjun");

        let late = store
            .create_appointment(new_appointment(&barber, at("2025-09-15", "15:00"), 30))
            .unwrap();
        let early = store
            .create_appointment(new_appointment(&barber, at("2025-09-15", "10:00"), 30))
            .unwrap();
        store
            .create_appointment(new_appointment(&other, at("2025-09-15", "11:00"), 30))
            .unwrap();
        let cancelled = store
            .create_appointment(new_appointment(&barber, at("2025-09-15", "12:00"), 30))
            .unwrap();
        store
            .update_appointment_status(cancelled.id, AppointmentStatus::Cancelled)
            .unwrap();

        let filter = AppointmentFilter::for_barbers(vec![barber.id])
            .excluding(AppointmentStatus::Cancelled);
        let found = store.appointments(&filter).unwrap();

        let ids: Vec<Uuid> = found.iter().map(|appointment| appointment.id).collect();
        assert_eq!(ids, vec![early.id, late.id]);
    }

    #[test]
    fn test_appointment_pages() {
        let store = LocalStore::default();
        let shop = seed_shop(&store, "09:00", "18:00");
        let barber = seed_barber(&store, &shop, "Ravi");
        for hour in ["09:00", "10:00", "11:00", "12:00", "13:00"] {
            store
                .create_appointment(new_appointment(&barber, at("2025-09-15", hour), 30))
                .unwrap();
        }

        let filter = AppointmentFilter::for_shop(shop.id);
        assert_eq!(store.appointments(&filter.clone().page(2, 0)).unwrap().len(), 2);
        assert_eq!(store.appointments(&filter.clone().page(2, 4)).unwrap().len(), 1);
        assert!(store.appointments(&filter.page(2, 6)).unwrap().is_empty());
    }

    #[test]
    fn test_replace_schedule_drops_previous_entries() {
        let store = LocalStore::default();
        let shop = seed_shop(&store, "09:00", "18:00");
        let barber = seed_barber(&store, &shop, "Ravi");
        let entry = |day, is_day_off| ScheduleEntry {
            day_of_week: day,
            start_time: crate::time_window::parse_clock("10:00").unwrap(),
            end_time: crate::time_window::parse_clock("16:00").unwrap(),
            is_day_off,
        };

        store
            .replace_schedule(barber.id, shop.id, vec![entry(DayOfWeek::Monday, false)])
            .unwrap();
        store
            .replace_schedule(
                barber.id,
                shop.id,
                vec![entry(DayOfWeek::Friday, false), entry(DayOfWeek::Tuesday, true)],
            )
            .unwrap();

        let schedules = store.schedules(&ScheduleFilter::for_barber(barber.id)).unwrap();
        let days: Vec<DayOfWeek> = schedules.iter().map(|s| s.day_of_week).collect();
        assert_eq!(days, vec![DayOfWeek::Tuesday, DayOfWeek::Friday]);

        let working = store
            .schedules(&ScheduleFilter::for_shop(shop.id).working_only())
            .unwrap();
        assert_eq!(working.len(), 1);

        store
            .replace_schedule(Uuid::new_v4(), shop.id, vec![])
            .unwrap_err();
    }

    #[test]
    fn test_missing_records_are_not_found() {
        let store = LocalStore::default();
        assert!(matches!(
            store.appointment(Uuid::new_v4()),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.update_appointment_status(Uuid::new_v4(), AppointmentStatus::Completed),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(store.shop(Uuid::new_v4()), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_load_seed_file() {
        let source = LocalStore::default();
        let shop = seed_shop(&source, "09:00", "18:00");
        let barber = seed_barber(&source, &shop, "Ravi");
        let seed = SeedData {
            shops: source.shops().unwrap(),
            shop_timings: source.shop_timings(shop.id, None).unwrap(),
            barbers: vec![barber.clone()],
            ..SeedData::default()
        };

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(serde_json::to_string_pretty(&seed).unwrap().as_bytes())
            .unwrap();

        let store = LocalStore::load_seed_file(file.path()).unwrap();
        assert_eq!(store.shop(shop.id).unwrap(), shop);
        assert_eq!(store.shop_timings(shop.id, None).unwrap().len(), 7);
        assert_eq!(
            store.barbers(&BarberFilter::for_shop(shop.id)).unwrap(),
            vec![barber]
        );
    }

    #[test]
    fn test_load_invalid_seed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{ not json").unwrap();
        assert!(matches!(
            LocalStore::load_seed_file(file.path()),
            Err(StoreError::Corrupt(_))
        ));
    }
}
