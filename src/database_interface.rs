use crate::backend::{AppointmentFilter, BarberFilter, ScheduleBackend, ScheduleFilter, StoreError};
use crate::schema::{appointments, barbers, schedules, services, shop_timings, shops};
use crate::time_window::{format_clock, parse_clock};
use crate::types::{
    Appointment, AppointmentStatus, Barber, DayOfWeek, NewAppointment, NewBarber, NewShop,
    ScheduleEntry, Service, ServiceSnapshot, Shop, WeeklySchedule, WeeklyTiming,
};
use chrono::{DateTime, NaiveTime, Utc};
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::{ConnectionError, PgConnection};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{error, info};
use uuid::Uuid;

impl From<diesel::result::Error> for StoreError {
    fn from(err: diesel::result::Error) -> Self {
        match err {
            diesel::result::Error::NotFound => StoreError::NotFound("Record".into()),
            other => {
                error!(%other, "Database request failed");
                StoreError::Unavailable(other.to_string())
            }
        }
    }
}

fn corrupt(what: &str, value: &str) -> StoreError {
    StoreError::Corrupt(format!("{what} '{value}'"))
}

/// LIMIT/OFFSET operand. Counts past `i64::MAX` can't be meant literally.
fn sql_count(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn read_day(value: &str) -> Result<DayOfWeek, StoreError> {
    value.parse().map_err(|_| corrupt("day of week", value))
}

fn read_clock(value: &str) -> Result<NaiveTime, StoreError> {
    parse_clock(value).map_err(|_| corrupt("time of day", value))
}

#[derive(Queryable, Selectable, Insertable)]
#[diesel(table_name = shops, check_for_backend(Pg))]
struct ShopRow {
    id: Uuid,
    name: String,
    address: String,
    phone_number: String,
    tax_rate: f64,
}

impl From<ShopRow> for Shop {
    fn from(row: ShopRow) -> Self {
        Shop {
            id: row.id,
            name: row.name,
            address: row.address,
            phone_number: row.phone_number,
            tax_rate: row.tax_rate,
        }
    }
}

#[derive(Queryable, Selectable, Insertable)]
#[diesel(table_name = shop_timings, check_for_backend(Pg))]
struct TimingRow {
    id: Uuid,
    shop_id: Uuid,
    day_of_week: String,
    open_time: String,
    close_time: String,
    is_closed: bool,
}

impl TryFrom<TimingRow> for WeeklyTiming {
    type Error = StoreError;

    fn try_from(row: TimingRow) -> Result<Self, Self::Error> {
        Ok(WeeklyTiming {
            id: row.id,
            shop_id: row.shop_id,
            day_of_week: read_day(&row.day_of_week)?,
            open_time: read_clock(&row.open_time)?,
            close_time: read_clock(&row.close_time)?,
            is_closed: row.is_closed,
        })
    }
}

#[derive(Queryable, Selectable, Insertable)]
#[diesel(table_name = services, check_for_backend(Pg))]
struct ServiceRow {
    id: Uuid,
    name: String,
    duration: i32,
    price: f64,
}

impl TryFrom<ServiceRow> for Service {
    type Error = StoreError;

    fn try_from(row: ServiceRow) -> Result<Self, Self::Error> {
        Ok(Service {
            id: row.id,
            duration: u32::try_from(row.duration)
                .map_err(|_| corrupt("service duration", &row.duration.to_string()))?,
            name: row.name,
            price: row.price,
        })
    }
}

#[derive(Queryable, Selectable, Insertable)]
#[diesel(table_name = barbers, check_for_backend(Pg))]
struct BarberRow {
    id: Uuid,
    name: String,
    contact_info: Option<String>,
    shop_id: Uuid,
}

impl From<BarberRow> for Barber {
    fn from(row: BarberRow) -> Self {
        Barber {
            id: row.id,
            name: row.name,
            contact_info: row.contact_info,
            shop_id: row.shop_id,
        }
    }
}

#[derive(Queryable, Selectable, Insertable)]
#[diesel(table_name = schedules, check_for_backend(Pg))]
struct ScheduleRow {
    id: Uuid,
    barber_id: Uuid,
    shop_id: Uuid,
    day_of_week: String,
    start_time: String,
    end_time: String,
    is_day_off: bool,
}

impl TryFrom<ScheduleRow> for WeeklySchedule {
    type Error = StoreError;

    fn try_from(row: ScheduleRow) -> Result<Self, Self::Error> {
        Ok(WeeklySchedule {
            id: row.id,
            barber_id: row.barber_id,
            shop_id: row.shop_id,
            day_of_week: read_day(&row.day_of_week)?,
            start_time: read_clock(&row.start_time)?,
            end_time: read_clock(&row.end_time)?,
            is_day_off: row.is_day_off,
        })
    }
}

#[derive(Queryable, Selectable, Insertable)]
#[diesel(table_name = appointments, check_for_backend(Pg))]
struct AppointmentRow {
    id: Uuid,
    shop_id: Uuid,
    shop_name: String,
    barber_id: Uuid,
    barber_name: String,
    customer_name: String,
    customer_phone: String,
    customer_gender: Option<String>,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    status: String,
    is_walk_in: bool,
    bill_amount: f64,
    tax_rate_snapshot: f64,
    total_amount: f64,
    services_snapshot: String,
}

impl AppointmentRow {
    fn from_appointment(appointment: &Appointment) -> Result<Self, StoreError> {
        let services_snapshot = serde_json::to_string(&appointment.services_snapshot)
            .map_err(|err| StoreError::Corrupt(err.to_string()))?;
        Ok(Self {
            id: appointment.id,
            shop_id: appointment.shop_id,
            shop_name: appointment.shop_name.clone(),
            barber_id: appointment.barber_id,
            barber_name: appointment.barber_name.clone(),
            customer_name: appointment.customer_name.clone(),
            customer_phone: appointment.customer_phone.clone(),
            customer_gender: appointment.customer_gender.clone(),
            start_time: appointment.start_time,
            end_time: appointment.end_time,
            status: appointment.status.as_str().to_owned(),
            is_walk_in: appointment.is_walk_in,
            bill_amount: appointment.bill_amount,
            tax_rate_snapshot: appointment.tax_rate_snapshot,
            total_amount: appointment.total_amount,
            services_snapshot,
        })
    }
}

impl TryFrom<AppointmentRow> for Appointment {
    type Error = StoreError;

    fn try_from(row: AppointmentRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<AppointmentStatus>()
            .map_err(|_| corrupt("appointment status", &row.status))?;
        let services_snapshot: Vec<ServiceSnapshot> =
            serde_json::from_str(&row.services_snapshot)
                .map_err(|_| corrupt("service snapshot", &row.services_snapshot))?;
        Ok(Appointment {
            id: row.id,
            shop_id: row.shop_id,
            shop_name: row.shop_name,
            barber_id: row.barber_id,
            barber_name: row.barber_name,
            customer_name: row.customer_name,
            customer_phone: row.customer_phone,
            customer_gender: row.customer_gender,
            start_time: row.start_time,
            end_time: row.end_time,
            status,
            is_walk_in: row.is_walk_in,
            bill_amount: row.bill_amount,
            tax_rate_snapshot: row.tax_rate_snapshot,
            total_amount: row.total_amount,
            services_snapshot,
        })
    }
}

fn convert_all<R, T>(rows: Vec<R>) -> Result<Vec<T>, StoreError>
where
    T: TryFrom<R, Error = StoreError>,
{
    rows.into_iter().map(T::try_from).collect()
}

fn statuses_as_text(statuses: &[AppointmentStatus]) -> Vec<String> {
    statuses
        .iter()
        .map(|status| status.as_str().to_owned())
        .collect()
}

/// PostgreSQL backend. All requests share one connection.
#[derive(Clone)]
pub struct DatabaseInterface {
    connection: Arc<Mutex<PgConnection>>,
}

impl DatabaseInterface {
    pub fn new(database_url: &str) -> Result<Self, ConnectionError> {
        let connection = Self::establish_connection(database_url)?;
        info!("Connected to database");
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    fn establish_connection(database_url: &str) -> Result<PgConnection, ConnectionError> {
        PgConnection::establish(database_url)
    }

    fn connection(&self) -> Result<MutexGuard<'_, PgConnection>, StoreError> {
        self.connection
            .lock()
            .map_err(|_| StoreError::Unavailable("database connection lock poisoned".into()))
    }
}

impl ScheduleBackend for DatabaseInterface {
    fn shops(&self) -> Result<Vec<Shop>, StoreError> {
        let mut connection = self.connection()?;
        let rows = shops::table
            .order((shops::name.asc(), shops::id.asc()))
            .select(ShopRow::as_select())
            .load(&mut *connection)?;
        Ok(rows.into_iter().map(Shop::from).collect())
    }

    fn shop(&self, id: Uuid) -> Result<Shop, StoreError> {
        let mut connection = self.connection()?;
        shops::table
            .find(id)
            .select(ShopRow::as_select())
            .first(&mut *connection)
            .optional()?
            .map(Shop::from)
            .ok_or_else(|| StoreError::NotFound(format!("Shop {id}")))
    }

    fn add_shop(&self, shop: NewShop) -> Result<Shop, StoreError> {
        let mut connection = self.connection()?;
        let row = ShopRow {
            id: Uuid::new_v4(),
            name: shop.name,
            address: shop.address,
            phone_number: shop.phone_number,
            tax_rate: shop.tax_rate,
        };
        let timings: Vec<TimingRow> = shop
            .timings
            .into_iter()
            .map(|timing| TimingRow {
                id: Uuid::new_v4(),
                shop_id: row.id,
                day_of_week: timing.day_of_week.as_str().to_owned(),
                open_time: format_clock(timing.open_time),
                close_time: format_clock(timing.close_time),
                is_closed: timing.is_closed,
            })
            .collect();

        connection.transaction::<_, StoreError, _>(|connection| {
            diesel::insert_into(shops::table)
                .values(&row)
                .execute(connection)?;
            if !timings.is_empty() {
                diesel::insert_into(shop_timings::table)
                    .values(&timings)
                    .execute(connection)?;
            }
            Ok(())
        })?;
        Ok(row.into())
    }

    fn shop_timings(
        &self,
        shop_id: Uuid,
        day: Option<DayOfWeek>,
    ) -> Result<Vec<WeeklyTiming>, StoreError> {
        let mut connection = self.connection()?;
        let mut query = shop_timings::table
            .filter(shop_timings::shop_id.eq(shop_id))
            .into_boxed();
        if let Some(day) = day {
            query = query.filter(shop_timings::day_of_week.eq(day.as_str()));
        }
        let rows = query
            .select(TimingRow::as_select())
            .load(&mut *connection)?;

        let mut timings: Vec<WeeklyTiming> = convert_all(rows)?;
        timings.sort_by_key(|timing| timing.day_of_week);
        Ok(timings)
    }

    fn services(&self) -> Result<Vec<Service>, StoreError> {
        let mut connection = self.connection()?;
        let rows = services::table
            .order((services::name.asc(), services::id.asc()))
            .select(ServiceRow::as_select())
            .load(&mut *connection)?;
        convert_all(rows)
    }

    #[cfg(test)]
    fn add_service(&self, name: String, duration: u32, price: f64) -> Result<Service, StoreError> {
        let mut connection = self.connection()?;
        let row = ServiceRow {
            id: Uuid::new_v4(),
            name,
            duration: i32::try_from(duration)
                .map_err(|_| StoreError::Corrupt(format!("service duration {duration}")))?,
            price,
        };
        diesel::insert_into(services::table)
            .values(&row)
            .execute(&mut *connection)?;
        row.try_into()
    }

    fn barber(&self, id: Uuid) -> Result<Barber, StoreError> {
        let mut connection = self.connection()?;
        barbers::table
            .find(id)
            .select(BarberRow::as_select())
            .first(&mut *connection)
            .optional()?
            .map(Barber::from)
            .ok_or_else(|| StoreError::NotFound(format!("Barber {id}")))
    }

    fn barbers(&self, filter: &BarberFilter) -> Result<Vec<Barber>, StoreError> {
        let mut connection = self.connection()?;
        let mut query = barbers::table.into_boxed();
        if let Some(shop_id) = filter.shop_id {
            query = query.filter(barbers::shop_id.eq(shop_id));
        }
        if let Some(ids) = &filter.ids {
            query = query.filter(barbers::id.eq_any(ids.clone()));
        }
        if let Some(limit) = filter.limit {
            query = query.limit(sql_count(limit));
        }
        let rows = query
            .order((barbers::name.asc(), barbers::id.asc()))
            .select(BarberRow::as_select())
            .load(&mut *connection)?;
        Ok(rows.into_iter().map(Barber::from).collect())
    }

    fn add_barber(&self, barber: NewBarber) -> Result<Barber, StoreError> {
        let mut connection = self.connection()?;
        let row = BarberRow {
            id: Uuid::new_v4(),
            name: barber.name,
            contact_info: barber.contact_info,
            shop_id: barber.shop_id,
        };
        diesel::insert_into(barbers::table)
            .values(&row)
            .execute(&mut *connection)?;
        Ok(row.into())
    }

    fn schedules(&self, filter: &ScheduleFilter) -> Result<Vec<WeeklySchedule>, StoreError> {
        let mut connection = self.connection()?;
        let mut query = schedules::table.into_boxed();
        if let Some(barber_id) = filter.barber_id {
            query = query.filter(schedules::barber_id.eq(barber_id));
        }
        if let Some(shop_id) = filter.shop_id {
            query = query.filter(schedules::shop_id.eq(shop_id));
        }
        if let Some(day) = filter.day {
            query = query.filter(schedules::day_of_week.eq(day.as_str()));
        }
        if filter.working_only {
            query = query.filter(schedules::is_day_off.eq(false));
        }
        let rows = query
            .select(ScheduleRow::as_select())
            .load(&mut *connection)?;

        // Day names don't sort chronologically in SQL, so order and cap here.
        let mut schedules: Vec<WeeklySchedule> = convert_all(rows)?;
        schedules.sort_by_key(|schedule| (schedule.day_of_week, schedule.barber_id));
        if let Some(limit) = filter.limit {
            schedules.truncate(limit);
        }
        Ok(schedules)
    }

    fn replace_schedule(
        &self,
        barber_id: Uuid,
        shop_id: Uuid,
        entries: Vec<ScheduleEntry>,
    ) -> Result<Vec<WeeklySchedule>, StoreError> {
        let mut connection = self.connection()?;
        let rows: Vec<ScheduleRow> = entries
            .into_iter()
            .map(|entry| ScheduleRow {
                id: Uuid::new_v4(),
                barber_id,
                shop_id,
                day_of_week: entry.day_of_week.as_str().to_owned(),
                start_time: format_clock(entry.start_time),
                end_time: format_clock(entry.end_time),
                is_day_off: entry.is_day_off,
            })
            .collect();

        connection.transaction::<_, StoreError, _>(|connection| {
            let known = barbers::table
                .find(barber_id)
                .select(barbers::id)
                .first::<Uuid>(connection)
                .optional()?;
            if known.is_none() {
                return Err(StoreError::NotFound(format!("Barber {barber_id}")));
            }
            diesel::delete(schedules::table.filter(schedules::barber_id.eq(barber_id)))
                .execute(connection)?;
            if !rows.is_empty() {
                diesel::insert_into(schedules::table)
                    .values(&rows)
                    .execute(connection)?;
            }
            Ok(())
        })?;

        let mut replaced: Vec<WeeklySchedule> = convert_all(rows)?;
        replaced.sort_by_key(|schedule| schedule.day_of_week);
        Ok(replaced)
    }

    fn appointment(&self, id: Uuid) -> Result<Appointment, StoreError> {
        let mut connection = self.connection()?;
        appointments::table
            .find(id)
            .select(AppointmentRow::as_select())
            .first(&mut *connection)
            .optional()?
            .ok_or_else(|| StoreError::NotFound(format!("Appointment {id}")))?
            .try_into()
    }

    fn appointments(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, StoreError> {
        let mut connection = self.connection()?;
        let mut query = appointments::table.into_boxed();
        if let Some(shop_id) = filter.shop_id {
            query = query.filter(appointments::shop_id.eq(shop_id));
        }
        if let Some(barber_ids) = &filter.barber_ids {
            query = query.filter(appointments::barber_id.eq_any(barber_ids.clone()));
        }
        if let Some(statuses) = &filter.statuses {
            query = query.filter(appointments::status.eq_any(statuses_as_text(statuses)));
        }
        if !filter.excluded_statuses.is_empty() {
            query = query.filter(
                appointments::status.ne_all(statuses_as_text(&filter.excluded_statuses)),
            );
        }
        if let Some(from) = filter.start_from {
            query = query.filter(appointments::start_time.ge(from));
        }
        if let Some(before) = filter.start_before {
            query = query.filter(appointments::start_time.lt(before));
        }
        if let Some(after) = filter.end_after {
            query = query.filter(appointments::end_time.gt(after));
        }
        if let Some(offset) = filter.offset {
            query = query.offset(sql_count(offset));
        }
        if let Some(limit) = filter.limit {
            query = query.limit(sql_count(limit));
        }

        let rows = query
            .order((appointments::start_time.asc(), appointments::id.asc()))
            .select(AppointmentRow::as_select())
            .load(&mut *connection)?;
        convert_all(rows)
    }

    fn create_appointment(&self, appointment: NewAppointment) -> Result<Appointment, StoreError> {
        let created = appointment.with_id(Uuid::new_v4());
        let row = AppointmentRow::from_appointment(&created)?;
        let mut connection = self.connection()?;
        diesel::insert_into(appointments::table)
            .values(&row)
            .execute(&mut *connection)?;
        Ok(created)
    }

    fn update_appointment_status(
        &self,
        id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Appointment, StoreError> {
        let mut connection = self.connection()?;
        diesel::update(appointments::table.find(id))
            .set(appointments::status.eq(status.as_str()))
            .returning(AppointmentRow::as_returning())
            .get_result(&mut *connection)
            .optional()?
            .ok_or_else(|| StoreError::NotFound(format!("Appointment {id}")))?
            .try_into()
    }
}
