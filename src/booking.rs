use crate::backend::{AppointmentFilter, ScheduleBackend, StoreError};
use crate::time_window::instant_format;
use crate::types::{Appointment, AppointmentStatus, NewAppointment, ServiceSnapshot};
use chrono::{DateTime, Duration, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

lazy_static! {
    pub(crate) static ref PHONE_NUMBER: Regex = Regex::new(r"^\+?[0-9][0-9 \-]{5,19}$").unwrap();
}

#[derive(Debug, Error)]
pub enum BookingError {
    #[error("This time slot was just taken. Please pick another one")]
    Conflict,
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    InvalidRequest(String),
    #[error("Appointment can't move from {from} to {to}")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },
    #[error("Booking lock poisoned")]
    LockPoisoned,
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for BookingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => BookingError::NotFound(what),
            other => BookingError::Store(other),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AppointmentRequest {
    #[validate(length(min = 1, max = 100))]
    pub customer_name: String,
    #[validate(regex(path = *PHONE_NUMBER))]
    pub customer_phone: String,
    #[validate(length(max = 30))]
    pub customer_gender: Option<String>,
    pub shop_id: Uuid,
    pub barber_id: Uuid,
    #[serde(with = "instant_format")]
    pub start_time: DateTime<Utc>,
    #[validate(length(min = 1, max = 20))]
    pub service_ids: Vec<Uuid>,
    #[serde(default)]
    pub is_walk_in: bool,
    pub status: Option<AppointmentStatus>,
}

/// Serialises check-then-create per barber so two bookings handled by this
/// process can't both pass the overlap check for the same barber. Bookings
/// written by other processes are not covered.
#[derive(Debug, Clone, Default)]
pub struct BookingGate {
    lanes: Arc<Mutex<HashMap<Uuid, Arc<Mutex<()>>>>>,
}

impl BookingGate {
    fn lane(&self, barber_id: Uuid) -> Result<Arc<Mutex<()>>, BookingError> {
        let mut lanes = self.lanes.lock().map_err(|_| BookingError::LockPoisoned)?;
        Ok(lanes.entry(barber_id).or_default().clone())
    }
}

/// Rejects `[start, end)` when a non-cancelled appointment of the barber
/// intersects it. Touching intervals don't conflict.
pub fn check_overlap<B: ScheduleBackend>(
    backend: &B,
    barber_id: Uuid,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<(), BookingError> {
    let conflicting = backend.appointments(
        &AppointmentFilter::for_barbers(vec![barber_id])
            .excluding(AppointmentStatus::Cancelled)
            .overlapping(start, end),
    )?;
    if let Some(existing) = conflicting
        .iter()
        .find(|existing| existing.overlaps(start, end))
    {
        warn!(
            %barber_id,
            existing = %existing.id,
            "Rejected booking overlapping an existing appointment"
        );
        return Err(BookingError::Conflict);
    }
    Ok(())
}

pub(crate) fn round_to_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

pub fn create_appointment<B: ScheduleBackend>(
    backend: &B,
    gate: &BookingGate,
    request: AppointmentRequest,
    now: DateTime<Utc>,
) -> Result<Appointment, BookingError> {
    let status = request.status.unwrap_or(AppointmentStatus::Booked);
    if !matches!(
        status,
        AppointmentStatus::Booked | AppointmentStatus::InProgress
    ) {
        return Err(BookingError::InvalidRequest(format!(
            "New appointments can't start as {status}"
        )));
    }

    let shop = backend.shop(request.shop_id)?;
    let barber = backend.barber(request.barber_id)?;
    if barber.shop_id != shop.id {
        return Err(BookingError::InvalidRequest(format!(
            "Barber {} does not work at shop {}",
            barber.id, shop.id
        )));
    }

    let catalogue = backend.services()?;
    let services_snapshot = request
        .service_ids
        .iter()
        .map(|id| {
            catalogue
                .iter()
                .find(|service| service.id == *id)
                .map(ServiceSnapshot::from)
                .ok_or_else(|| BookingError::InvalidRequest(format!("Unknown service {id}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let total_minutes: i64 = services_snapshot
        .iter()
        .map(|service| i64::from(service.duration))
        .sum();
    if total_minutes == 0 {
        return Err(BookingError::InvalidRequest(
            "Selected services have no duration".into(),
        ));
    }
    let start_time = request.start_time;
    let end_time = start_time
        .checked_add_signed(Duration::minutes(total_minutes))
        .ok_or_else(|| BookingError::InvalidRequest("Appointment ends out of range".into()))?;
    if end_time <= now {
        return Err(BookingError::InvalidRequest(
            "Appointment would already be over".into(),
        ));
    }

    let bill_amount = round_to_cents(services_snapshot.iter().map(|s| s.price).sum());
    let total_amount = round_to_cents(bill_amount * (1.0 + shop.tax_rate / 100.0));

    let appointment = NewAppointment {
        shop_id: shop.id,
        shop_name: shop.name,
        barber_id: barber.id,
        barber_name: barber.name,
        customer_name: request.customer_name,
        customer_phone: request.customer_phone,
        customer_gender: request.customer_gender,
        start_time,
        end_time,
        status,
        is_walk_in: request.is_walk_in,
        bill_amount,
        tax_rate_snapshot: shop.tax_rate,
        total_amount,
        services_snapshot,
    };

    let lane = gate.lane(barber.id)?;
    let _guard = lane.lock().map_err(|_| BookingError::LockPoisoned)?;
    check_overlap(backend, barber.id, start_time, end_time)?;
    let created = backend.create_appointment(appointment)?;

    info!(
        appointment_id = %created.id,
        barber_id = %created.barber_id,
        start = %created.start_time,
        end = %created.end_time,
        "Appointment created"
    );
    Ok(created)
}

pub fn update_appointment_status<B: ScheduleBackend>(
    backend: &B,
    appointment_id: Uuid,
    status: AppointmentStatus,
) -> Result<Appointment, BookingError> {
    let current = backend.appointment(appointment_id)?;
    if !current.status.can_transition_to(status) {
        return Err(BookingError::InvalidTransition {
            from: current.status,
            to: status,
        });
    }
    let updated = backend.update_appointment_status(appointment_id, status)?;
    info!(%appointment_id, from = %current.status, to = %status, "Appointment status changed");
    Ok(updated)
}
