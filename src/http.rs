use crate::any_barber::any_barber_slots;
use crate::availability::{barber_slots, SlotRequest};
use crate::backend::{BarberFilter, ScheduleBackend, StoreError};
use crate::booking::{self, AppointmentRequest, BookingError, BookingGate};
use crate::clock::{Clock, SystemClock};
use crate::configuration::Configuration;
use crate::feasibility::{available_dates, BarberChoice};
use crate::financials::{financials_report, FinancialsReport, PeriodError, ReportPeriod};
use crate::management::{self, ManagementError, ScheduleUpdate, ShopRequest, StaffRequest};
use crate::time_window::{parse_date, ShopTimezone, TimeFormatError};
use crate::types::{Appointment, AppointmentStatus, Barber, Service, Shop, WeeklySchedule};
use crate::walk_in::find_walk_in_barbers;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use axum_valid::Valid;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState<B> {
    pub backend: B,
    pub timezone: ShopTimezone,
    pub clock: Arc<dyn Clock>,
    pub booking_gate: BookingGate,
}

impl<B: ScheduleBackend> AppState<B> {
    pub fn new(backend: B, timezone: ShopTimezone) -> Self {
        Self {
            backend,
            timezone,
            clock: Arc::new(SystemClock),
            booking_gate: BookingGate::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(detail) => {
                error!(%detail, "Request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let detail = match self {
            ApiError::Internal(_) => "An internal server error occurred".to_owned(),
            other => other.to_string(),
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => ApiError::NotFound(format!("{what} not found")),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<BookingError> for ApiError {
    fn from(err: BookingError) -> Self {
        match err {
            BookingError::Conflict | BookingError::InvalidTransition { .. } => {
                ApiError::Conflict(err.to_string())
            }
            BookingError::NotFound(_) => ApiError::NotFound(err.to_string()),
            BookingError::InvalidRequest(_) => ApiError::BadRequest(err.to_string()),
            BookingError::LockPoisoned | BookingError::Store(_) => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}

impl From<ManagementError> for ApiError {
    fn from(err: ManagementError) -> Self {
        match err {
            ManagementError::Invalid(detail) => ApiError::BadRequest(detail),
            ManagementError::NotFound(_) => ApiError::NotFound(err.to_string()),
            ManagementError::Store(err) => err.into(),
        }
    }
}

impl From<PeriodError> for ApiError {
    fn from(err: PeriodError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<TimeFormatError> for ApiError {
    fn from(err: TimeFormatError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

/// Runs a blocking store call on the blocking pool.
async fn blocking<B, T, E, F>(backend: &B, job: F) -> Result<T, ApiError>
where
    B: ScheduleBackend,
    T: Send + 'static,
    E: Into<ApiError> + Send + 'static,
    F: FnOnce(B) -> Result<T, E> + Send + 'static,
{
    let backend = backend.clone();
    tokio::task::spawn_blocking(move || job(backend))
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?
        .map_err(Into::into)
}

#[derive(Debug, Deserialize)]
struct DatesQuery {
    shop_id: Uuid,
    barber_id: BarberChoice,
}

#[derive(Debug, Deserialize)]
struct SlotsQuery {
    shop_id: Uuid,
    barber_id: BarberChoice,
    date_str: String,
    total_duration: u32,
}

#[derive(Debug, Deserialize)]
struct ShopDayQuery {
    shop_id: Uuid,
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WalkInQuery {
    shop_id: Uuid,
    duration: u32,
}

#[derive(Debug, Deserialize)]
struct ShopQuery {
    shop_id: Uuid,
}

#[derive(Debug, Deserialize)]
struct OptionalShopQuery {
    shop_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
struct FinancialsQuery {
    shop_id: Option<Uuid>,
    date: Option<String>,
    month: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusUpdate {
    status: AppointmentStatus,
}

pub fn router<B: ScheduleBackend>(state: AppState<B>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let public = Router::new()
        .route("/health", get(health))
        .route("/api/services", get(list_services::<B>))
        .route("/api/shops", get(list_shops::<B>))
        .route("/api/shops/{shop_id}/barbers", get(shop_barbers::<B>))
        .route("/api/availability/dates", get(get_available_dates::<B>))
        .route("/api/availability/slots", get(get_available_slots::<B>))
        .route("/api/appointments", post(create_appointment::<B>));

    let manager = Router::new()
        .route("/api/manager/appointments", get(manager_appointments::<B>))
        .route(
            "/api/manager/appointments/{appointment_id}/status",
            patch(update_appointment_status::<B>),
        )
        .route(
            "/api/manager/available-barbers",
            get(walk_in_barbers::<B>),
        )
        .route("/api/manager/staff", post(add_staff::<B>))
        .route(
            "/api/manager/staff/{barber_id}/schedule",
            get(get_schedule::<B>).post(replace_schedule::<B>),
        )
        .route("/api/manager/financials", get(manager_financials::<B>));

    let owner = Router::new()
        .route("/api/owner/shops", get(list_shops::<B>).post(add_shop::<B>))
        .route("/api/owner/staff", get(owner_staff::<B>))
        .route("/api/owner/financials", get(owner_financials::<B>));

    Router::new()
        .merge(public)
        .merge(manager)
        .merge(owner)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

pub fn create_app<B: ScheduleBackend, C: Configuration>(backend: B, configuration: &C) -> Router {
    router(AppState::new(backend, configuration.timezone()))
}

pub async fn start_server<B: ScheduleBackend, C: Configuration>(
    backend: B,
    configuration: C,
) -> std::io::Result<()> {
    let app = create_app(backend, &configuration);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", configuration.port())).await?;
    info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn list_services<B: ScheduleBackend>(
    State(state): State<AppState<B>>,
) -> Result<Json<Vec<Service>>, ApiError> {
    blocking(&state.backend, |backend| backend.services())
        .await
        .map(Json)
}

async fn list_shops<B: ScheduleBackend>(
    State(state): State<AppState<B>>,
) -> Result<Json<Vec<Shop>>, ApiError> {
    blocking(&state.backend, |backend| backend.shops())
        .await
        .map(Json)
}

async fn shop_barbers<B: ScheduleBackend>(
    State(state): State<AppState<B>>,
    Path(shop_id): Path<Uuid>,
) -> Result<Json<Vec<Barber>>, ApiError> {
    blocking(&state.backend, move |backend| {
        backend.barbers(&BarberFilter::for_shop(shop_id))
    })
    .await
    .map(Json)
}

async fn get_available_dates<B: ScheduleBackend>(
    State(state): State<AppState<B>>,
    Query(query): Query<DatesQuery>,
) -> Json<Vec<String>> {
    let today = state.timezone.today(state.clock.now());
    let dates = available_dates(&state.backend, query.shop_id, query.barber_id, today)
        .await
        .into_degraded("available dates");
    Json(dates)
}

async fn get_available_slots<B: ScheduleBackend>(
    State(state): State<AppState<B>>,
    Query(query): Query<SlotsQuery>,
) -> Result<Json<Vec<String>>, ApiError> {
    parse_date(&query.date_str)?;
    if query.total_duration == 0 {
        return Err(ApiError::BadRequest(
            "total_duration must be a positive number of minutes".into(),
        ));
    }

    let slots = match query.barber_id {
        BarberChoice::Any => {
            any_barber_slots(
                &state.backend,
                state.timezone,
                query.shop_id,
                &query.date_str,
                query.total_duration,
            )
            .await
        }
        BarberChoice::Specific(barber_id) => {
            let backend = state.backend.clone();
            let timezone = state.timezone;
            let calculated = tokio::task::spawn_blocking(move || {
                let request = SlotRequest {
                    barber_id,
                    shop_id: query.shop_id,
                    date: &query.date_str,
                    duration_minutes: query.total_duration,
                };
                barber_slots(&backend, &timezone, &request)
            })
            .await;
            calculated.map_err(|err| ApiError::Internal(err.to_string()))?
        }
    };
    Ok(Json(slots.into_degraded("available slots")))
}

async fn create_appointment<B: ScheduleBackend>(
    State(state): State<AppState<B>>,
    Valid(Json(request)): Valid<Json<AppointmentRequest>>,
) -> Result<(StatusCode, Json<Appointment>), ApiError> {
    let gate = state.booking_gate.clone();
    let now = state.clock.now();
    let created = blocking(&state.backend, move |backend| {
        booking::create_appointment(&backend, &gate, request, now)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn manager_appointments<B: ScheduleBackend>(
    State(state): State<AppState<B>>,
    Query(query): Query<ShopDayQuery>,
) -> Result<Json<Vec<Appointment>>, ApiError> {
    let date = match query.date {
        Some(date) => parse_date(&date)?,
        None => state.timezone.today(state.clock.now()),
    };
    let timezone = state.timezone;
    blocking(&state.backend, move |backend| {
        management::day_appointments(&backend, &timezone, query.shop_id, date)
    })
    .await
    .map(Json)
}

async fn update_appointment_status<B: ScheduleBackend>(
    State(state): State<AppState<B>>,
    Path(appointment_id): Path<Uuid>,
    Json(update): Json<StatusUpdate>,
) -> Result<Json<Appointment>, ApiError> {
    blocking(&state.backend, move |backend| {
        booking::update_appointment_status(&backend, appointment_id, update.status)
    })
    .await
    .map(Json)
}

async fn walk_in_barbers<B: ScheduleBackend>(
    State(state): State<AppState<B>>,
    Query(query): Query<WalkInQuery>,
) -> Result<Json<Vec<Barber>>, ApiError> {
    if query.duration == 0 {
        return Err(ApiError::BadRequest(
            "duration must be a positive number of minutes".into(),
        ));
    }
    let now = state.clock.now();
    let timezone = state.timezone;
    let barbers = blocking(&state.backend, move |backend| {
        Ok::<_, ApiError>(
            find_walk_in_barbers(&backend, &timezone, query.shop_id, query.duration, now)
                .into_degraded("walk-in barbers"),
        )
    })
    .await?;
    Ok(Json(barbers))
}

async fn add_staff<B: ScheduleBackend>(
    State(state): State<AppState<B>>,
    Query(query): Query<ShopQuery>,
    Valid(Json(request)): Valid<Json<StaffRequest>>,
) -> Result<(StatusCode, Json<Barber>), ApiError> {
    let barber = blocking(&state.backend, move |backend| {
        management::add_staff(&backend, query.shop_id, request)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(barber)))
}

async fn get_schedule<B: ScheduleBackend>(
    State(state): State<AppState<B>>,
    Path(barber_id): Path<Uuid>,
) -> Result<Json<Vec<WeeklySchedule>>, ApiError> {
    blocking(&state.backend, move |backend| {
        management::barber_schedule(&backend, barber_id)
    })
    .await
    .map(Json)
}

async fn replace_schedule<B: ScheduleBackend>(
    State(state): State<AppState<B>>,
    Path(barber_id): Path<Uuid>,
    Valid(Json(update)): Valid<Json<ScheduleUpdate>>,
) -> Result<Json<Vec<WeeklySchedule>>, ApiError> {
    blocking(&state.backend, move |backend| {
        management::replace_barber_schedule(&backend, barber_id, update)
    })
    .await
    .map(Json)
}

async fn add_shop<B: ScheduleBackend>(
    State(state): State<AppState<B>>,
    Valid(Json(request)): Valid<Json<ShopRequest>>,
) -> Result<(StatusCode, Json<Shop>), ApiError> {
    let shop = blocking(&state.backend, move |backend| {
        management::add_shop(&backend, request)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(shop)))
}

async fn owner_staff<B: ScheduleBackend>(
    State(state): State<AppState<B>>,
    Query(query): Query<OptionalShopQuery>,
) -> Result<Json<Vec<Barber>>, ApiError> {
    blocking(&state.backend, move |backend| {
        management::staff(&backend, query.shop_id)
    })
    .await
    .map(Json)
}

async fn report<B: ScheduleBackend>(
    state: AppState<B>,
    query: FinancialsQuery,
) -> Result<Json<FinancialsReport>, ApiError> {
    let today = state.timezone.today(state.clock.now());
    let period = ReportPeriod::parse(query.date.as_deref(), query.month.as_deref(), today)?;
    let timezone = state.timezone;
    blocking(&state.backend, move |backend| {
        financials_report(&backend, &timezone, period, query.shop_id)
    })
    .await
    .map(Json)
}

async fn manager_financials<B: ScheduleBackend>(
    State(state): State<AppState<B>>,
    Query(query): Query<FinancialsQuery>,
) -> Result<Json<FinancialsReport>, ApiError> {
    if query.shop_id.is_none() {
        return Err(ApiError::BadRequest("shop_id is required".into()));
    }
    report(state, query).await
}

async fn owner_financials<B: ScheduleBackend>(
    State(state): State<AppState<B>>,
    Query(query): Query<FinancialsQuery>,
) -> Result<Json<FinancialsReport>, ApiError> {
    report(state, query).await
}
