use crate::availability::{barber_slots, SlotRequest};
use crate::backend::{BarberFilter, ScheduleBackend};
use crate::lookup::{EmptyReason, Lookup};
use crate::time_window::ShopTimezone;
use futures::future::join_all;
use std::collections::BTreeSet;
use tracing::{error, info};
use uuid::Uuid;

/// Set union of every barber's slots. Zero-padded "HH:MM" sorts chronologically.
pub fn union_slots<I>(per_barber: I) -> Vec<String>
where
    I: IntoIterator<Item = Vec<String>>,
{
    per_barber
        .into_iter()
        .flatten()
        .collect::<BTreeSet<String>>()
        .into_iter()
        .collect()
}

/// Slots at which at least one barber of the shop can take the booking.
/// Each barber is calculated on its own blocking task; the results are
/// joined before they are merged.
pub async fn any_barber_slots<B: ScheduleBackend>(
    backend: &B,
    timezone: ShopTimezone,
    shop_id: Uuid,
    date: &str,
    duration_minutes: u32,
) -> Lookup<Vec<String>> {
    let barbers = {
        let backend = backend.clone();
        let fetched =
            tokio::task::spawn_blocking(move || backend.barbers(&BarberFilter::for_shop(shop_id)))
                .await;
        match fetched {
            Ok(Ok(barbers)) => barbers,
            Ok(Err(err)) => return Lookup::Failed(err),
            Err(err) => {
                error!(?err, "Barber lookup task failed");
                return Lookup::Failed(crate::backend::StoreError::Unavailable(err.to_string()));
            }
        }
    };
    if barbers.is_empty() {
        return Lookup::Empty(EmptyReason::NoBarbers);
    }

    let tasks = barbers.iter().map(|barber| {
        let backend = backend.clone();
        let date = date.to_owned();
        let barber_id = barber.id;
        tokio::task::spawn_blocking(move || {
            let request = SlotRequest {
                barber_id,
                shop_id,
                date: &date,
                duration_minutes,
            };
            barber_slots(&backend, &timezone, &request)
                .into_degraded(&format!("slots for barber {barber_id}"))
        })
    });

    let per_barber = join_all(tasks)
        .await
        .into_iter()
        .filter_map(|result| match result {
            Ok(slots) => Some(slots),
            Err(err) => {
                error!(?err, "Barber availability task failed");
                None
            }
        });
    let slots = union_slots(per_barber);

    info!(
        %shop_id,
        date,
        barbers = barbers.len(),
        slots = slots.len(),
        "Unified availability across barbers"
    );

    if slots.is_empty() {
        Lookup::Empty(EmptyReason::FullyBooked)
    } else {
        Lookup::Found(slots)
    }
}
