use crate::backend::StoreError;
use std::fmt;
use tracing::{debug, error};

/// Why an availability read produced nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyReason {
    MalformedDate,
    InvalidDuration,
    NoSchedule,
    DayOff,
    ShopClosed,
    NoWorkingWindow,
    NoBarbers,
    NoBarbersOnShift,
    FullyBooked,
}

impl fmt::Display for EmptyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            EmptyReason::MalformedDate => "date could not be parsed",
            EmptyReason::InvalidDuration => "requested duration is not positive",
            EmptyReason::NoSchedule => "no schedule or shop timing for that day",
            EmptyReason::DayOff => "barber has the day off",
            EmptyReason::ShopClosed => "shop is closed",
            EmptyReason::NoWorkingWindow => "barber hours and shop hours do not overlap",
            EmptyReason::NoBarbers => "shop has no barbers",
            EmptyReason::NoBarbersOnShift => "no barber is on shift for the whole request",
            EmptyReason::FullyBooked => "no free block is long enough",
        };
        f.write_str(text)
    }
}

/// Outcome of an availability read. Callers usually collapse it with
/// [`Lookup::into_degraded`], which keeps the distinction only in the logs.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    Found(T),
    Empty(EmptyReason),
    Failed(StoreError),
}

impl<T> From<Result<Lookup<T>, StoreError>> for Lookup<T> {
    fn from(result: Result<Lookup<T>, StoreError>) -> Self {
        result.unwrap_or_else(Lookup::Failed)
    }
}

impl<T: Default> Lookup<T> {
    pub fn into_degraded(self, context: &str) -> T {
        match self {
            Lookup::Found(value) => value,
            Lookup::Empty(reason) => {
                debug!(context, %reason, "Nothing available");
                T::default()
            }
            Lookup::Failed(err) => {
                error!(context, %err, "Availability read failed, reporting nothing available");
                T::default()
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_degraded_collapses_empty_and_failure() {
        assert_eq!(Lookup::Found(vec![1, 2]).into_degraded("found"), vec![1, 2]);
        assert_eq!(
            Lookup::<Vec<u8>>::Empty(EmptyReason::DayOff).into_degraded("empty"),
            Vec::<u8>::new()
        );
        assert_eq!(
            Lookup::<Vec<u8>>::Failed(StoreError::Unavailable("down".into()))
                .into_degraded("failed"),
            Vec::<u8>::new()
        );
    }

    #[test]
    fn test_store_errors_become_failures() {
        let result: Result<Lookup<bool>, StoreError> = Err(StoreError::Unavailable("down".into()));
        assert_eq!(
            Lookup::from(result),
            Lookup::Failed(StoreError::Unavailable("down".into()))
        );
    }
}
