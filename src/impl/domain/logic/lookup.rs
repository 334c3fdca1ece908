use chrono::NaiveDate;
use fractic_server_error::ServerError;

use crate::{
    domain::repositories::store_repository::StoreRepository,
    entities::{BusinessDay, BusinessDayId, DayStatus, Location, LocationId},
    errors::{EntityNotFound, InvalidDayStatus},
};

pub(crate) fn location_by_slug<R: StoreRepository + ?Sized>(
    repo: &R,
    slug: &str,
) -> Result<Location, ServerError> {
    repo.location_by_slug(slug)?
        .ok_or_else(|| EntityNotFound::new("Location", slug))
}

pub(crate) fn location_by_id<R: StoreRepository + ?Sized>(
    repo: &R,
    id: LocationId,
) -> Result<Location, ServerError> {
    repo.location_by_id(id)?
        .ok_or_else(|| EntityNotFound::new("Location", &id.to_string()))
}

/// The location's day on `date`; a missing record is reported as a day that
/// has not been started.
pub(crate) fn day_of<R: StoreRepository + ?Sized>(
    repo: &R,
    location: &Location,
    date: NaiveDate,
    expected: DayStatus,
) -> Result<BusinessDay, ServerError> {
    repo.business_day(location.id, date)?.ok_or_else(|| {
        InvalidDayStatus::new(
            &location.name,
            &date,
            DayStatus::NotStarted.as_str(),
            expected.as_str(),
        )
    })
}

pub(crate) fn day_by_id<R: StoreRepository + ?Sized>(
    repo: &R,
    id: BusinessDayId,
) -> Result<BusinessDay, ServerError> {
    repo.business_day_by_id(id)?
        .ok_or_else(|| EntityNotFound::new("BusinessDay", &id.to_string()))
}
