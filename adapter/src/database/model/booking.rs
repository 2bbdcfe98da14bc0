use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use kernel::model::{
    booking::{BookingWithSlot, SlotOccurrenceBooker},
    id::{BookingId, SlotId, UserId},
    slot::Facility,
};
use shared::error::AppError;
use std::str::FromStr;

#[derive(sqlx::FromRow)]
pub struct BookingWithSlotRow {
    pub booking_id: BookingId,
    pub slot_id: SlotId,
    pub booked_for: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub facility: String,
    pub title: String,
    pub starts_at: NaiveTime,
    pub ends_at: NaiveTime,
}

impl TryFrom<BookingWithSlotRow> for BookingWithSlot {
    type Error = AppError;

    fn try_from(value: BookingWithSlotRow) -> Result<Self, Self::Error> {
        let BookingWithSlotRow {
            booking_id,
            slot_id,
            booked_for,
            created_at,
            facility,
            title,
            starts_at,
            ends_at,
        } = value;
        let facility = Facility::from_str(&facility)
            .map_err(|e| AppError::ConversionEntityError(e.to_string()))?;
        Ok(BookingWithSlot {
            booking_id,
            slot_id,
            booked_for,
            created_at,
            facility,
            title,
            starts_at,
            ends_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub struct BookerRow {
    pub user_id: UserId,
    pub surname: String,
    pub name: String,
    pub group_name: String,
    pub created_at: DateTime<Utc>,
}

impl From<BookerRow> for SlotOccurrenceBooker {
    fn from(value: BookerRow) -> Self {
        let BookerRow {
            user_id,
            surname,
            name,
            group_name,
            created_at,
        } = value;
        SlotOccurrenceBooker {
            user_id,
            surname,
            name,
            group: group_name,
            booked_at: created_at,
        }
    }
}
