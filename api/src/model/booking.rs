use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use derive_new::new;
use garde::Validate;
use kernel::model::{
    booking::{BookingWithSlot, SlotOccurrenceBooker},
    id::{BookingId, SlotId, UserId},
};
use serde::{Deserialize, Serialize};

use crate::model::slot::FacilityName;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    #[garde(skip)]
    pub slot_id: SlotId,
    #[garde(skip)]
    pub date: NaiveDate,
}

#[derive(Debug, Serialize, new)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingResponse {
    pub booking_id: BookingId,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MyBookingsQuery {
    #[garde(skip)]
    pub date: NaiveDate,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingWithSlotResponse {
    pub booking_id: BookingId,
    pub slot_id: SlotId,
    pub date: NaiveDate,
    pub booked_at: DateTime<Utc>,
    pub facility: FacilityName,
    pub title: String,
    pub starts_at: NaiveTime,
    pub ends_at: NaiveTime,
}

impl From<BookingWithSlot> for BookingWithSlotResponse {
    fn from(value: BookingWithSlot) -> Self {
        let BookingWithSlot {
            booking_id,
            slot_id,
            booked_for,
            created_at,
            facility,
            title,
            starts_at,
            ends_at,
        } = value;
        Self {
            booking_id,
            slot_id,
            date: booked_for,
            booked_at: created_at,
            facility: facility.into(),
            title,
            starts_at,
            ends_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MyBookingsResponse {
    pub date: NaiveDate,
    pub items: Vec<BookingWithSlotResponse>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AdminBookingsQuery {
    #[garde(skip)]
    pub slot_id: SlotId,
    #[garde(skip)]
    pub date: NaiveDate,
}

/// 管理者向け予約者一覧の 1 行。表示・帳票出力用
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotOccurrenceBookerResponse {
    pub user_id: UserId,
    pub surname: String,
    pub name: String,
    pub group: String,
    pub booked_at: DateTime<Utc>,
}

impl From<SlotOccurrenceBooker> for SlotOccurrenceBookerResponse {
    fn from(value: SlotOccurrenceBooker) -> Self {
        let SlotOccurrenceBooker {
            user_id,
            surname,
            name,
            group,
            booked_at,
        } = value;
        Self {
            user_id,
            surname,
            name,
            group,
            booked_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotOccurrenceBookersResponse {
    pub date: NaiveDate,
    pub items: Vec<SlotOccurrenceBookerResponse>,
}
