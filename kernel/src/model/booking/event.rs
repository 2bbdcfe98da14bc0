use crate::model::id::{BookingId, SlotId, UserId};
use chrono::NaiveDate;
use derive_new::new;

#[derive(Debug, new)]
pub struct CreateBooking {
    pub booked_by: UserId,
    pub slot_id: SlotId,
    pub booked_for: NaiveDate,
}

#[derive(Debug, new)]
pub struct CancelBooking {
    pub booking_id: BookingId,
    pub requested_by: UserId,
    // 管理者は他人の予約もキャンセルできる
    pub is_admin: bool,
}
