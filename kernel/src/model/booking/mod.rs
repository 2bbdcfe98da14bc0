use crate::model::id::{BookingId, SlotId, UserId};
use crate::model::slot::Facility;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

pub mod event;

/// 確定した予約。1 ユーザー・1 スロット・1 開催日につき最大 1 件。
/// 作成後は削除（キャンセル）以外の変更を許さない。
#[derive(Debug)]
pub struct Booking {
    pub booking_id: BookingId,
    pub booked_by: UserId,
    pub slot_id: SlotId,
    pub booked_for: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// 「自分の予約」一覧用の読み取りモデル。スロットの概要を併せて返す。
#[derive(Debug)]
pub struct BookingWithSlot {
    pub booking_id: BookingId,
    pub slot_id: SlotId,
    pub booked_for: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub facility: Facility,
    pub title: String,
    pub starts_at: NaiveTime,
    pub ends_at: NaiveTime,
}

/// 管理者向けの予約者一覧の 1 行。
/// 並び順（surname, name）は帳票出力の契約なので変更しないこと。
#[derive(Debug)]
pub struct SlotOccurrenceBooker {
    pub user_id: UserId,
    pub surname: String,
    pub name: String,
    pub group: String,
    pub booked_at: DateTime<Utc>,
}
