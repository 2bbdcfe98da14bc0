use super::Facility;
use crate::model::id::SlotId;
use chrono::NaiveTime;

pub struct CreateSlot {
    pub facility: Facility,
    pub title: String,
    pub weekday: i16,
    pub starts_at: NaiveTime,
    pub ends_at: NaiveTime,
    pub capacity: Option<i32>,
    pub is_active: bool,
}

/// 部分更新イベント。None のフィールドは変更しない。
/// capacity は「無制限にする」と「変更しない」を区別するため二重の Option にする。
#[derive(Debug)]
pub struct UpdateSlot {
    pub slot_id: SlotId,
    pub facility: Option<Facility>,
    pub title: Option<String>,
    pub weekday: Option<i16>,
    pub starts_at: Option<NaiveTime>,
    pub ends_at: Option<NaiveTime>,
    pub capacity: Option<Option<i32>>,
    pub is_active: Option<bool>,
}
