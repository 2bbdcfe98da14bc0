use chrono::NaiveTime;
use kernel::model::{
    id::SlotId,
    slot::{Facility, Slot, SlotAvailability},
};
use shared::error::AppError;
use std::str::FromStr;

#[derive(sqlx::FromRow)]
pub struct SlotRow {
    pub slot_id: SlotId,
    pub facility: String,
    pub title: String,
    pub weekday: i16,
    pub starts_at: NaiveTime,
    pub ends_at: NaiveTime,
    pub capacity: Option<i32>,
    pub is_active: bool,
}

// facility は DB 上では文字列なので、パース失敗を変換エラーとして扱う
impl TryFrom<SlotRow> for Slot {
    type Error = AppError;

    fn try_from(value: SlotRow) -> Result<Self, Self::Error> {
        let SlotRow {
            slot_id,
            facility,
            title,
            weekday,
            starts_at,
            ends_at,
            capacity,
            is_active,
        } = value;
        let facility = Facility::from_str(&facility)
            .map_err(|e| AppError::ConversionEntityError(e.to_string()))?;
        Ok(Slot {
            slot_id,
            facility,
            title,
            weekday,
            starts_at,
            ends_at,
            capacity,
            is_active,
        })
    }
}

/// 空き状況一覧用。スロットの列に加えて、その日のコミット済み予約数と
/// 呼び出しユーザー自身が予約済みかどうかを DB 側で算出した結果を持つ。
#[derive(sqlx::FromRow)]
pub struct SlotAvailabilityRow {
    pub slot_id: SlotId,
    pub facility: String,
    pub title: String,
    pub weekday: i16,
    pub starts_at: NaiveTime,
    pub ends_at: NaiveTime,
    pub capacity: Option<i32>,
    pub is_active: bool,
    pub booked_count: i64,
    pub booked_by_caller: bool,
}

impl TryFrom<SlotAvailabilityRow> for SlotAvailability {
    type Error = AppError;

    fn try_from(value: SlotAvailabilityRow) -> Result<Self, Self::Error> {
        let SlotAvailabilityRow {
            slot_id,
            facility,
            title,
            weekday,
            starts_at,
            ends_at,
            capacity,
            is_active,
            booked_count,
            booked_by_caller,
        } = value;
        let slot = Slot::try_from(SlotRow {
            slot_id,
            facility,
            title,
            weekday,
            starts_at,
            ends_at,
            capacity,
            is_active,
        })?;
        Ok(SlotAvailability {
            slot,
            booked_count,
            booked_by_caller,
        })
    }
}
