use crate::model::id::{SlotId, UserId};
use chrono::{Datelike, NaiveDate, NaiveTime};
use strum::{AsRefStr, EnumString};

pub mod event;

/// 施設の種別。DB には UPPERCASE の文字列として保存する。
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, EnumString)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Facility {
    Gym,
    Fields,
    Pool,
}

/// 毎週繰り返す時間枠のテンプレート。
/// weekday は 1（月曜）〜 7（日曜）。
/// capacity が None の場合は定員無制限を意味する。
#[derive(Debug, Clone)]
pub struct Slot {
    pub slot_id: SlotId,
    pub facility: Facility,
    pub title: String,
    pub weekday: i16,
    pub starts_at: NaiveTime,
    pub ends_at: NaiveTime,
    pub capacity: Option<i32>,
    pub is_active: bool,
}

impl Slot {
    /// 指定の日付がこのスロットの開催日かどうかを返す。
    /// 判定は曜日の一致のみ。祝日などの例外は扱わない。
    pub fn occurs_on(&self, date: NaiveDate) -> bool {
        i64::from(self.weekday) == i64::from(date.weekday().number_from_monday())
    }

    /// 残席数を返す。定員無制限の場合は None。
    /// 定員を超えて予約が存在しても 0 で打ち止めにする
    /// （定員の引き下げは過去の予約に遡及しないため、超過は正常な状態）。
    pub fn remaining_capacity(&self, booked_count: i64) -> Option<i64> {
        assert!(booked_count >= 0, "booked_count must not be negative");
        self.capacity
            .map(|cap| (i64::from(cap) - booked_count).max(0))
    }

    /// 満員かどうかを返す。定員無制限の場合は常に false。
    pub fn is_full(&self, booked_count: i64) -> bool {
        assert!(booked_count >= 0, "booked_count must not be negative");
        match self.capacity {
            None => false,
            Some(cap) => booked_count >= i64::from(cap),
        }
    }
}

/// 空き状況表示用の読み取りモデル。
/// booked_count はコミット済みの予約数であり、キャッシュしない。
#[derive(Debug)]
pub struct SlotAvailability {
    pub slot: Slot,
    pub booked_count: i64,
    pub booked_by_caller: bool,
}

impl SlotAvailability {
    pub fn remaining(&self) -> Option<i64> {
        self.slot.remaining_capacity(self.booked_count)
    }

    pub fn is_full(&self) -> bool {
        self.slot.is_full(self.booked_count)
    }
}

/// 空き状況の検索条件。
#[derive(Debug)]
pub struct AvailabilityQuery {
    pub date: NaiveDate,
    pub facility: Option<Facility>,
    pub caller: UserId,
}
