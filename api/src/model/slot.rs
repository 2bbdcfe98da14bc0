use chrono::{NaiveDate, NaiveTime};
use derive_new::new;
use garde::Validate;
use kernel::model::{
    id::{SlotId, UserId},
    slot::{
        event::{CreateSlot, UpdateSlot},
        AvailabilityQuery, Facility, Slot, SlotAvailability,
    },
};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FacilityName {
    Gym,
    Fields,
    Pool,
}

impl From<Facility> for FacilityName {
    fn from(value: Facility) -> Self {
        match value {
            Facility::Gym => Self::Gym,
            Facility::Fields => Self::Fields,
            Facility::Pool => Self::Pool,
        }
    }
}

impl From<FacilityName> for Facility {
    fn from(value: FacilityName) -> Self {
        match value {
            FacilityName::Gym => Self::Gym,
            FacilityName::Fields => Self::Fields,
            FacilityName::Pool => Self::Pool,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateSlotRequest {
    #[garde(skip)]
    pub facility: FacilityName,
    #[garde(length(min = 1))]
    pub title: String,
    #[garde(range(min = 1, max = 7))]
    pub weekday: i16,
    #[garde(skip)]
    pub starts_at: NaiveTime,
    #[garde(skip)]
    pub ends_at: NaiveTime,
    // 未指定は定員無制限
    #[garde(inner(range(min = 1)))]
    pub capacity: Option<i32>,
    #[garde(skip)]
    pub is_active: Option<bool>,
}

impl From<CreateSlotRequest> for CreateSlot {
    fn from(value: CreateSlotRequest) -> Self {
        let CreateSlotRequest {
            facility,
            title,
            weekday,
            starts_at,
            ends_at,
            capacity,
            is_active,
        } = value;
        CreateSlot {
            facility: facility.into(),
            title,
            weekday,
            starts_at,
            ends_at,
            capacity,
            is_active: is_active.unwrap_or(true),
        }
    }
}

// フィールドが「送られてこなかった」と「null が送られた」を区別するための
// デシリアライザ。capacity の部分更新（無制限化）に必要
fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSlotRequest {
    #[garde(skip)]
    pub facility: Option<FacilityName>,
    #[garde(inner(length(min = 1)))]
    pub title: Option<String>,
    #[garde(inner(range(min = 1, max = 7)))]
    pub weekday: Option<i16>,
    #[garde(skip)]
    pub starts_at: Option<NaiveTime>,
    #[garde(skip)]
    pub ends_at: Option<NaiveTime>,
    #[garde(skip)]
    #[serde(default, deserialize_with = "deserialize_some")]
    pub capacity: Option<Option<i32>>,
    #[garde(skip)]
    pub is_active: Option<bool>,
}

#[derive(new)]
pub struct UpdateSlotRequestWithId(SlotId, UpdateSlotRequest);

impl From<UpdateSlotRequestWithId> for UpdateSlot {
    fn from(value: UpdateSlotRequestWithId) -> Self {
        let UpdateSlotRequestWithId(
            slot_id,
            UpdateSlotRequest {
                facility,
                title,
                weekday,
                starts_at,
                ends_at,
                capacity,
                is_active,
            },
        ) = value;
        UpdateSlot {
            slot_id,
            facility: facility.map(Facility::from),
            title,
            weekday,
            starts_at,
            ends_at,
            capacity,
            is_active,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityListQuery {
    #[garde(skip)]
    pub date: NaiveDate,
    #[garde(skip)]
    pub facility: Option<FacilityName>,
}

#[derive(new)]
pub struct AvailabilityListQueryWithCaller(UserId, AvailabilityListQuery);

impl From<AvailabilityListQueryWithCaller> for AvailabilityQuery {
    fn from(value: AvailabilityListQueryWithCaller) -> Self {
        let AvailabilityListQueryWithCaller(caller, AvailabilityListQuery { date, facility }) =
            value;
        AvailabilityQuery {
            date,
            facility: facility.map(Facility::from),
            caller,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotResponse {
    pub slot_id: SlotId,
    pub facility: FacilityName,
    pub title: String,
    pub weekday: i16,
    pub starts_at: NaiveTime,
    pub ends_at: NaiveTime,
    pub capacity: Option<i32>,
    pub is_active: bool,
}

impl From<Slot> for SlotResponse {
    fn from(value: Slot) -> Self {
        let Slot {
            slot_id,
            facility,
            title,
            weekday,
            starts_at,
            ends_at,
            capacity,
            is_active,
        } = value;
        Self {
            slot_id,
            facility: facility.into(),
            title,
            weekday,
            starts_at,
            ends_at,
            capacity,
            is_active,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotsResponse {
    pub items: Vec<SlotResponse>,
}

impl From<Vec<Slot>> for SlotsResponse {
    fn from(value: Vec<Slot>) -> Self {
        Self {
            items: value.into_iter().map(SlotResponse::from).collect(),
        }
    }
}

/// 空き状況一覧の 1 行。remaining が null の場合は定員無制限を意味する
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotAvailabilityResponse {
    pub slot_id: SlotId,
    pub facility: FacilityName,
    pub title: String,
    pub weekday: i16,
    pub starts_at: NaiveTime,
    pub ends_at: NaiveTime,
    pub capacity: Option<i32>,
    pub booked_count: i64,
    pub remaining: Option<i64>,
    pub is_full: bool,
    pub booked_by_me: bool,
}

impl From<SlotAvailability> for SlotAvailabilityResponse {
    fn from(value: SlotAvailability) -> Self {
        // 残席と満員判定は kernel の導出値を使う。保存された数値ではない
        let remaining = value.remaining();
        let is_full = value.is_full();
        let SlotAvailability {
            slot,
            booked_count,
            booked_by_caller,
        } = value;
        Self {
            slot_id: slot.slot_id,
            facility: slot.facility.into(),
            title: slot.title,
            weekday: slot.weekday,
            starts_at: slot.starts_at,
            ends_at: slot.ends_at,
            capacity: slot.capacity,
            booked_count,
            remaining,
            is_full,
            booked_by_me: booked_by_caller,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityResponse {
    pub date: NaiveDate,
    pub items: Vec<SlotAvailabilityResponse>,
}
