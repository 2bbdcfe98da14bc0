use crate::model::{
    id::SlotId,
    slot::{
        event::{CreateSlot, UpdateSlot},
        AvailabilityQuery, Slot, SlotAvailability,
    },
};
use async_trait::async_trait;
use shared::error::AppResult;

#[async_trait]
pub trait SlotRepository: Send + Sync {
    async fn create(&self, event: CreateSlot) -> AppResult<SlotId>;
    // 部分更新。触られたフィールドのみ検証して反映する
    async fn update(&self, event: UpdateSlot) -> AppResult<()>;
    // is_active を false にする。すでに false の場合も成功（冪等）。
    // ハードデリートは提供しない
    async fn deactivate(&self, slot_id: SlotId) -> AppResult<()>;
    async fn find_by_id(&self, slot_id: SlotId) -> AppResult<Option<Slot>>;
    async fn find_all(&self) -> AppResult<Vec<Slot>>;
    // 指定日に開催されるアクティブなスロットと空き状況を取得する
    async fn find_availability(&self, query: AvailabilityQuery)
        -> AppResult<Vec<SlotAvailability>>;
}
