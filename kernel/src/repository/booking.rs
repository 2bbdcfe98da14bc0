use crate::model::{
    booking::{
        event::{CancelBooking, CreateBooking},
        BookingWithSlot, SlotOccurrenceBooker,
    },
    id::{BookingId, SlotId, UserId},
};
use async_trait::async_trait;
use chrono::NaiveDate;
use shared::error::AppResult;

/// 予約台帳。Booking レコードの作成・削除はこのリポジトリだけが行う。
#[async_trait]
pub trait BookingRepository: Send + Sync {
    // 予約を作成する。
    // (user, slot, date) の一意性と定員の両方を、同一 (slot, date) への
    // 並行呼び出しに対して原子的に検査する
    async fn create(&self, event: CreateBooking) -> AppResult<BookingId>;
    // 予約をキャンセルする。本人または管理者のみ
    async fn cancel(&self, event: CancelBooking) -> AppResult<()>;
    // ユーザーの指定日の予約一覧を取得する
    async fn find_by_user_and_date(
        &self,
        user_id: UserId,
        date: NaiveDate,
    ) -> AppResult<Vec<BookingWithSlot>>;
    // スロットの指定日の予約者一覧を取得する（surname, name 順）
    async fn find_bookers_by_slot_and_date(
        &self,
        slot_id: SlotId,
        date: NaiveDate,
    ) -> AppResult<Vec<SlotOccurrenceBooker>>;
}
