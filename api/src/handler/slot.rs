use crate::{
    extractor::AuthorizedUser,
    model::slot::{
        AvailabilityListQuery, AvailabilityListQueryWithCaller, AvailabilityResponse,
        CreateSlotRequest, SlotAvailabilityResponse, SlotsResponse, UpdateSlotRequest,
        UpdateSlotRequestWithId,
    },
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use garde::Validate;
use kernel::model::id::SlotId;
use registry::AppRegistry;
use shared::error::{AppError, AppResult};

// 指定日の空き状況一覧。
// 開始時刻と終了時刻の比較ではなく曜日の一致だけで開催日を判定する
pub async fn show_availability(
    user: AuthorizedUser,
    Query(query): Query<AvailabilityListQuery>,
    State(registry): State<AppRegistry>,
) -> AppResult<Json<AvailabilityResponse>> {
    query.validate(&())?;

    let date = query.date;
    let query = AvailabilityListQueryWithCaller::new(user.id(), query);
    registry
        .slot_repository()
        .find_availability(query.into())
        .await
        .map(|items| AvailabilityResponse {
            date,
            items: items
                .into_iter()
                .map(SlotAvailabilityResponse::from)
                .collect(),
        })
        .map(Json)
}

pub async fn show_slot_list(
    user: AuthorizedUser,
    State(registry): State<AppRegistry>,
) -> AppResult<Json<SlotsResponse>> {
    if !user.is_admin() {
        return Err(AppError::ForbiddenOperation);
    }

    registry
        .slot_repository()
        .find_all()
        .await
        .map(SlotsResponse::from)
        .map(Json)
}

pub async fn register_slot(
    user: AuthorizedUser,
    State(registry): State<AppRegistry>,
    Json(req): Json<CreateSlotRequest>,
) -> AppResult<StatusCode> {
    if !user.is_admin() {
        return Err(AppError::ForbiddenOperation);
    }
    req.validate(&())?;

    // starts_at < ends_at のチェックはリポジトリ側でも行うが、
    // 入力エラーとして早めに弾く
    if req.starts_at >= req.ends_at {
        return Err(AppError::UnprocessableEntity(
            "開始時刻は終了時刻より前でなければなりません".into(),
        ));
    }

    registry
        .slot_repository()
        .create(req.into())
        .await
        .map(|_| StatusCode::CREATED)
}

pub async fn update_slot(
    user: AuthorizedUser,
    Path(slot_id): Path<SlotId>,
    State(registry): State<AppRegistry>,
    Json(req): Json<UpdateSlotRequest>,
) -> AppResult<StatusCode> {
    if !user.is_admin() {
        return Err(AppError::ForbiddenOperation);
    }
    req.validate(&())?;

    let update_slot = UpdateSlotRequestWithId::new(slot_id, req);
    registry
        .slot_repository()
        .update(update_slot.into())
        .await
        .map(|_| StatusCode::OK)
}

// 無効化のみを提供する。予約の参照整合性を保つため削除は存在しない
pub async fn deactivate_slot(
    user: AuthorizedUser,
    Path(slot_id): Path<SlotId>,
    State(registry): State<AppRegistry>,
) -> AppResult<StatusCode> {
    if !user.is_admin() {
        return Err(AppError::ForbiddenOperation);
    }

    registry
        .slot_repository()
        .deactivate(slot_id)
        .await
        .map(|_| StatusCode::OK)
}
