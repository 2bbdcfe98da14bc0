use crate::{
    extractor::AuthorizedUser,
    model::booking::{
        AdminBookingsQuery, BookingWithSlotResponse, CreateBookingRequest, CreateBookingResponse,
        MyBookingsQuery, MyBookingsResponse, SlotOccurrenceBookerResponse,
        SlotOccurrenceBookersResponse,
    },
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use garde::Validate;
use kernel::model::{
    booking::event::{CancelBooking, CreateBooking},
    id::BookingId,
};
use registry::AppRegistry;
use shared::error::{AppError, AppResult};

pub async fn create_booking(
    user: AuthorizedUser,
    State(registry): State<AppRegistry>,
    Json(req): Json<CreateBookingRequest>,
) -> AppResult<(StatusCode, Json<CreateBookingResponse>)> {
    req.validate(&())?;

    let event = CreateBooking::new(user.id(), req.slot_id, req.date);
    registry
        .booking_repository()
        .create(event)
        .await
        .map(|booking_id| (StatusCode::CREATED, Json(CreateBookingResponse::new(booking_id))))
}

pub async fn cancel_booking(
    user: AuthorizedUser,
    Path(booking_id): Path<BookingId>,
    State(registry): State<AppRegistry>,
) -> AppResult<StatusCode> {
    let event = CancelBooking::new(booking_id, user.id(), user.is_admin());
    registry
        .booking_repository()
        .cancel(event)
        .await
        .map(|_| StatusCode::OK)
}

pub async fn show_my_bookings(
    user: AuthorizedUser,
    Query(query): Query<MyBookingsQuery>,
    State(registry): State<AppRegistry>,
) -> AppResult<Json<MyBookingsResponse>> {
    query.validate(&())?;

    registry
        .booking_repository()
        .find_by_user_and_date(user.id(), query.date)
        .await
        .map(|items| MyBookingsResponse {
            date: query.date,
            items: items
                .into_iter()
                .map(BookingWithSlotResponse::from)
                .collect(),
        })
        .map(Json)
}

// 管理者向けの予約者一覧。帳票出力側が並び順（surname, name）に依存している
pub async fn show_bookings_for_slot(
    user: AuthorizedUser,
    Query(query): Query<AdminBookingsQuery>,
    State(registry): State<AppRegistry>,
) -> AppResult<Json<SlotOccurrenceBookersResponse>> {
    if !user.is_admin() {
        return Err(AppError::ForbiddenOperation);
    }
    query.validate(&())?;

    registry
        .booking_repository()
        .find_bookers_by_slot_and_date(query.slot_id, query.date)
        .await
        .map(|items| SlotOccurrenceBookersResponse {
            date: query.date,
            items: items
                .into_iter()
                .map(SlotOccurrenceBookerResponse::from)
                .collect(),
        })
        .map(Json)
}
