use axum::{
    routing::{get, post, put},
    Router,
};
use registry::AppRegistry;

use crate::handler::{
    booking::show_bookings_for_slot,
    slot::{deactivate_slot, register_slot, show_slot_list, update_slot},
};

pub fn build_admin_routers() -> Router<AppRegistry> {
    let admin_routers = Router::new()
        .route("/slots", post(register_slot))
        .route("/slots", get(show_slot_list))
        .route("/slots/:slot_id", put(update_slot))
        .route("/slots/:slot_id/deactivate", post(deactivate_slot))
        .route("/bookings", get(show_bookings_for_slot));

    Router::new().nest("/admin", admin_routers)
}
