use axum::{routing::get, Router};
use registry::AppRegistry;

use crate::handler::slot::show_availability;

pub fn build_slot_routers() -> Router<AppRegistry> {
    let slot_routers = Router::new().route("/", get(show_availability));

    Router::new().nest("/slots", slot_routers)
}
