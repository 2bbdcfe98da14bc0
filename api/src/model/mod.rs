pub mod auth;
pub mod booking;
pub mod slot;
pub mod user;
