//! HTTP API for FuelTrackr

pub mod handlers;
pub mod oidc_handlers;
pub mod routes;
pub mod travel_handlers;
pub mod user_handlers;

pub use routes::create_router;
