//! Route definitions for the SlotPark API.

use axum::routing::{get, patch, post};
use axum::Router;

use crate::app_state::AppState;
use crate::handlers::{anpr, booking, gate, parking, payment};

pub fn booking_routes() -> Router<AppState> {
    Router::new()
        .route("/api/bookings", post(booking::create_booking))
        .route("/api/bookings/mine", get(booking::my_bookings))
        .route("/api/bookings/owner", get(booking::owner_bookings))
        .route("/api/bookings/:id/cancel", post(booking::cancel_booking))
}

pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/api/payments/key", get(payment::gateway_key))
        .route("/api/payments/orders", post(payment::create_order))
        .route("/api/payments/verify", post(payment::verify_payment))
}

pub fn gate_routes() -> Router<AppState> {
    Router::new()
        .route("/api/gate/checkin/plate", post(gate::check_in_by_plate))
        .route("/api/gate/checkout/plate", post(gate::check_out_by_plate))
        .route("/api/gate/checkin/booking", post(gate::check_in_by_booking))
        .route("/api/gate/checkout/booking", post(gate::check_out_by_booking))
        .route("/api/gate/arrive", post(gate::arrive_at_gate))
        .route("/api/gate/arrive/revoke", post(gate::revoke_arrival))
}

pub fn parking_routes() -> Router<AppState> {
    Router::new()
        .route("/api/parkings", post(parking::create_parking))
        .route("/api/parkings/owner", get(parking::owner_parkings))
        .route("/api/parkings/:id", get(parking::get_parking))
        .route("/api/parkings/:id", patch(parking::update_parking))
}

pub fn anpr_routes() -> Router<AppState> {
    Router::new().route("/api/anpr/scan", post(anpr::scan_plate))
}
