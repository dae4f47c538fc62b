//! Application state shared across handlers.

use std::sync::Arc;

use crate::anpr::PlateRecognitionClient;
use crate::booking_service::BookingService;
use crate::gate_service::GateService;
use crate::parking_service::ParkingService;
use crate::payment_service::PaymentService;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub booking_service: Arc<BookingService>,
    pub payment_service: Arc<PaymentService>,
    pub gate_service: Arc<GateService>,
    pub parking_service: Arc<ParkingService>,
    pub plate_client: Arc<PlateRecognitionClient>,
}

impl AppState {
    pub fn new(
        booking_service: Arc<BookingService>,
        payment_service: Arc<PaymentService>,
        gate_service: Arc<GateService>,
        parking_service: Arc<ParkingService>,
        plate_client: Arc<PlateRecognitionClient>,
    ) -> Self {
        Self {
            booking_service,
            payment_service,
            gate_service,
            parking_service,
            plate_client,
        }
    }
}
