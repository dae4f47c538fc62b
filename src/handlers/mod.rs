//! API handlers: thin adapters from HTTP to the service layer.

pub mod anpr;
pub mod booking;
pub mod gate;
pub mod parking;
pub mod payment;
