//! Real-time verdict delivery over WebSockets.

pub mod handler;
pub mod hub;

pub use hub::NotificationHub;
