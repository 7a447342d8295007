pub mod compose;
pub mod money;
pub mod notification;
pub mod payment;
pub mod ports;
