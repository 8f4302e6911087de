pub mod booking;
pub mod lifecycle;
pub mod risk;
pub mod slots;
pub mod sweep;
pub mod timerange;
