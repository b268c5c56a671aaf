//! Hardware-state aggregation for Pankha appliances: a flat component tree
//! built from pluggable data readers, hysteresis threshold alarms, and
//! hot-plug management of I2C power supplies and distribution units.

pub mod alarms;
pub mod app;
pub mod config;
pub mod error;
pub mod hardware;
pub mod publisher;
