//! Unit conversion and timestamp formatting for weather data
//!
//! Two independent pieces: [`units`] converts measurements between the
//! speed, temperature, precipitation and pressure units a weather API
//! reports in, and [`time`] turns epoch seconds into fixed-format date
//! strings and back. Both are pure and safe to call from any thread.

pub mod time;
pub mod units;

pub use time::*;
pub use units::*;
