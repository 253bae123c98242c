#![forbid(unsafe_code)]

pub mod achievements;
pub mod badges;
pub mod error;
pub mod model;
pub mod time;

pub use error::Error;
pub use time::Clock;
