//! Port traits: the seams between scan logic and the outside world.

pub mod config_port;
pub mod data_port;
pub mod report_port;
pub mod watchlist_port;
