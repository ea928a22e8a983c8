//! CityZen: top-rated places, current weather and live "open now" status
//! for any city or country.

pub mod cache;
pub mod config;
pub mod explorer;
pub mod hours;
pub mod jobs;
pub mod logging;
pub mod providers;
pub mod server;
pub mod usage;
