//! Upstream data providers: current weather and top-rated places.
//!
//! Each provider sits behind a small trait so the explorer can be driven
//! by the real HTTP clients or by in-memory fakes.

pub mod places;
pub mod types;
pub mod weather;

pub use places::GooglePlacesClient;
pub use types::{Coordinates, Place, ProviderError, Weather};
pub use weather::OpenWeatherClient;

const USER_AGENT: &str = "CityZen/0.3 (city-explorer)";

/// Anything that can report the current weather for a city.
pub trait WeatherSource: Send {
    fn current(&self, city: &str) -> Result<Weather, ProviderError>;
}

/// Anything that can list places for a free-text city or country query.
pub trait PlacesSource: Send {
    fn search(&self, query: &str, limit: usize) -> Result<Vec<Place>, ProviderError>;
}

fn agent() -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout(std::time::Duration::from_secs(10))
        .user_agent(USER_AGENT)
        .build()
}

fn from_ureq(err: ureq::Error) -> ProviderError {
    match err {
        ureq::Error::Status(status, response) => ProviderError::Status {
            status,
            message: response.into_string().unwrap_or_default(),
        },
        ureq::Error::Transport(transport) => ProviderError::Network(transport.to_string()),
    }
}
