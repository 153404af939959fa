mod gateway;
mod provider;

pub use gateway::SearchGateway;
pub use provider::{HttpSearchProvider, SearchParams, SearchProvider};
