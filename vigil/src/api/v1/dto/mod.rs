//! Request/response DTOs for the v1 API.
//!
//! Wire field names are camelCase; domain models stay snake_case. The
//! translation happens here so storage and API can evolve independently.

mod alerts;
mod rules;
mod searches;

pub use alerts::*;
pub use rules::*;
pub use searches::*;
