pub mod alerts;
pub mod events;
pub mod health;
pub mod rules;
pub mod searches;

pub use health::health_check;
