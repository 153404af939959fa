mod deep_search;
mod dispatch;
mod learning;
mod scheduler;
mod search;
mod sweeper;

pub use deep_search::DeepSearchOrchestrator;
pub use dispatch::{AlertDispatcher, NotificationChannel, WebhookChannel};
pub use learning::LearningEngine;
pub use scheduler::SearchScheduler;
pub use search::{SearchService, TriggerResponse};
pub use sweeper::PageSweeper;
