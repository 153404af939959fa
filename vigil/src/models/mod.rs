mod alert;
mod page;
mod progress;
mod recurring;
mod search;
mod suppression;

pub use alert::*;
pub use page::*;
pub use progress::*;
pub use recurring::*;
pub use search::*;
pub use suppression::*;
