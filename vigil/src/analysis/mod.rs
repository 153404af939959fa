mod delta;
mod scorer;
mod suppression;

pub use delta::{AnalysisOutcome, DeltaAnalyzer};
pub use scorer::{final_confidence, should_alert, volume_triggered, ScoreInputs};
pub use suppression::first_matching_rule;
