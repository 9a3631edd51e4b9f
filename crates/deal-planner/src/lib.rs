pub mod alert_record;
pub mod insights;
pub mod planner;
pub mod progress;
pub mod runner;

pub use alert_record::AlertRecord;
pub use insights::{parse_bullets, InsightGenerator, ProductInsight};
pub use planner::{CycleClaim, CyclePhase, CycleReport, DealPlanner, PlannerConfig};
pub use progress::ProgressReporter;
pub use runner::{CycleRunner, RunEvent, RunHandle, TriggerError};
