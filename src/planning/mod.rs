//! Study planning: chat history, progress summary, the planner/critic loop,
//! the active plan, and materialization into stored exercise plans.

pub mod generator;
pub mod history;
pub mod materialize;
pub mod session;
pub mod summary;

pub use generator::{latest_plan, run_collecting, CriticOutput, PlanEvent, PlanGenerator};
pub use history::{ChatMessage, PlannerReply};
pub use materialize::Materializer;
pub use session::{JsonFileStore, PlanningSession, StudyPlanStore};
pub use summary::{recent_plan_records, summarize_progress, PlanRecord};
