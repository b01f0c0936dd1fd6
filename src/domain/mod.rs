pub mod card;
pub mod plan;
pub mod task;

pub use card::{Card, CardCategory, NewCard, Scheduling};
pub use plan::{ExercisePlan, ExercisePlanStatus, StudyPlan, TaskCategory, TaskSpec};
pub use task::{
  DragRow, DraggingTask, FillInTask, Segment, Task, TaskContent, TaskKind, VocabTask, DRAG_MARKER,
};
