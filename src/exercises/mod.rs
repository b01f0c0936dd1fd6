//! Exercise tasks: generation from a plan entry, learner attempts, and views.

pub mod attempt;
pub mod generate;
pub mod view;

pub use attempt::{option_pool, shuffled_option_pool, Answers, AttemptState, DragOption, Evaluation, ExerciseAttempt};
pub use generate::{DraggingDraft, FillInDraft, SentenceOrder, TaskGenerator};
pub use view::{TaskBody, TaskView};
