pub mod card_selector;
pub mod session;
pub mod sm2;

pub use card_selector::{due_count, select_batch, DueQuery};
pub use session::{CardView, ReviewSession, ReviewSummary};
pub use sm2::update;
