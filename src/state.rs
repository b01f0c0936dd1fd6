//! Application state shared by all handlers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::audio::AudioSynthesizer;
use crate::config::Settings;
use crate::db::DbPool;
use crate::error::{Error, Result};
use crate::exercises::ExerciseAttempt;
use crate::llm::GenerationService;
use crate::planning::{PlanningSession, StudyPlanStore};
use crate::srs::ReviewSession;

/// Open exercise attempts keyed by task id
pub type Attempts = HashMap<i64, ExerciseAttempt>;

/// Application state passed to all handlers
#[derive(Clone)]
pub struct AppState {
    /// Learner database (cards, plans, tasks, model usage)
    pub db: DbPool,

    pub llm: Arc<dyn GenerationService>,
    pub tts: Arc<dyn AudioSynthesizer>,
    pub settings: Arc<Settings>,

    /// Storage for the study plan that has not been accepted yet
    pub store: Arc<dyn StudyPlanStore>,

    /// Held across model calls, hence the async mutex
    pub planning: Arc<tokio::sync::Mutex<PlanningSession>>,

    /// Standalone review batch started from the deck
    pub review: Arc<Mutex<Option<ReviewSession>>>,

    pub attempts: Arc<Mutex<Attempts>>,
}

impl AppState {
    pub fn new(
        db: DbPool,
        llm: Arc<dyn GenerationService>,
        tts: Arc<dyn AudioSynthesizer>,
        settings: Settings,
        store: Arc<dyn StudyPlanStore>,
        planning: PlanningSession,
    ) -> Self {
        Self {
            db,
            llm,
            tts,
            settings: Arc::new(settings),
            store,
            planning: Arc::new(tokio::sync::Mutex::new(planning)),
            review: Arc::new(Mutex::new(None)),
            attempts: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn lock_review(&self) -> Result<MutexGuard<'_, Option<ReviewSession>>> {
        self.review.lock().map_err(|_| Error::LockPoisoned)
    }

    pub fn lock_attempts(&self) -> Result<MutexGuard<'_, Attempts>> {
        self.attempts.lock().map_err(|_| Error::LockPoisoned)
    }
}
