//! The active study plan and the chat that produced it.

use std::path::PathBuf;

use super::generator::PlanEvent;
use super::history::{media_mime_type, ChatMessage};
use crate::config::ensure_parent_dir;
use crate::domain::StudyPlan;
use crate::error::{Error, Result};

/// Where an accepted-but-not-yet-materialized plan is kept between runs
pub trait StudyPlanStore: Send + Sync {
    fn load(&self) -> Result<Option<StudyPlan>>;
    fn save(&self, plan: &StudyPlan) -> Result<()>;
    /// Removing a plan that does not exist is a no-op
    fn delete(&self) -> Result<()>;
}

/// Plan stored as pretty JSON in a single file
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl StudyPlanStore for JsonFileStore {
    fn load(&self) -> Result<Option<StudyPlan>> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&contents)?))
    }

    fn save(&self, plan: &StudyPlan) -> Result<()> {
        ensure_parent_dir(&self.path)?;
        std::fs::write(&self.path, serde_json::to_string_pretty(plan)?)?;
        tracing::info!("Saved study plan '{}' to {}", plan.title, self.path.display());
        Ok(())
    }

    fn delete(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!("Study plan does not exist, nothing to delete");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PlanningSession {
    history: Vec<ChatMessage>,
    plan: Option<StudyPlan>,
}

impl PlanningSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume from the store; a saved plan seeds the chat.
    pub fn restore(store: &dyn StudyPlanStore) -> Result<Self> {
        let mut session = Self::new();
        if let Some(plan) = store.load()? {
            session.history.push(ChatMessage::plan(plan.clone()));
            session.plan = Some(plan);
        }
        Ok(session)
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn plan(&self) -> Option<&StudyPlan> {
        self.plan.as_ref()
    }

    pub fn push_user_message(&mut self, text: &str) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::InvalidInput("message must not be empty".to_string()));
        }
        self.history.push(ChatMessage::user(text));
        Ok(())
    }

    /// Attach an uploaded file; re-uploading the same name replaces it.
    pub fn add_media(&mut self, name: &str, data: Vec<u8>) -> Result<()> {
        let mime_type = media_mime_type(name)
            .ok_or_else(|| Error::InvalidInput(format!("unsupported file type: {}", name)))?;
        self.remove_media(name);
        self.history.push(ChatMessage::UserMedia {
            name: name.to_string(),
            mime_type: mime_type.to_string(),
            data,
        });
        Ok(())
    }

    pub fn remove_media(&mut self, name: &str) -> bool {
        let before = self.history.len();
        self.history
            .retain(|m| !matches!(m, ChatMessage::UserMedia { name: n, .. } if n == name));
        self.history.len() != before
    }

    /// Replace the history with what the generator returned and take its latest plan.
    pub fn apply_run(&mut self, history: Vec<ChatMessage>, events: &[PlanEvent]) {
        self.history = history;
        if let Some(plan) = events.iter().rev().find_map(|e| e.plan.clone()) {
            self.plan = Some(plan);
        }
    }

    pub fn save(&self, store: &dyn StudyPlanStore) -> Result<()> {
        let plan = self
            .plan
            .as_ref()
            .ok_or_else(|| Error::NotFound("no study plan to save".to_string()))?;
        store.save(plan)
    }

    /// Forget the plan and the chat, including the stored copy.
    pub fn reset(&mut self, store: &dyn StudyPlanStore) -> Result<()> {
        store.delete()?;
        self.history.clear();
        self.plan = None;
        Ok(())
    }
}
