//! Application configuration.
//!
//! Values are read from `config.toml` (every section optional), then a few
//! environment overrides are applied (`.env` is loaded first via dotenvy).
//! Anything missing falls back to the defaults below.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

// ==================== Defaults ====================

pub const DEFAULT_DATABASE_PATH: &str = "data/teacher.db";
pub const DEFAULT_STUDY_PLAN_PATH: &str = "data/study_plan.json";

/// Server address to bind to
pub const SERVER_ADDR: &str = "0.0.0.0";

/// Server port
pub const SERVER_PORT: u16 = 3000;

/// Cards per review session
pub const DEFAULT_REVIEW_BATCH: usize = 10;

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

// ==================== File structure ====================

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    database: Option<DatabaseSection>,
    server: Option<ServerSection>,
    learner: Option<LearnerSection>,
    llm: Option<LlmSection>,
    planning: Option<PlanningSection>,
    review: Option<ReviewSection>,
}

#[derive(Debug, Deserialize)]
struct DatabaseSection {
    path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ServerSection {
    addr: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Deserialize)]
struct LearnerSection {
    target_language: Option<String>,
    source_language: Option<String>,
    target_language_code: Option<String>,
    source_language_code: Option<String>,
    level: Option<String>,
    initial_prompt: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LlmSection {
    base_url: Option<String>,
    model: Option<String>,
    summary_model: Option<String>,
    timeout_secs: Option<u64>,
    retries: Option<u32>,
    disable_thinking: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct PlanningSection {
    critique_rounds: Option<u32>,
    summary_plans: Option<usize>,
    study_plan_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReviewSection {
    batch_size: Option<usize>,
}

// ==================== Resolved settings ====================

/// Who is learning what, used to fill every system prompt.
#[derive(Debug, Clone)]
pub struct LearnerProfile {
    pub target_language: String,
    pub source_language: String,
    /// Language code for audio of the `a_content` side
    pub target_language_code: String,
    /// Language code for audio of the `b_content` side
    pub source_language_code: String,
    pub level: String,
    pub initial_prompt: String,
}

impl Default for LearnerProfile {
    fn default() -> Self {
        Self {
            target_language: "Spanish".to_string(),
            source_language: "German".to_string(),
            target_language_code: "es".to_string(),
            source_language_code: "de".to_string(),
            level: "A2".to_string(),
            initial_prompt: "You are a patient and encouraging language teacher.".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub summary_model: String,
    pub timeout: Duration,
    pub retries: u32,
    /// Ask reasoning models to skip thinking for structured calls
    pub disable_thinking: bool,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            summary_model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(15),
            retries: 3,
            disable_thinking: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlanningSettings {
    /// Critic rounds per generation request
    pub critique_rounds: u32,
    /// How many past exercise plans feed the progress summary
    pub summary_plans: usize,
    pub study_plan_path: PathBuf,
}

impl Default for PlanningSettings {
    fn default() -> Self {
        Self {
            critique_rounds: 1,
            summary_plans: 3,
            study_plan_path: PathBuf::from(DEFAULT_STUDY_PLAN_PATH),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub database_path: PathBuf,
    pub server_addr: String,
    pub server_port: u16,
    pub learner: LearnerProfile,
    pub llm: LlmSettings,
    pub planning: PlanningSettings,
    pub review_batch_size: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            server_addr: SERVER_ADDR.to_string(),
            server_port: SERVER_PORT,
            learner: LearnerProfile::default(),
            llm: LlmSettings::default(),
            planning: PlanningSettings::default(),
            review_batch_size: DEFAULT_REVIEW_BATCH,
        }
    }
}

impl Settings {
    /// Get the full server bind address
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server_addr, self.server_port)
    }
}

/// Load settings with priority: env > config.toml > default
pub fn load_settings() -> Result<Settings> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let mut settings = match std::fs::read_to_string("config.toml") {
        Ok(contents) => {
            tracing::info!("Using configuration from config.toml");
            parse_settings(&contents)?
        }
        Err(_) => Settings::default(),
    };

    if let Ok(path) = std::env::var("DATABASE_PATH") {
        tracing::info!("Using database from DATABASE_PATH env: {}", path);
        settings.database_path = PathBuf::from(path);
    }
    if let Ok(key) = std::env::var("GEMINI_KEY") {
        settings.llm.api_key = Some(key);
    }

    tracing::info!("Database path: {}", settings.database_path.display());
    Ok(settings)
}

/// Parse a config.toml body on top of the defaults.
pub fn parse_settings(contents: &str) -> Result<Settings> {
    let file: FileConfig =
        toml::from_str(contents).map_err(|e| Error::Config(e.to_string()))?;
    let mut settings = Settings::default();

    if let Some(db) = file.database {
        if let Some(path) = db.path {
            settings.database_path = PathBuf::from(path);
        }
    }

    if let Some(server) = file.server {
        if let Some(addr) = server.addr {
            settings.server_addr = addr;
        }
        if let Some(port) = server.port {
            settings.server_port = port;
        }
    }

    if let Some(learner) = file.learner {
        let p = &mut settings.learner;
        if let Some(v) = learner.target_language {
            p.target_language = v;
        }
        if let Some(v) = learner.source_language {
            p.source_language = v;
        }
        if let Some(v) = learner.target_language_code {
            p.target_language_code = v;
        }
        if let Some(v) = learner.source_language_code {
            p.source_language_code = v;
        }
        if let Some(v) = learner.level {
            p.level = v;
        }
        if let Some(v) = learner.initial_prompt {
            p.initial_prompt = v;
        }
    }

    if let Some(llm) = file.llm {
        let l = &mut settings.llm;
        if let Some(v) = llm.base_url {
            l.base_url = v;
        }
        if let Some(v) = llm.model {
            l.model = v;
        }
        if let Some(v) = llm.summary_model {
            l.summary_model = v;
        }
        if let Some(v) = llm.timeout_secs {
            l.timeout = Duration::from_secs(v);
        }
        if let Some(v) = llm.retries {
            if v == 0 {
                return Err(Error::Config("llm.retries must be at least 1".to_string()));
            }
            l.retries = v;
        }
        if let Some(v) = llm.disable_thinking {
            l.disable_thinking = v;
        }
    }

    if let Some(planning) = file.planning {
        let p = &mut settings.planning;
        if let Some(v) = planning.critique_rounds {
            p.critique_rounds = v;
        }
        if let Some(v) = planning.summary_plans {
            p.summary_plans = v;
        }
        if let Some(v) = planning.study_plan_path {
            p.study_plan_path = PathBuf::from(v);
        }
    }

    if let Some(review) = file.review {
        if let Some(v) = review.batch_size {
            if v == 0 {
                return Err(Error::Config("review.batch_size must be positive".to_string()));
            }
            settings.review_batch_size = v;
        }
    }

    Ok(settings)
}

/// Ensure the parent directory of a data file exists.
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
