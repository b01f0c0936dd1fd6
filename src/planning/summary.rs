//! Progress summary over the learner's most recent exercise plans.

use rusqlite::Connection;
use serde::Serialize;

use crate::config::{LearnerProfile, LlmSettings};
use crate::db;
use crate::domain::Task;
use crate::error::Result;
use crate::llm::{generate_text, retry_n_times, with_timeout, Content, GenerationRequest, GenerationService};

pub const NO_PLANS: &str = "No plans found so far";

#[derive(Debug, Clone, Serialize)]
pub struct TaskRecord {
    pub kind: &'static str,
    pub title: String,
    pub subtitle: Option<String>,
    pub finished: bool,
    pub result_description: Option<String>,
}

impl From<&Task> for TaskRecord {
    fn from(task: &Task) -> Self {
        Self {
            kind: task.kind().as_str(),
            title: task.title.clone(),
            subtitle: task.subtitle.clone(),
            finished: task.finished,
            result_description: task.result_description.clone(),
        }
    }
}

/// One past exercise plan as the summary agent sees it
#[derive(Debug, Clone, Serialize)]
pub struct PlanRecord {
    pub title: String,
    pub goal: String,
    pub status: String,
    pub tasks: Vec<TaskRecord>,
}

/// Load the last `n` plans with their status and task results, newest first.
pub fn recent_plan_records(conn: &Connection, n: usize) -> Result<Vec<PlanRecord>> {
    let plans = db::get_last_n_plans(conn, n)?;
    let mut records = Vec::with_capacity(plans.len());
    for plan in plans {
        let status = db::get_plan_status(conn, plan.id)?;
        let tasks = db::get_tasks_for_plan(conn, plan.id)?;
        records.push(PlanRecord {
            title: plan.title,
            goal: plan.goal,
            status: status.to_string(),
            tasks: tasks.iter().map(TaskRecord::from).collect(),
        });
    }
    Ok(records)
}

pub fn represent_plans_as_json(records: &[PlanRecord]) -> Result<String> {
    Ok(serde_json::to_string_pretty(records)?)
}

pub fn system_prompt(learner: &LearnerProfile) -> String {
    format!(
        "You are an educational assistant helping a student learn {target} using {source} as the \
         instruction language.\n\n\
         The student's current proficiency level in {target} is {level}.\n\n\
         You will receive the results of the student's recent exercise plans. Please provide a \
         summary that includes:\n\
         - The overall proficiency and progress of the student.\n\
         - The topics and skills that were covered.\n\
         - An assessment of how well the student mastered each topic.\n\
         - Any recurring patterns or types of errors observed.\n\
         - Specific areas where the student needs improvement.\n\
         - Areas where the student performed particularly well.\n\n\
         Be clear, concise, and constructive in your feedback.\n\n\
         Now here are the last Results:",
        target = learner.target_language,
        source = learner.source_language,
        level = learner.level,
    )
}

/// Ask the summary model about `records`. `None` when every attempt came back empty.
pub async fn summarize_progress(
    llm: &dyn GenerationService,
    learner: &LearnerProfile,
    settings: &LlmSettings,
    records: &[PlanRecord],
) -> Result<Option<String>> {
    if records.is_empty() {
        return Ok(Some(NO_PLANS.to_string()));
    }

    let request = GenerationRequest::new(
        system_prompt(learner),
        vec![Content::user_text(represent_plans_as_json(records)?)],
    )
    .with_model(settings.summary_model.clone());

    tracing::debug!("Summarizing {} past plan(s)", records.len());
    retry_n_times(settings.retries, || {
        let request = request.clone();
        async move { with_timeout(settings.timeout, generate_text(llm, request)).await }
    })
    .await
}
