//! Planner/critic loop that turns a chat into a [`StudyPlan`].
//!
//! The loop is an explicit sequence of steps. After each step the new chat
//! messages (and the current plan, if any) are sent as a [`PlanEvent`].
//! Dropping the receiver stops the loop after the step in flight.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc;

use super::history::{has_summary, to_contents, ChatMessage};
use super::summary::{summarize_progress, PlanRecord};
use crate::config::{LearnerProfile, LlmSettings};
use crate::domain::{StudyPlan, TaskCategory};
use crate::error::{Error, Result};
use crate::llm::{
    generate_structured, retry_n_times, schema, with_timeout, GenerationRequest, GenerationService, StructuredOutput,
};

pub const PLANNER_FAILURE: &str = "We have a failure, try again";
pub const CRITIC_FAILURE: &str = "Failed to criticize";
pub const CRITIC_APPROVAL: &str = "Looks good (:";

/// Messages appended by one step, plus the plan as it stands after it
#[derive(Debug, Clone, Serialize)]
pub struct PlanEvent {
    pub delta: Vec<ChatMessage>,
    pub plan: Option<StudyPlan>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CriticOutput {
    pub is_good_enough: bool,
    #[serde(default)]
    pub criticism: Option<String>,
}

impl StructuredOutput for CriticOutput {
    fn response_schema() -> Value {
        schema::object(
            &[
                (
                    "is_good_enough",
                    schema::described(schema::boolean(), "Whether plan can be given to the user"),
                ),
                (
                    "criticism",
                    schema::nullable(schema::described(
                        schema::string(),
                        "If not good enough, that will be the criticism for the Planning Agent",
                    )),
                ),
            ],
            &["is_good_enough"],
        )
    }

    fn validate(&self) -> Result<()> {
        let has_criticism = self.criticism.as_deref().is_some_and(|c| !c.trim().is_empty());
        if !self.is_good_enough && !has_criticism {
            return Err(Error::Validation("rejection without criticism".to_string()));
        }
        Ok(())
    }
}

impl StructuredOutput for StudyPlan {
    fn response_schema() -> Value {
        let categories: Vec<&str> = TaskCategory::ALL.iter().map(TaskCategory::as_str).collect();
        let task = schema::object(
            &[
                ("category", schema::string_enum(&categories)),
                ("title", schema::described(schema::string(), "The Title of the task")),
                (
                    "generation_instruction",
                    schema::described(
                        schema::string(),
                        "Description for the task generation agent on what kind of content to include",
                    ),
                ),
                ("purpose", schema::described(schema::string(), "The purpose of the task")),
            ],
            &["category", "title", "generation_instruction", "purpose"],
        );
        schema::object(
            &[
                (
                    "user_message",
                    schema::described(
                        schema::string(),
                        "The reply that will be shown in the Chat interface to the user.",
                    ),
                ),
                ("title", schema::described(schema::string(), "The title of the study Plan")),
                ("goal", schema::described(schema::string(), "The goal of current study plan")),
                (
                    "tasks",
                    schema::described(schema::array(task), "The tasks to be generated"),
                ),
            ],
            &["user_message", "title", "goal", "tasks"],
        )
    }

    fn validate(&self) -> Result<()> {
        StudyPlan::validate(self)
    }
}

// ==================== Prompts ====================

fn task_catalogue(learner: &LearnerProfile) -> String {
    format!(
        "- drag_and_drop:\n    \
         Description: Sentence-based tasks where the learner drags and drops words or phrases into blanks to complete a sentence.\n    \
         When to use: Great for practicing word order, grammar, and sentence structure. Use when the goal is to reinforce syntax or test understanding of sentence construction.\n    \
         Also great when the user needs to choose the specific form of a verb, adjective, or pronoun.\n\n\
         - fill_in:\n    \
         Description: Fill-in-the-blank exercises where the learner types the missing word(s) or letters into a sentence.\n    \
         When to use: Useful for vocabulary recall, grammar points, or testing specific knowledge in context. Use when you want the learner to actively recall and produce language.\n    \
         Also very good to test if the user conjugates correctly, understands verb tense, or applies correct endings.\n\n\
         - sentence_order:\n    \
         Description: The learner is given a sentence in {source} and words in {target} along with some distraction words. The user must reorder the words to form a correct sentence.\n    \
         When to use: Ideal for translation, sentence structure, word order, and understanding how sentences are formed in the target language.\n\n\
         - vocab:\n    \
         Description: Vocabulary flashcard tasks, often with spaced repetition, where the learner reviews and rates their knowledge of words or phrases.\n    \
         When to use: Introduce new vocabulary to the user or reinforce previously learned words.\n",
        source = learner.source_language,
        target = learner.target_language,
    )
}

pub fn planner_prompt(learner: &LearnerProfile) -> String {
    format!(
        "{initial}\n\
         Your job is to help the user plan a new study plan. Listen to what the user wants and create tasks accordingly.\n\
         Initially, you will get an optional summary of the user's past performance so you can create tailored exercises,\n\
         especially regarding their weaknesses.\n\n\
         Optionally, there may be a critic agent criticizing your work; please try to address its criticisms.\n\n\
         The kinds of tasks available, their descriptions, and when to use them:\n\n{catalogue}",
        initial = learner.initial_prompt,
        catalogue = task_catalogue(learner),
    )
}

pub fn critic_prompt(learner: &LearnerProfile) -> String {
    format!(
        "{initial}\n\
         Your role is to act as the Planning Stage Critic. You will receive messages from the User, the Summary Agent, and most importantly, the Planning Agent.\n\
         Your job is to evaluate whether the plan proposed by the Planning Agent is effective and appropriate for the student's needs. \
         If you identify any issues, gaps, or areas for improvement, provide clear and constructive feedback to help refine the plan.\n\n\
         Consider the following when reviewing the plan:\n\
         - Are the tasks well-aligned with the student's goals and proficiency level?\n\
         - Is there a good variety of task types to address different skills (e.g., grammar, vocabulary, sentence structure)?\n\
         - Are the instructions and purposes for each task clear and actionable?\n\
         - Does the plan address any weaknesses or areas for improvement mentioned in the user's summary or previous performance?\n\
         - Is the overall progression logical and supportive of the student's learning journey?\n\n\
         Below are the available task types, their descriptions, and when to use them:\n\n{catalogue}\n\
         If the plan is strong and well-constructed, acknowledge it and give a green flag. If not, provide specific suggestions for improvement.",
        initial = learner.initial_prompt,
        catalogue = task_catalogue(learner),
    )
}

// ==================== Generator ====================

pub struct PlanGenerator<'a> {
    pub llm: &'a dyn GenerationService,
    pub learner: &'a LearnerProfile,
    pub settings: &'a LlmSettings,
    pub critique_rounds: u32,
}

/// Sends events; false once the receiver is gone.
async fn emit(events: &mpsc::Sender<PlanEvent>, delta: Vec<ChatMessage>, plan: Option<&StudyPlan>) -> bool {
    let event = PlanEvent {
        delta,
        plan: plan.cloned(),
    };
    if events.send(event).await.is_err() {
        tracing::debug!("Plan event receiver dropped, stopping");
        return false;
    }
    true
}

impl PlanGenerator<'_> {
    fn request(&self, system_prompt: String, history: &[ChatMessage]) -> GenerationRequest {
        GenerationRequest::new(system_prompt, to_contents(history))
            .with_thinking_disabled(self.settings.disable_thinking)
    }

    /// `Ok(None)` once retries are used up; transport, config and storage errors are returned.
    async fn call<T: StructuredOutput>(&self, request: GenerationRequest, timeout: Duration) -> Result<Option<T>> {
        retry_n_times(self.settings.retries, || {
            let request = request.clone();
            async move { with_timeout(timeout, generate_structured::<T>(self.llm, request)).await }
        })
        .await
        .inspect_err(|e| tracing::error!("Planning call failed: {}", e))
    }

    async fn plan(&self, history: &[ChatMessage]) -> Result<Option<StudyPlan>> {
        let request = self.request(planner_prompt(self.learner), history);
        self.call(request, self.settings.timeout).await
    }

    async fn critique(&self, history: &[ChatMessage]) -> Result<Option<CriticOutput>> {
        let request = self.request(critic_prompt(self.learner), history);
        self.call(request, self.settings.timeout).await
    }

    /// Run the loop on `history` and return it with every new message appended.
    ///
    /// Model calls that keep coming back empty become notices in the chat.
    /// Errors no retry can fix end the run.
    pub async fn run(
        &self,
        mut history: Vec<ChatMessage>,
        past_plans: &[PlanRecord],
        events: mpsc::Sender<PlanEvent>,
    ) -> Result<Vec<ChatMessage>> {
        if !has_summary(&history) {
            match summarize_progress(self.llm, self.learner, self.settings, past_plans).await? {
                Some(summary) => {
                    let message = ChatMessage::summary(summary);
                    history.push(message.clone());
                    if !emit(&events, vec![message], None).await {
                        return Ok(history);
                    }
                }
                None => tracing::warn!("No progress summary produced"),
            }
        }

        let Some(mut plan) = self.plan(&history).await? else {
            let notice = ChatMessage::planner_notice(PLANNER_FAILURE);
            history.push(notice.clone());
            emit(&events, vec![notice], None).await;
            return Ok(history);
        };
        history.push(ChatMessage::plan(plan.clone()));
        if !emit(&events, vec![ChatMessage::plan(plan.clone())], Some(&plan)).await {
            return Ok(history);
        }

        for round in 0..self.critique_rounds {
            tracing::debug!("Critique round {}/{}", round + 1, self.critique_rounds);
            let delta = match self.critique(&history).await? {
                None => vec![ChatMessage::critic(CRITIC_FAILURE)],
                Some(verdict) if verdict.is_good_enough => vec![ChatMessage::critic(CRITIC_APPROVAL)],
                Some(verdict) => {
                    let criticism = ChatMessage::critic(verdict.criticism.unwrap_or_default());
                    history.push(criticism.clone());
                    let revision = match self.plan(&history).await? {
                        Some(revised) => {
                            plan = revised;
                            ChatMessage::plan(plan.clone())
                        }
                        None => ChatMessage::planner_notice(PLANNER_FAILURE),
                    };
                    history.push(revision.clone());
                    if !emit(&events, vec![criticism, revision], Some(&plan)).await {
                        return Ok(history);
                    }
                    continue;
                }
            };
            history.extend(delta.iter().cloned());
            if !emit(&events, delta, Some(&plan)).await {
                return Ok(history);
            }
        }

        Ok(history)
    }
}

/// Convenience: run on a fresh channel and collect every event.
pub async fn run_collecting(
    generator: &PlanGenerator<'_>,
    history: Vec<ChatMessage>,
    past_plans: &[PlanRecord],
) -> Result<(Vec<ChatMessage>, Vec<PlanEvent>)> {
    let (tx, mut rx) = mpsc::channel(16);
    let driver = generator.run(history, past_plans, tx);
    let collector = async {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    };
    let (history, events) = tokio::join!(driver, collector);
    Ok((history?, events))
}

/// Latest plan carried by any event
pub fn latest_plan(events: &[PlanEvent]) -> Option<&StudyPlan> {
    events.iter().rev().find_map(|e| e.plan.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::scripted::ScriptedService;
    use crate::planning::history::PlannerReply;
    use crate::testing::sample_plan;
    use serde_json::json;

    fn plan_json(title: &str) -> Value {
        let mut plan = sample_plan();
        plan.title = title.to_string();
        serde_json::to_value(plan).unwrap()
    }

    fn with_summary() -> Vec<ChatMessage> {
        vec![
            ChatMessage::user("Plan something about food"),
            ChatMessage::summary("No plans found so far"),
        ]
    }

    fn settings(retries: u32) -> LlmSettings {
        LlmSettings {
            retries,
            ..LlmSettings::default()
        }
    }

    #[tokio::test]
    async fn test_planner_failure_single_notice() {
        let llm = ScriptedService::new(vec![]);
        let learner = LearnerProfile::default();
        let settings = settings(2);
        let generator = PlanGenerator {
            llm: &llm,
            learner: &learner,
            settings: &settings,
            critique_rounds: 1,
        };

        let (history, events) = run_collecting(&generator, with_summary(), &[]).await.unwrap();

        assert_eq!(events.len(), 1);
        assert!(events[0].plan.is_none());
        assert_eq!(events[0].delta, vec![ChatMessage::planner_notice(PLANNER_FAILURE)]);
        let notices = history
            .iter()
            .filter(|m| **m == ChatMessage::planner_notice(PLANNER_FAILURE))
            .count();
        assert_eq!(notices, 1);
        assert_eq!(history.len(), 3);
        // Both retries used up
        assert_eq!(llm.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_summary_added_once() {
        let llm = ScriptedService::new(vec![
            Ok(Some(plan_json("Food"))),
            Ok(Some(json!({"is_good_enough": true, "criticism": null}))),
        ]);
        let learner = LearnerProfile::default();
        let settings = settings(1);
        let generator = PlanGenerator {
            llm: &llm,
            learner: &learner,
            settings: &settings,
            critique_rounds: 1,
        };

        let history = vec![ChatMessage::user("Food please")];
        let (history, events) = run_collecting(&generator, history, &[]).await.unwrap();

        assert_eq!(history[1], ChatMessage::summary("No plans found so far"));
        assert_eq!(events.len(), 3);
        assert_eq!(events[2].delta, vec![ChatMessage::critic(CRITIC_APPROVAL)]);
        assert_eq!(latest_plan(&events).map(|p| p.title.as_str()), Some("Food"));

        // The summary is part of the planner's context
        let requests = llm.requests();
        assert_eq!(requests[0].contents[1].text(), "Summary Agent:\nNo plans found so far");
        assert!(requests[0].system_prompt.contains("help the user plan a new study plan"));
        assert!(requests[1].system_prompt.contains("Planning Stage Critic"));
    }

    #[tokio::test]
    async fn test_criticism_triggers_revision() {
        let llm = ScriptedService::new(vec![
            Ok(Some(plan_json("Draft"))),
            Ok(Some(json!({"is_good_enough": false, "criticism": "Add grammar"}))),
            Ok(Some(plan_json("Revised"))),
        ]);
        let learner = LearnerProfile::default();
        let settings = settings(1);
        let generator = PlanGenerator {
            llm: &llm,
            learner: &learner,
            settings: &settings,
            critique_rounds: 1,
        };

        let (history, events) = run_collecting(&generator, with_summary(), &[]).await.unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[1].delta[0], ChatMessage::critic("Add grammar"));
        assert_eq!(events[1].plan.as_ref().map(|p| p.title.as_str()), Some("Revised"));
        assert!(matches!(
            history.last(),
            Some(ChatMessage::PlanningAgent { reply: PlannerReply::Plan(p) }) if p.title == "Revised"
        ));
        // Revision sees the criticism
        let revision_request = &llm.requests()[2];
        assert_eq!(
            revision_request.contents.last().map(|c| c.text()),
            Some("Critic Agent:\nAdd grammar".to_string())
        );
    }

    #[tokio::test]
    async fn test_failed_revision_keeps_prior_plan() {
        let llm = ScriptedService::new(vec![
            Ok(Some(plan_json("Draft"))),
            Ok(Some(json!({"is_good_enough": false, "criticism": "Too short"}))),
            Err(Error::Validation("bad plan".into())),
        ]);
        let learner = LearnerProfile::default();
        let settings = settings(1);
        let generator = PlanGenerator {
            llm: &llm,
            learner: &learner,
            settings: &settings,
            critique_rounds: 1,
        };

        let (history, events) = run_collecting(&generator, with_summary(), &[]).await.unwrap();
        assert_eq!(events[1].plan.as_ref().map(|p| p.title.as_str()), Some("Draft"));
        assert_eq!(history.last(), Some(&ChatMessage::planner_notice(PLANNER_FAILURE)));
    }

    #[tokio::test]
    async fn test_missing_key_ends_run_with_error() {
        let llm = ScriptedService::new(vec![Err(Error::Config("GEMINI_KEY is not set".into()))]);
        let learner = LearnerProfile::default();
        let settings = settings(3);
        let generator = PlanGenerator {
            llm: &llm,
            learner: &learner,
            settings: &settings,
            critique_rounds: 1,
        };

        let result = run_collecting(&generator, with_summary(), &[]).await;
        assert!(matches!(result, Err(Error::Config(_))));
        // Not retried
        assert_eq!(llm.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_critic_failure_notice() {
        let llm = ScriptedService::new(vec![
            Ok(Some(plan_json("Draft"))),
            Ok(Some(json!({"is_good_enough": false, "criticism": ""}))),
        ]);
        let learner = LearnerProfile::default();
        let settings = settings(1);
        let generator = PlanGenerator {
            llm: &llm,
            learner: &learner,
            settings: &settings,
            critique_rounds: 1,
        };

        let (history, _) = run_collecting(&generator, with_summary(), &[]).await.unwrap();
        assert_eq!(history.last(), Some(&ChatMessage::critic(CRITIC_FAILURE)));
    }

    #[tokio::test]
    async fn test_dropped_receiver_stops_loop() {
        let llm = ScriptedService::new(vec![
            Ok(Some(plan_json("Draft"))),
            Ok(Some(json!({"is_good_enough": true}))),
        ]);
        let learner = LearnerProfile::default();
        let settings = settings(1);
        let generator = PlanGenerator {
            llm: &llm,
            learner: &learner,
            settings: &settings,
            critique_rounds: 3,
        };

        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let history = generator.run(with_summary(), &[], tx).await.unwrap();

        // The plan step ran, the critic never did
        assert_eq!(history.len(), 3);
        assert_eq!(llm.remaining(), 1);
    }

    #[test]
    fn test_critic_output_validation() {
        let ok: CriticOutput = serde_json::from_value(json!({"is_good_enough": true})).unwrap();
        assert!(StructuredOutput::validate(&ok).is_ok());
        let bad: CriticOutput =
            serde_json::from_value(json!({"is_good_enough": false, "criticism": " "})).unwrap();
        assert!(StructuredOutput::validate(&bad).is_err());
    }

    #[test]
    fn test_study_plan_schema_lists_categories() {
        let schema = StudyPlan::response_schema();
        assert_eq!(
            schema["properties"]["tasks"]["items"]["properties"]["category"]["enum"],
            json!(["drag_and_drop", "fill_in", "sentence_order", "vocab"])
        );
    }

    #[test]
    fn test_prompts_use_learner_languages() {
        let learner = LearnerProfile::default();
        assert!(planner_prompt(&learner).contains("a sentence in German and words in Spanish"));
        assert!(critic_prompt(&learner).starts_with(&learner.initial_prompt));
    }
}
