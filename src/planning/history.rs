//! Planning chat history and its conversion to model contents.

use serde::Serialize;

use crate::domain::StudyPlan;
use crate::llm::Content;

/// What the planning agent said: a plan, or a notice when planning failed
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PlannerReply {
    Plan(StudyPlan),
    Notice(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "speaker", rename_all = "snake_case")]
pub enum ChatMessage {
    User {
        text: String,
    },
    PlanningAgent {
        reply: PlannerReply,
    },
    CriticAgent {
        text: String,
    },
    SummaryAgent {
        text: String,
    },
    /// Uploaded image or PDF the learner wants the plan built around
    UserMedia {
        name: String,
        mime_type: String,
        #[serde(skip)]
        data: Vec<u8>,
    },
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self::User { text: text.into() }
    }

    pub fn plan(plan: StudyPlan) -> Self {
        Self::PlanningAgent {
            reply: PlannerReply::Plan(plan),
        }
    }

    pub fn planner_notice(text: impl Into<String>) -> Self {
        Self::PlanningAgent {
            reply: PlannerReply::Notice(text.into()),
        }
    }

    pub fn critic(text: impl Into<String>) -> Self {
        Self::CriticAgent { text: text.into() }
    }

    pub fn summary(text: impl Into<String>) -> Self {
        Self::SummaryAgent { text: text.into() }
    }

    pub fn is_summary(&self) -> bool {
        matches!(self, Self::SummaryAgent { .. })
    }

    /// Text shown in the chat; plans show their user message
    pub fn display_text(&self) -> Option<&str> {
        match self {
            Self::User { text } | Self::CriticAgent { text } | Self::SummaryAgent { text } => Some(text.as_str()),
            Self::PlanningAgent {
                reply: PlannerReply::Plan(plan),
            } => Some(plan.user_message.as_str()),
            Self::PlanningAgent {
                reply: PlannerReply::Notice(text),
            } => Some(text.as_str()),
            Self::UserMedia { .. } => None,
        }
    }

    pub fn to_content(&self) -> Content {
        match self {
            Self::User { text } => Content::user_text(text.clone()),
            Self::PlanningAgent { reply } => {
                let body = match reply {
                    PlannerReply::Plan(plan) => serde_json::to_string_pretty(plan)
                        .unwrap_or_else(|_| plan.user_message.clone()),
                    PlannerReply::Notice(text) => text.clone(),
                };
                Content::model_text(format!("Planning Agent:\n{}", body))
            }
            Self::CriticAgent { text } => Content::model_text(format!("Critic Agent:\n{}", text)),
            Self::SummaryAgent { text } => Content::model_text(format!("Summary Agent:\n{}", text)),
            Self::UserMedia { mime_type, data, .. } => Content::media(mime_type.clone(), data.clone()),
        }
    }
}

pub fn to_contents(history: &[ChatMessage]) -> Vec<Content> {
    history.iter().map(ChatMessage::to_content).collect()
}

pub fn has_summary(history: &[ChatMessage]) -> bool {
    history.iter().any(ChatMessage::is_summary)
}

/// MIME type for an uploaded file, judged by extension
pub fn media_mime_type(file_name: &str) -> Option<&'static str> {
    let ext = file_name.rsplit_once('.')?.1.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "pdf" => Some("application/pdf"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{Part, Role};
    use crate::testing::sample_plan;

    #[test]
    fn test_roles_and_labels() {
        let history = vec![
            ChatMessage::user("I want to order food"),
            ChatMessage::summary("Struggles with articles"),
            ChatMessage::plan(sample_plan()),
            ChatMessage::critic("Add a fill-in task"),
            ChatMessage::planner_notice("We have a failure, try again"),
        ];
        let contents = to_contents(&history);

        assert_eq!(contents[0].role, Role::User);
        assert_eq!(contents[0].text(), "I want to order food");
        assert_eq!(contents[1].role, Role::Model);
        assert_eq!(contents[1].text(), "Summary Agent:\nStruggles with articles");
        assert!(contents[2].text().starts_with("Planning Agent:\n{"));
        assert!(contents[2].text().contains("\"generation_instruction\": \"10 food words\""));
        assert_eq!(contents[3].text(), "Critic Agent:\nAdd a fill-in task");
        assert_eq!(contents[4].text(), "Planning Agent:\nWe have a failure, try again");
        assert!(has_summary(&history));
        assert!(!has_summary(&history[..1]));
    }

    #[test]
    fn test_media_becomes_user_part() {
        let message = ChatMessage::UserMedia {
            name: "menu.jpg".to_string(),
            mime_type: "image/jpeg".to_string(),
            data: vec![1, 2],
        };
        let content = message.to_content();
        assert_eq!(content.role, Role::User);
        assert_eq!(
            content.parts,
            vec![Part::Media {
                mime_type: "image/jpeg".to_string(),
                data: vec![1, 2]
            }]
        );
        assert_eq!(message.display_text(), None);
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["speaker"], "user_media");
        assert!(json.get("data").is_none());
    }

    #[test]
    fn test_display_text_for_plan() {
        assert_eq!(
            ChatMessage::plan(sample_plan()).display_text(),
            Some("Here is your plan")
        );
    }

    #[test]
    fn test_media_mime_type() {
        assert_eq!(media_mime_type("scan.PDF"), Some("application/pdf"));
        assert_eq!(media_mime_type("menu.jpg"), Some("image/jpeg"));
        assert_eq!(media_mime_type("photo.png"), Some("image/png"));
        assert_eq!(media_mime_type("notes.txt"), None);
        assert_eq!(media_mime_type("noext"), None);
    }
}
