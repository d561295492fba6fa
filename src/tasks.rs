//! Canned analysis tasks.
//!
//! Each task is a fixed, parameterless prompt template. The catalog is a
//! static slice so lookups are allocation-free and the menu order is stable.

use crate::error::PdfChatError;
use serde::Serialize;

/// A predefined prompt that can be triggered by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TaskDefinition {
    pub id: &'static str,
    /// Shown in the transcript while the task runs.
    pub label: &'static str,
    pub prompt_template: &'static str,
}

const SUMMARIZE: TaskDefinition = TaskDefinition {
    id: "summarize",
    label: "Summarizing document",
    prompt_template: "Please provide a comprehensive summary of this document, \
highlighting key value propositions, financials, and team details.",
};

const TECH_QUESTIONS: TaskDefinition = TaskDefinition {
    id: "tech-questions",
    label: "Generating tech questions",
    prompt_template: "Based on the technical details in this document, please prepare \
a list of 5-10 technical due diligence questions to ask the team.",
};

const CREATE_DIAGRAMS: TaskDefinition = TaskDefinition {
    id: "create-diagrams",
    label: "Creating diagrams from document data",
    prompt_template: "Create diagrams that visualise the key data in this document: \
the business model, the product or system architecture, and any timelines or \
funding figures. Write every diagram as Mermaid syntax inside a ```mermaid fenced \
code block, give each one a short heading and a one-sentence explanation, and only \
use information that appears in the document.",
};

static CATALOG: [TaskDefinition; 3] = [SUMMARIZE, TECH_QUESTIONS, CREATE_DIAGRAMS];

/// All tasks in menu order.
pub fn all() -> &'static [TaskDefinition] {
    &CATALOG
}

/// Look up a task by id.
pub fn resolve(task_id: &str) -> Result<&'static TaskDefinition, PdfChatError> {
    CATALOG
        .iter()
        .find(|t| t.id == task_id)
        .ok_or_else(|| PdfChatError::UnknownTask {
            id: task_id.to_string(),
        })
}
