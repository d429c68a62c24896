pub mod error;
pub mod export;
pub mod history;
pub mod rules;
pub mod settings;
pub mod syntax;
pub mod templates;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use error::CoreError;
pub use history::{HistoryEntry, SessionHistory};
pub use settings::AiSettings;
pub use syntax::{RepairOutcome, SyntaxIssue, ValidationStatus};

// --- Categories ---

/// The fixed set of diagram types the generator supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
pub enum DiagramCategory {
    #[serde(rename = "flowchart")]
    Flowchart,
    #[serde(rename = "sequenceDiagram")]
    Sequence,
    #[serde(rename = "classDiagram")]
    Class,
    #[serde(rename = "erDiagram")]
    EntityRelationship,
    #[serde(rename = "stateDiagram")]
    State,
    #[serde(rename = "gantt")]
    Gantt,
    #[serde(rename = "journey")]
    Journey,
    #[serde(rename = "pie")]
    Pie,
    #[serde(rename = "mindmap")]
    Mindmap,
    #[serde(rename = "gitgraph")]
    GitGraph,
}

impl DiagramCategory {
    pub const ALL: [DiagramCategory; 10] = [
        DiagramCategory::Flowchart,
        DiagramCategory::Sequence,
        DiagramCategory::Class,
        DiagramCategory::EntityRelationship,
        DiagramCategory::State,
        DiagramCategory::Gantt,
        DiagramCategory::Journey,
        DiagramCategory::Pie,
        DiagramCategory::Mindmap,
        DiagramCategory::GitGraph,
    ];

    /// Wire label, identical to the serde representation.
    pub fn label(self) -> &'static str {
        match self {
            DiagramCategory::Flowchart => "flowchart",
            DiagramCategory::Sequence => "sequenceDiagram",
            DiagramCategory::Class => "classDiagram",
            DiagramCategory::EntityRelationship => "erDiagram",
            DiagramCategory::State => "stateDiagram",
            DiagramCategory::Gantt => "gantt",
            DiagramCategory::Journey => "journey",
            DiagramCategory::Pie => "pie",
            DiagramCategory::Mindmap => "mindmap",
            DiagramCategory::GitGraph => "gitgraph",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            DiagramCategory::Flowchart => "Flowchart",
            DiagramCategory::Sequence => "Sequence Diagram",
            DiagramCategory::Class => "Class Diagram",
            DiagramCategory::EntityRelationship => "ER Diagram",
            DiagramCategory::State => "State Diagram",
            DiagramCategory::Gantt => "Gantt Chart",
            DiagramCategory::Journey => "User Journey",
            DiagramCategory::Pie => "Pie Chart",
            DiagramCategory::Mindmap => "Mindmap",
            DiagramCategory::GitGraph => "Git Graph",
        }
    }

    /// One-line description of what the category is good at. Fed to the suggestion prompt.
    pub fn best_for(self) -> &'static str {
        match self {
            DiagramCategory::Flowchart => "process flows, decision trees, workflows",
            DiagramCategory::Sequence => "interactions over time, API calls, message exchanges",
            DiagramCategory::Class => "object-oriented design, data structures, system components",
            DiagramCategory::EntityRelationship => "database design, entity relationships, data modeling",
            DiagramCategory::State => "state machines, lifecycles, status transitions",
            DiagramCategory::Gantt => "project timelines, scheduling, task dependencies",
            DiagramCategory::Journey => "user experience, customer journeys, satisfaction per step",
            DiagramCategory::Pie => "proportions, distributions, simple statistics",
            DiagramCategory::Mindmap => "brainstorming, concept maps, hierarchical topics",
            DiagramCategory::GitGraph => "version control workflows, branching strategies",
        }
    }

    /// Lenient lookup used on LLM output and tool parameters.
    /// Matches labels case-insensitively and accepts common aliases.
    pub fn from_label(s: &str) -> Option<Self> {
        let key: String = s
            .trim()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match key.as_str() {
            "flowchart" | "flow" | "graph" | "flowdiagram" => Some(DiagramCategory::Flowchart),
            "sequencediagram" | "sequence" => Some(DiagramCategory::Sequence),
            "classdiagram" | "classdiagramv2" | "class" => Some(DiagramCategory::Class),
            "erdiagram" | "er" | "entityrelationship" | "entityrelationshipdiagram" => {
                Some(DiagramCategory::EntityRelationship)
            }
            "statediagram" | "statediagramv2" | "state" | "statemachine" => {
                Some(DiagramCategory::State)
            }
            "gantt" | "ganttchart" => Some(DiagramCategory::Gantt),
            "journey" | "userjourney" | "customerjourney" => Some(DiagramCategory::Journey),
            "pie" | "piechart" => Some(DiagramCategory::Pie),
            "mindmap" => Some(DiagramCategory::Mindmap),
            "gitgraph" | "git" => Some(DiagramCategory::GitGraph),
            _ => None,
        }
    }
}

impl fmt::Display for DiagramCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for DiagramCategory {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DiagramCategory::from_label(s).ok_or_else(|| CoreError::UnknownCategory(s.to_string()))
    }
}

// --- Pipeline records ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DiagramRequest {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<DiagramCategory>,
}

impl DiagramRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            category: None,
        }
    }

    pub fn with_category(mut self, category: DiagramCategory) -> Self {
        self.category = Some(category);
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    Medium,
    Complex,
}

impl Complexity {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simple" | "low" | "basic" => Some(Complexity::Simple),
            "medium" | "moderate" | "intermediate" => Some(Complexity::Medium),
            "complex" | "high" | "advanced" => Some(Complexity::Complex),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" | "strong" => Some(Confidence::High),
            "medium" | "moderate" => Some(Confidence::Medium),
            "low" | "weak" => Some(Confidence::Low),
            _ => None,
        }
    }
}

/// Attributes extracted from the user's free text by the first pipeline step.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IntentAnalysis {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_intent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity: Option<Complexity>,
    #[serde(default)]
    pub entities: Vec<String>,
    #[serde(default)]
    pub relationships: Vec<String>,
    #[serde(default)]
    pub temporal: bool,
    #[serde(default)]
    pub hierarchical: bool,
    #[serde(default)]
    pub data_visualization: bool,
    #[serde(default)]
    pub process_flow: bool,
    #[serde(default)]
    pub system_design: bool,
}

impl IntentAnalysis {
    /// Substitute used when the analysis call fails.
    pub fn fallback() -> Self {
        Self {
            primary_intent: Some("Create a diagram".to_string()),
            domain: Some("general".to_string()),
            complexity: Some(Complexity::Medium),
            process_flow: true,
            ..Default::default()
        }
    }

    /// Compact text form interpolated into later prompts.
    pub fn summary(&self) -> String {
        let mut out = String::with_capacity(256);
        if let Some(intent) = &self.primary_intent {
            out.push_str("intent: ");
            out.push_str(intent);
            out.push('\n');
        }
        if let Some(domain) = &self.domain {
            out.push_str("domain: ");
            out.push_str(domain);
            out.push('\n');
        }
        if let Some(c) = self.complexity {
            out.push_str("complexity: ");
            out.push_str(match c {
                Complexity::Simple => "simple",
                Complexity::Medium => "medium",
                Complexity::Complex => "complex",
            });
            out.push('\n');
        }
        if !self.entities.is_empty() {
            out.push_str("entities: ");
            out.push_str(&self.entities.join(", "));
            out.push('\n');
        }
        if !self.relationships.is_empty() {
            out.push_str("relationships: ");
            out.push_str(&self.relationships.join("; "));
            out.push('\n');
        }
        let aspects: Vec<&str> = [
            (self.temporal, "temporal"),
            (self.hierarchical, "hierarchical"),
            (self.data_visualization, "data visualization"),
            (self.process_flow, "process flow"),
            (self.system_design, "system design"),
        ]
        .into_iter()
        .filter_map(|(on, name)| on.then_some(name))
        .collect();
        if !aspects.is_empty() {
            out.push_str("aspects: ");
            out.push_str(&aspects.join(", "));
            out.push('\n');
        }
        out
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DiagramSuggestion {
    pub category: DiagramCategory,
    pub title: String,
    #[serde(default)]
    pub rationale: String,
    #[serde(default)]
    pub use_case: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity: Option<Complexity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Confidence>,
}

impl DiagramSuggestion {
    /// Substitute used when the suggestion call fails.
    pub fn fallback() -> Self {
        Self {
            category: DiagramCategory::Flowchart,
            title: "Simple Flowchart".to_string(),
            rationale: "A basic flowchart to visualize your process".to_string(),
            use_case: "General purpose process visualization".to_string(),
            complexity: Some(Complexity::Simple),
            confidence: Some(Confidence::Low),
        }
    }
}

/// Where the diagram text in a [`GeneratedDiagram`] came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DiagramOrigin {
    Model,
    Repaired,
    Fallback,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedDiagram {
    pub category: DiagramCategory,
    pub code: String,
    pub validation: ValidationStatus,
    pub origin: DiagramOrigin,
}

impl GeneratedDiagram {
    /// Category-specific skeleton for when generation fails.
    pub fn fallback(category: DiagramCategory, user_text: &str) -> Self {
        let code = templates::fallback_diagram(category, user_text);
        let validation = syntax::validate(&code, category);
        Self {
            category,
            code,
            validation,
            origin: DiagramOrigin::Fallback,
        }
    }

    /// Run local repair over model output and record the result.
    pub fn from_model_output(category: DiagramCategory, code: &str) -> Self {
        let outcome = syntax::check_and_repair(code, category);
        Self {
            category,
            origin: if outcome.changed {
                DiagramOrigin::Repaired
            } else {
                DiagramOrigin::Model
            },
            code: outcome.code,
            validation: outcome.status,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.validation.valid
    }
}

/// Starter prompt shown before the user has typed anything.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DiagramIdea {
    pub title: String,
    pub description: String,
    pub example_input: String,
    pub category: DiagramCategory,
    #[serde(default)]
    pub domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity: Option<Complexity>,
}
