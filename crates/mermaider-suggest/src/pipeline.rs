use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use mermaider_core::syntax::check_and_repair;
use mermaider_core::{
    AiSettings, Complexity, DiagramCategory, DiagramIdea, DiagramRequest, DiagramSuggestion,
    GeneratedDiagram, IntentAnalysis, ValidationStatus,
};

use crate::engine::{ChatBackend, LlmBackend};
use crate::error::SuggestError;
use crate::{parse, prompt};

pub const FALLBACK_RECOMMENDATIONS: [&str; 3] = [
    "Try creating a sequence diagram to show interactions over time",
    "Consider a class diagram if you're working with object-oriented concepts",
    "A Gantt chart might be useful for project timeline visualization",
];

/// Starter ideas used when the model cannot come up with its own.
pub fn fallback_ideas() -> Vec<DiagramIdea> {
    let idea = |title: &str,
                description: &str,
                example_input: &str,
                category: DiagramCategory,
                domain: &str,
                complexity: Complexity| DiagramIdea {
        title: title.to_string(),
        description: description.to_string(),
        example_input: example_input.to_string(),
        category,
        domain: domain.to_string(),
        complexity: Some(complexity),
    };
    vec![
        idea(
            "E-commerce Order Flow",
            "Visualize the complete customer order process from cart to delivery",
            "Show me the process when a customer places an order online, including payment processing, inventory check, and shipping",
            DiagramCategory::Flowchart,
            "business",
            Complexity::Medium,
        ),
        idea(
            "API Authentication Sequence",
            "Map out how users authenticate with your REST API",
            "Create a sequence diagram showing OAuth 2.0 authentication flow between client, auth server, and resource server",
            DiagramCategory::Sequence,
            "technical",
            Complexity::Medium,
        ),
        idea(
            "Mobile App Development Timeline",
            "Plan your app development project with milestones and deadlines",
            "Create a project timeline for developing a mobile app over 4 months including design, development, testing, and launch phases",
            DiagramCategory::Gantt,
            "business",
            Complexity::Simple,
        ),
        idea(
            "Database Schema Design",
            "Design relationships between entities in your database",
            "Design a database schema for a blog platform with users, posts, comments, and categories",
            DiagramCategory::EntityRelationship,
            "technical",
            Complexity::Medium,
        ),
        idea(
            "Customer Journey Map",
            "Understand your customer's experience from discovery to purchase",
            "Map the customer journey for someone discovering and buying products on our e-commerce website",
            DiagramCategory::Journey,
            "business",
            Complexity::Simple,
        ),
        idea(
            "Software Architecture Overview",
            "Visualize the components and relationships in your system",
            "Show the class structure for a social media application with users, posts, likes, and messaging features",
            DiagramCategory::Class,
            "technical",
            Complexity::Complex,
        ),
    ]
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    Analyze,
    Suggest,
    Generate,
    Recommend,
    Repair,
    Ideas,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Step::Analyze => "analyze",
            Step::Suggest => "suggest",
            Step::Generate => "generate",
            Step::Recommend => "recommend",
            Step::Repair => "repair",
            Step::Ideas => "ideas",
        })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StepOutcome {
    Model,
    Fallback,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StepReport {
    pub step: Step,
    pub outcome: StepOutcome,
    /// Failure reason on fallback, validation problem on accepted output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// A step's value together with how it was obtained.
#[derive(Debug, Clone)]
pub struct Stepped<T> {
    pub value: T,
    pub report: StepReport,
}

impl<T> Stepped<T> {
    pub fn fell_back(&self) -> bool {
        self.report.outcome == StepOutcome::Fallback
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRun {
    pub request: DiagramRequest,
    pub analysis: IntentAnalysis,
    pub suggestions: Vec<DiagramSuggestion>,
    pub diagram: GeneratedDiagram,
    pub recommendations: Vec<String>,
    pub steps: Vec<StepReport>,
}

impl PipelineRun {
    pub fn fell_back(&self, step: Step) -> bool {
        self.steps
            .iter()
            .any(|r| r.step == step && r.outcome == StepOutcome::Fallback)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RepairMethod {
    /// Already valid, nothing rewritten.
    Unchanged,
    Local,
    Model,
    /// Still invalid; the locally repaired text is returned.
    Unresolved,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairReport {
    pub code: String,
    pub status: ValidationStatus,
    pub initial: ValidationStatus,
    pub method: RepairMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

fn settle<T>(step: Step, result: Result<T, SuggestError>, fallback: impl FnOnce() -> T) -> Stepped<T> {
    match result {
        Ok(value) => {
            info!(%step, "model output accepted");
            Stepped {
                value,
                report: StepReport {
                    step,
                    outcome: StepOutcome::Model,
                    detail: None,
                },
            }
        }
        Err(e) => {
            warn!(%step, error = %e, "using fallback");
            Stepped {
                value: fallback(),
                report: StepReport {
                    step,
                    outcome: StepOutcome::Fallback,
                    detail: Some(e.to_string()),
                },
            }
        }
    }
}

/// Runs the four-step diagram pipeline against a chat backend. Every step
/// makes exactly one call and degrades to a fixed value on failure.
pub struct Pipeline<B> {
    backend: B,
    timeout: Duration,
    system: String,
}

/// Pipeline over a type-erased backend, for owners that pick the backend at runtime.
pub type SharedPipeline = Pipeline<Arc<dyn ChatBackend>>;

impl SharedPipeline {
    /// Pipeline backed by the configured `llm` provider.
    pub fn from_settings(settings: &AiSettings) -> Self {
        Self::new(
            Arc::new(LlmBackend::new(settings.clone())),
            Duration::from_secs(settings.timeout_secs),
        )
    }
}

impl<B: ChatBackend> Pipeline<B> {
    pub fn new(backend: B, timeout: Duration) -> Self {
        Self {
            backend,
            timeout,
            system: prompt::system_prompt(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    async fn ask(&self, user_msg: &str) -> Result<String, SuggestError> {
        match tokio::time::timeout(self.timeout, self.backend.complete(&self.system, user_msg)).await {
            Ok(result) => result,
            Err(_) => Err(SuggestError::Timeout(self.timeout)),
        }
    }

    pub async fn analyze(&self, text: &str) -> Stepped<IntentAnalysis> {
        let result = self
            .ask(&prompt::analyze_message(text))
            .await
            .and_then(|raw| parse::parse_intent(&raw));
        settle(Step::Analyze, result, IntentAnalysis::fallback)
    }

    pub async fn suggest(&self, analysis: &IntentAnalysis) -> Stepped<Vec<DiagramSuggestion>> {
        let result = self
            .ask(&prompt::suggest_message(analysis))
            .await
            .and_then(|raw| {
                let suggestions = parse::parse_suggestions(&raw);
                if suggestions.is_empty() {
                    Err(SuggestError::Parse(
                        "no suggestion with a supported diagram type".to_string(),
                    ))
                } else {
                    Ok(suggestions)
                }
            });
        settle(Step::Suggest, result, || vec![DiagramSuggestion::fallback()])
    }

    /// Generate markup for `category`. Output that fails validation after
    /// local repair is still returned, flagged invalid.
    pub async fn generate(
        &self,
        text: &str,
        category: DiagramCategory,
        analysis: &IntentAnalysis,
    ) -> Stepped<GeneratedDiagram> {
        let result = self
            .ask(&prompt::generate_message(category, text, analysis))
            .await
            .and_then(|raw| {
                let code = parse::extract_diagram_code(&raw);
                let diagram = GeneratedDiagram::from_model_output(category, &code);
                if diagram.code.trim().is_empty() {
                    Err(SuggestError::Parse("no diagram code in response".to_string()))
                } else {
                    Ok(diagram)
                }
            });
        let mut stepped = settle(Step::Generate, result, || {
            GeneratedDiagram::fallback(category, text)
        });
        if !stepped.fell_back() && !stepped.value.is_valid() {
            let problem = stepped.value.validation.describe(category);
            warn!(%category, %problem, "generated diagram is invalid");
            stepped.report.detail = Some(problem);
        }
        stepped
    }

    pub async fn recommend(
        &self,
        text: &str,
        category: DiagramCategory,
        analysis: &IntentAnalysis,
    ) -> Stepped<Vec<String>> {
        let result = self
            .ask(&prompt::recommend_message(category, text, analysis))
            .await
            .and_then(|raw| {
                let recs = parse::parse_recommendations(&raw);
                if recs.is_empty() {
                    Err(SuggestError::Parse("no recommendations in response".to_string()))
                } else {
                    Ok(recs)
                }
            });
        settle(Step::Recommend, result, || {
            FALLBACK_RECOMMENDATIONS.iter().map(|s| s.to_string()).collect()
        })
    }

    /// analyze → suggest → generate → recommend. Never fails.
    #[instrument(
        name = "pipeline",
        skip_all,
        fields(chars = request.text.chars().count(), selected = ?request.category)
    )]
    pub async fn run(&self, request: &DiagramRequest) -> PipelineRun {
        let Stepped {
            value: analysis,
            report: analyze_report,
        } = self.analyze(&request.text).await;

        let Stepped {
            value: suggestions,
            report: suggest_report,
        } = self.suggest(&analysis).await;

        let category = request
            .category
            .or_else(|| suggestions.first().map(|s| s.category))
            .unwrap_or(DiagramCategory::Flowchart);

        let Stepped {
            value: diagram,
            report: generate_report,
        } = self.generate(&request.text, category, &analysis).await;

        let Stepped {
            value: recommendations,
            report: recommend_report,
        } = self.recommend(&request.text, category, &analysis).await;

        let steps = vec![analyze_report, suggest_report, generate_report, recommend_report];
        let fallbacks = steps
            .iter()
            .filter(|r| r.outcome == StepOutcome::Fallback)
            .count();
        info!(%category, valid = diagram.is_valid(), fallbacks, "pipeline finished");

        PipelineRun {
            request: request.clone(),
            analysis,
            suggestions,
            diagram,
            recommendations,
            steps,
        }
    }

    /// Local repair first; one model "fix" call only if that is not enough.
    pub async fn repair_with_model(&self, code: &str, category: DiagramCategory) -> RepairReport {
        let local = check_and_repair(code, category);
        if local.status.valid {
            return RepairReport {
                method: if local.changed {
                    RepairMethod::Local
                } else {
                    RepairMethod::Unchanged
                },
                code: local.code,
                status: local.status,
                initial: local.initial,
                detail: None,
            };
        }

        let issue = local.status.describe(category);
        let fixed = self
            .ask(&prompt::fix_message(category, &issue, &local.code))
            .await
            .and_then(|raw| {
                let outcome = check_and_repair(&parse::extract_diagram_code(&raw), category);
                if outcome.status.valid {
                    Ok(outcome)
                } else {
                    Err(SuggestError::Parse(format!(
                        "model fix still invalid: {}",
                        outcome.status.describe(category)
                    )))
                }
            });

        match fixed {
            Ok(outcome) => {
                info!(step = %Step::Repair, %category, "model fix accepted");
                RepairReport {
                    code: outcome.code,
                    status: outcome.status,
                    initial: local.initial,
                    method: RepairMethod::Model,
                    detail: None,
                }
            }
            Err(e) => {
                warn!(step = %Step::Repair, %category, error = %e, "diagram left unresolved");
                RepairReport {
                    code: local.code,
                    status: local.status,
                    initial: local.initial,
                    method: RepairMethod::Unresolved,
                    detail: Some(e.to_string()),
                }
            }
        }
    }

    pub async fn diagram_ideas(&self) -> Stepped<Vec<DiagramIdea>> {
        let result = self.ask(&prompt::ideas_message()).await.and_then(|raw| {
            let ideas = parse::parse_ideas(&raw);
            if ideas.is_empty() {
                Err(SuggestError::Parse("no usable ideas in response".to_string()))
            } else {
                Ok(ideas)
            }
        });
        settle(Step::Ideas, result, fallback_ideas)
    }
}
