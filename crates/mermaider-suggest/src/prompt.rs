use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use mermaider_core::templates::reference_syntax;
use mermaider_core::{DiagramCategory, IntentAnalysis};

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([a-z_]+)\}").expect("placeholder regex"));

/// Prompt text with `{name}` placeholders.
#[derive(Debug, Clone, Copy)]
pub struct PromptTemplate(&'static str);

/// Named values substituted into a [`PromptTemplate`].
#[derive(Debug, Default)]
pub struct PromptVars<'a> {
    values: HashMap<&'static str, &'a str>,
}

impl<'a> PromptVars<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, name: &'static str, value: &'a str) -> Self {
        self.values.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&'a str> {
        self.values.get(name).copied()
    }
}

impl PromptTemplate {
    pub const fn new(text: &'static str) -> Self {
        Self(text)
    }

    /// Substitute every placeholder in one pass. Unknown names become empty,
    /// substituted values are never rescanned.
    pub fn render(&self, vars: &PromptVars<'_>) -> String {
        PLACEHOLDER
            .replace_all(self.0, |caps: &Captures| vars.get(&caps[1]).unwrap_or("").to_string())
            .into_owned()
    }
}

pub const ANALYZE_INTENT: PromptTemplate = PromptTemplate::new(
    "Analyze the user's description to understand what they want to visualize.

User input:
{user_input}

Return ONLY a JSON object with these keys:
- \"primary_intent\": what the user wants to visualize (process, data, relationships, ...)
- \"domain\": subject domain (business, technical, academic, ...)
- \"complexity\": \"simple\", \"medium\" or \"complex\"
- \"entities\": array of key entities, objects or components mentioned
- \"relationships\": array of relationships or interactions described
- \"temporal_aspect\": true if time sequences or schedules are involved
- \"hierarchical_aspect\": true if hierarchies or classifications are involved
- \"data_visualization\": true if this is mainly about numbers or proportions
- \"process_flow\": true if this describes a process or workflow
- \"system_design\": true if this describes system architecture or design

Extract concrete information from the description. Do not invent entities.",
);

pub const SUGGEST_DIAGRAMS: PromptTemplate = PromptTemplate::new(
    "Suggest the 3 or 4 Mermaid diagram types that best fit this analysis.

Intent analysis:
{intent_analysis}

Available diagram types (use the exact type identifier):
{categories}

Return ONLY a JSON array ranked by relevance. Each item:
{\"type\": \"<type identifier>\", \"title\": \"<title for this use case>\", \
\"description\": \"<why this type fits>\", \"use_case\": \"<concrete application>\", \
\"complexity\": \"simple|medium|complex\", \"confidence\": \"high|medium|low\"}",
);

pub const GENERATE_DIAGRAM: PromptTemplate = PromptTemplate::new(
    "Create a Mermaid {category} diagram for the user's description.

Syntax rules:
{syntax_rules}

Example of the expected shape:
{example}

User input:
{user_input}

Intent analysis:
{intent_analysis}

Output ONLY the Mermaid code. No Markdown fences, no explanation.",
);

pub const RECOMMEND: PromptTemplate = PromptTemplate::new(
    "The user described:
{user_input}

A {category} diagram was generated for it. Intent analysis:
{intent_analysis}

Suggest 3 to 5 follow-ups: complementary diagram types, other perspectives or \
levels of detail, aspects worth exploring next. Be concrete about the user's scenario.

Return ONLY a JSON array of strings.",
);

pub const FIX_DIAGRAM: PromptTemplate = PromptTemplate::new(
    "This Mermaid {category} diagram does not parse.

Problem:
{issue}

Diagram:
{code}

Return the corrected diagram. Keep its content and structure, change only what \
is needed to make it valid. Output ONLY the Mermaid code.",
);

pub const DIAGRAM_IDEAS: PromptTemplate = PromptTemplate::new(
    "Propose 6 diverse, practical diagram ideas to inspire a first-time user of a \
Mermaid diagram generator. Cover different diagram types and different domains \
(business, technical, educational, personal).

Available diagram types:
{categories}

Return ONLY a JSON array. Each item:
{\"title\": \"<short title>\", \"description\": \"<one sentence>\", \
\"example_input\": \"<a description the user could paste in>\", \
\"diagram_type\": \"<type identifier>\", \"domain\": \"business|technical|educational|personal\", \
\"complexity\": \"simple|medium|complex\"}",
);

pub fn system_prompt() -> String {
    format!(
        "You are a Mermaid diagram specialist. You turn plain-language descriptions of \
processes, systems, data, schedules and ideas into diagrams that render without errors.\n\n\
When asked for JSON, output only JSON. When asked for diagram code, output only Mermaid \
code that starts with the diagram declaration.\n\n\
## Mermaid Rules\n{}",
        mermaider_core::rules::RULES
    )
}

/// Bullet list of categories with their typical use, for the suggestion and
/// idea prompts.
pub fn category_list() -> String {
    DiagramCategory::ALL
        .iter()
        .map(|c| format!("- {}: {}", c.label(), c.best_for()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Category-specific authoring rules for the generation prompt.
pub fn syntax_rules(category: DiagramCategory) -> &'static str {
    match category {
        DiagramCategory::Flowchart => "\
1. Start with `flowchart TD` (or `flowchart LR` for left to right).
2. Shapes: A[Rectangle], A(Rounded), A{Decision}, A((Circle)), A([Stadium]).
3. Arrows: --> solid, -.-> dotted, ==> thick. Labels: A -->|\"label\"| B.
4. Diamonds for decisions, rectangles for steps, labelled decision arrows.
5. At most 15 nodes.",
        DiagramCategory::Sequence => "\
1. Start with `sequenceDiagram`.
2. Declare participants first: `participant A as Name` (or `actor`).
3. Messages: A->>B: text (request), B-->>A: text (reply).
4. Use `activate`/`deactivate`, `alt`/`else`/`end`, `loop`/`end`, `Note over A,B: text`.
5. At most 8 participants.",
        DiagramCategory::Class => "\
1. Start with `classDiagram`.
2. Members inside braces: `class Name {` then `+Type field` and `+method() Return`, closed by `}`.
3. Visibility: + public, - private, # protected.
4. Relations: <|-- inheritance, *-- composition, o-- aggregation, --> association.
5. At most 6 classes.",
        DiagramCategory::EntityRelationship => "\
1. Start with `erDiagram`.
2. Entities in UPPER_CASE with attributes `type name PK|FK|UK` inside braces.
3. Relations: ENTITY1 ||--o{ ENTITY2 : \"label\". Markers: || exactly one, o| zero or one, }o zero or more, }| one or more.
4. Always quote relationship labels.
5. At most 6 entities.",
        DiagramCategory::State => "\
1. Start with `stateDiagram-v2`.
2. [*] marks start and end states.
3. Transitions: StateA --> StateB : event.
4. Composite states: `state Name {` ... `}`. Choices: `state check <<choice>>`.
5. At most 10 states.",
        DiagramCategory::Gantt => "\
1. Start with `gantt`, then `title ...` and `dateFormat YYYY-MM-DD`.
2. Group tasks under `section Name`.
3. Tasks: `Task name : id, 2025-01-01, 5d` or `Task name : id, after otherId, 3d`.
4. Milestones: `Name : milestone, id, 2025-01-10, 0d`. Status tags: done, active, crit.
5. At most 15 tasks.",
        DiagramCategory::Journey => "\
1. Start with `journey`, then `title ...`.
2. Group steps under `section Name`.
3. Steps: `Step name: score: Actor1, Actor2` with score from 1 (bad) to 5 (great).
4. Keep step names short.",
        DiagramCategory::Pie => "\
1. Start with `pie title \"Title\"`.
2. Slices: `\"Label\" : value` with positive numbers.
3. Quote every label.
4. At most 8 slices.",
        DiagramCategory::Mindmap => "\
1. Start with `mindmap`.
2. One root: `root((Central Topic))`.
3. Hierarchy is expressed by indentation only, two spaces per level.
4. Shapes: [square], (rounded), ((circle)). Plain text is fine for leaves.
5. At most 20 nodes.",
        DiagramCategory::GitGraph => "\
1. Start with `gitGraph`.
2. Commands: `commit id: \"msg\"`, `branch name`, `checkout name`, `merge name`.
3. A branch must be created before it is checked out.
4. At most 15 commits.",
    }
}

pub fn analyze_message(user_input: &str) -> String {
    ANALYZE_INTENT.render(&PromptVars::new().set("user_input", user_input))
}

pub fn suggest_message(analysis: &IntentAnalysis) -> String {
    let summary = analysis.summary();
    let categories = category_list();
    SUGGEST_DIAGRAMS.render(
        &PromptVars::new()
            .set("intent_analysis", &summary)
            .set("categories", &categories),
    )
}

pub fn generate_message(
    category: DiagramCategory,
    user_input: &str,
    analysis: &IntentAnalysis,
) -> String {
    let summary = analysis.summary();
    GENERATE_DIAGRAM.render(
        &PromptVars::new()
            .set("category", category.label())
            .set("syntax_rules", syntax_rules(category))
            .set("example", reference_syntax(category))
            .set("user_input", user_input)
            .set("intent_analysis", &summary),
    )
}

pub fn recommend_message(
    category: DiagramCategory,
    user_input: &str,
    analysis: &IntentAnalysis,
) -> String {
    let summary = analysis.summary();
    RECOMMEND.render(
        &PromptVars::new()
            .set("user_input", user_input)
            .set("category", category.label())
            .set("intent_analysis", &summary),
    )
}

pub fn fix_message(category: DiagramCategory, issue: &str, code: &str) -> String {
    FIX_DIAGRAM.render(
        &PromptVars::new()
            .set("category", category.label())
            .set("issue", issue)
            .set("code", code),
    )
}

pub fn ideas_message() -> String {
    let categories = category_list();
    DIAGRAM_IDEAS.render(&PromptVars::new().set("categories", &categories))
}
