//! Pattern-level validation and repair of Mermaid markup.
//!
//! This is not a Mermaid parser. It checks the handful of mistakes LLMs make
//! over and over (wrong header, doubled braces, broken arrows, stray quotes)
//! and rewrites the ones that can be fixed mechanically.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::DiagramCategory;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SyntaxIssue {
    Empty,
    MissingHeader,
    DoubledBraces,
    UnbalancedBrackets,
    UnmatchedQuotes,
}

impl fmt::Display for SyntaxIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SyntaxIssue::Empty => "diagram code is empty",
            SyntaxIssue::MissingHeader => "diagram does not start with the expected declaration",
            SyntaxIssue::DoubledBraces => "use single curly braces { } not double {{ }}",
            SyntaxIssue::UnbalancedBrackets => "unbalanced brackets in diagram",
            SyntaxIssue::UnmatchedQuotes => "unmatched double quotes in diagram",
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValidationStatus {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue: Option<SyntaxIssue>,
}

impl ValidationStatus {
    pub fn ok() -> Self {
        Self {
            valid: true,
            issue: None,
        }
    }

    pub fn failed(issue: SyntaxIssue) -> Self {
        Self {
            valid: false,
            issue: Some(issue),
        }
    }

    /// Human-readable one-liner, e.g. for tool output.
    pub fn describe(&self, category: DiagramCategory) -> String {
        match self.issue {
            None => "Valid syntax".to_string(),
            Some(SyntaxIssue::MissingHeader) => format!(
                "Diagram must start with the {} declaration (e.g. `{}`)",
                category,
                expected_header(category)
            ),
            Some(issue) => issue.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RepairOutcome {
    pub code: String,
    pub status: ValidationStatus,
    /// Whether any rule beyond whitespace normalization rewrote the text.
    pub changed: bool,
    /// Result of validating the input before any rule ran.
    pub initial: ValidationStatus,
}

// --- Patterns ---

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static pattern compiles")
}

static FLOWCHART_HEADER: Lazy<Regex> =
    Lazy::new(|| re(r"^(?:flowchart|graph)\s+(?:TD|TB|BT|LR|RL);?$"));
static SEQUENCE_HEADER: Lazy<Regex> = Lazy::new(|| re(r"^sequenceDiagram$"));
static CLASS_HEADER: Lazy<Regex> = Lazy::new(|| re(r"^classDiagram(?:-v2)?$"));
static ER_HEADER: Lazy<Regex> = Lazy::new(|| re(r"^erDiagram$"));
static STATE_HEADER: Lazy<Regex> = Lazy::new(|| re(r"^stateDiagram(?:-v2)?$"));
static GANTT_HEADER: Lazy<Regex> = Lazy::new(|| re(r"^gantt$"));
static JOURNEY_HEADER: Lazy<Regex> = Lazy::new(|| re(r"^journey$"));
static PIE_HEADER: Lazy<Regex> = Lazy::new(|| re(r"^pie(?:\s+showData)?(?:\s+title\s+.+)?$"));
static MINDMAP_HEADER: Lazy<Regex> = Lazy::new(|| re(r"^mindmap$"));
static GITGRAPH_HEADER: Lazy<Regex> =
    Lazy::new(|| re(r"^git[Gg]raph(?:\s+(?:LR|TB|BT))?:?$"));

/// ER cardinality markers such as `||--o{` contain braces that are not brackets.
static ER_CARDINALITY: Lazy<Regex> =
    Lazy::new(|| re(r"(?:\|o|\|\||\}o|\}\|)(?:--|\.\.)(?:o\||\|\||o\{|\|\{)"));
/// Flowchart asymmetric node `A>Text]` opens with `>` and closes with `]`.
static ASYMMETRIC_NODE: Lazy<Regex> =
    Lazy::new(|| re(r"(?m)(^|\s|\|)([A-Za-z0-9_]+)>([^\]\n]*)\]"));

static OPEN_BRACE_RUN: Lazy<Regex> = Lazy::new(|| re(r"\{\{+"));
static CLOSE_BRACE_RUN: Lazy<Regex> = Lazy::new(|| re(r"\}\}+"));
static LOOSE_ARROW: Lazy<Regex> = Lazy::new(|| re(r"[ \t]+->[ \t]+"));
static GLUED_ARROW_LEFT: Lazy<Regex> = Lazy::new(|| re(r"([\w\]\)\}])-->"));
static GLUED_ARROW_RIGHT: Lazy<Regex> = Lazy::new(|| re(r"-->(\w)"));

fn header_pattern(category: DiagramCategory) -> &'static Regex {
    match category {
        DiagramCategory::Flowchart => &FLOWCHART_HEADER,
        DiagramCategory::Sequence => &SEQUENCE_HEADER,
        DiagramCategory::Class => &CLASS_HEADER,
        DiagramCategory::EntityRelationship => &ER_HEADER,
        DiagramCategory::State => &STATE_HEADER,
        DiagramCategory::Gantt => &GANTT_HEADER,
        DiagramCategory::Journey => &JOURNEY_HEADER,
        DiagramCategory::Pie => &PIE_HEADER,
        DiagramCategory::Mindmap => &MINDMAP_HEADER,
        DiagramCategory::GitGraph => &GITGRAPH_HEADER,
    }
}

/// Canonical first line for a category.
pub fn expected_header(category: DiagramCategory) -> &'static str {
    match category {
        DiagramCategory::Flowchart => "flowchart TD",
        DiagramCategory::Sequence => "sequenceDiagram",
        DiagramCategory::Class => "classDiagram",
        DiagramCategory::EntityRelationship => "erDiagram",
        DiagramCategory::State => "stateDiagram-v2",
        DiagramCategory::Gantt => "gantt",
        DiagramCategory::Journey => "journey",
        DiagramCategory::Pie => "pie",
        DiagramCategory::Mindmap => "mindmap",
        DiagramCategory::GitGraph => "gitGraph",
    }
}

/// Leading keywords of every category's header. A first line starting with
/// one of these belongs to some diagram, just maybe not the requested one.
const HEADER_KEYWORDS: &[&str] = &[
    "flowchart",
    "graph",
    "sequencediagram",
    "classdiagram",
    "classdiagram-v2",
    "erdiagram",
    "statediagram",
    "statediagram-v2",
    "gantt",
    "journey",
    "pie",
    "mindmap",
    "gitgraph",
    "gitgraph:",
    "timeline",
    "quadrantchart",
    "xychart-beta",
    "sankey-beta",
    "requirementdiagram",
    "c4context",
    "block-beta",
];

/// Whether `word` opens some Mermaid diagram declaration, case-insensitively.
pub fn is_header_keyword(word: &str) -> bool {
    HEADER_KEYWORDS.contains(&word.to_ascii_lowercase().as_str())
}

/// Substrings that only show up in the body of a given category. Used to
/// decide whether headerless text is worth giving a header.
fn body_markers(category: DiagramCategory) -> &'static [&'static str] {
    match category {
        DiagramCategory::Flowchart => &["-->", "-.->", "==>"],
        DiagramCategory::Sequence => &["->>", "participant ", "actor "],
        DiagramCategory::Class => &["<|--", "class ", "*--", "o--"],
        DiagramCategory::EntityRelationship => &["||--", "}o--", "}|--", "|o--", " PK"],
        DiagramCategory::State => &["[*]"],
        DiagramCategory::Gantt => &["dateFormat", "section "],
        DiagramCategory::Journey => &["section "],
        DiagramCategory::Pie => &["\" :", "\":"],
        DiagramCategory::Mindmap => &["root(("],
        DiagramCategory::GitGraph => &["commit", "branch "],
    }
}

fn has_body_marker(code: &str, category: DiagramCategory) -> bool {
    body_markers(category).iter().any(|m| code.contains(m))
}

// --- Validation ---

/// Index and trimmed text of the first line that is not blank, a `%%` comment,
/// or part of a `---` front-matter block.
fn first_significant_line(code: &str) -> Option<(usize, &str)> {
    let mut in_front_matter = false;
    for (i, line) in code.lines().enumerate() {
        let t = line.trim();
        if t == "---" {
            in_front_matter = !in_front_matter;
            continue;
        }
        if in_front_matter || t.is_empty() || t.starts_with("%%") {
            continue;
        }
        return Some((i, t));
    }
    None
}

fn has_unbalanced_brackets(code: &str, category: DiagramCategory) -> bool {
    let neutral = match category {
        DiagramCategory::EntityRelationship => ER_CARDINALITY.replace_all(code, "--"),
        DiagramCategory::Flowchart => ASYMMETRIC_NODE.replace_all(code, "$1$2[$3]"),
        _ => std::borrow::Cow::Borrowed(code),
    };

    let mut stack: Vec<char> = Vec::new();
    let mut in_quote = false;
    for ch in neutral.chars() {
        if ch == '"' {
            in_quote = !in_quote;
            continue;
        }
        if in_quote {
            continue;
        }
        match ch {
            '(' | '[' | '{' => stack.push(ch),
            ')' | ']' | '}' => {
                let expected = match ch {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                if stack.pop() != Some(expected) {
                    return true;
                }
            }
            _ => {}
        }
    }
    !stack.is_empty()
}

/// Check markup against the category's required header and the common
/// structural mistakes. The first failing check wins.
pub fn validate(code: &str, category: DiagramCategory) -> ValidationStatus {
    let Some((_, header)) = first_significant_line(code) else {
        return ValidationStatus::failed(SyntaxIssue::Empty);
    };

    if !header_pattern(category).is_match(header) {
        return ValidationStatus::failed(SyntaxIssue::MissingHeader);
    }

    if code.contains("{{") || code.contains("}}") {
        return ValidationStatus::failed(SyntaxIssue::DoubledBraces);
    }

    if has_unbalanced_brackets(code, category) {
        return ValidationStatus::failed(SyntaxIssue::UnbalancedBrackets);
    }

    if code.matches('"').count() % 2 != 0 {
        return ValidationStatus::failed(SyntaxIssue::UnmatchedQuotes);
    }

    ValidationStatus::ok()
}

// --- Repair ---

/// Line endings, trailing whitespace, surrounding blank lines, code fences.
fn normalize_whitespace(code: &str) -> String {
    let unified = code.replace("\r\n", "\n").replace('\r', "\n");
    unified
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn replace_line(code: &str, index: usize, replacement: &str) -> String {
    code.lines()
        .enumerate()
        .map(|(i, line)| if i == index { replacement } else { line })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Fix the declaration line: wrong casing, bare `flowchart`/`graph`, or a
/// missing header when the body starts with no diagram keyword but does
/// contain this category's markers.
fn repair_header(code: &str, category: DiagramCategory) -> String {
    let Some((index, header)) = first_significant_line(code) else {
        return code.to_string();
    };
    if header_pattern(category).is_match(header) {
        return code.to_string();
    }

    let lower = header.trim_end_matches(';').to_ascii_lowercase();
    let first_word = lower.split_whitespace().next().unwrap_or("");

    if category == DiagramCategory::Flowchart && (lower == "flowchart" || lower == "graph") {
        return replace_line(code, index, "flowchart TD");
    }

    let canonical = expected_header(category);
    let bare_keyword = match category {
        DiagramCategory::Class | DiagramCategory::State => {
            let base = canonical.trim_end_matches("-v2").to_ascii_lowercase();
            lower == base || lower == format!("{base}-v2")
        }
        DiagramCategory::Flowchart | DiagramCategory::Pie => false,
        _ => lower == canonical.to_ascii_lowercase(),
    };
    if bare_keyword {
        return replace_line(code, index, canonical);
    }

    if !HEADER_KEYWORDS.contains(&first_word) && has_body_marker(code, category) {
        return format!("{}\n{}", canonical, code);
    }

    code.to_string()
}

/// Apply the ordered rewrite rules for a category. Never fails; rules that do
/// not apply leave the text alone. Applying it twice yields the same text.
pub fn repair(code: &str, category: DiagramCategory) -> String {
    let mut text = normalize_whitespace(code);
    if text.is_empty() {
        return text;
    }

    text = OPEN_BRACE_RUN.replace_all(&text, "{").into_owned();
    text = CLOSE_BRACE_RUN.replace_all(&text, "}").into_owned();

    if category == DiagramCategory::Flowchart {
        text = LOOSE_ARROW.replace_all(&text, " --> ").into_owned();
        text = GLUED_ARROW_LEFT.replace_all(&text, "$1 -->").into_owned();
        text = GLUED_ARROW_RIGHT.replace_all(&text, "--> $1").into_owned();
    }

    // Last, so the body markers it looks for are already canonical.
    repair_header(&text, category)
}

/// Validate, repair, and validate again.
pub fn check_and_repair(code: &str, category: DiagramCategory) -> RepairOutcome {
    let initial = validate(code, category);
    let repaired = repair(code, category);
    let status = validate(&repaired, category);
    RepairOutcome {
        changed: repaired != normalize_whitespace(code),
        code: repaired,
        status,
        initial,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates;

    fn doubled_brace_input(category: DiagramCategory) -> String {
        match category {
            DiagramCategory::Flowchart => {
                "flowchart TD\n    A[Start] --> B{{Ready?}}\n    B -->|Yes| C[Go]".to_string()
            }
            DiagramCategory::EntityRelationship => "erDiagram\n    CUSTOMER {{\n        int id PK\n    }}\n    ORDER {{\n        int id PK\n    }}\n    CUSTOMER ||--o{ ORDER : \"places\"".to_string(),
            DiagramCategory::Class => {
                "classDiagram\n    class Animal {{\n        +String name\n    }}".to_string()
            }
            DiagramCategory::State => "stateDiagram-v2\n    [*] --> Busy\n    state Busy {{\n        [*] --> Working\n    }}".to_string(),
            other => format!(
                "{}\n    %% generated {{{{draft}}}}",
                templates::reference_syntax(other)
            ),
        }
    }

    #[test]
    fn doubled_braces_are_collapsed_for_every_category() {
        for cat in DiagramCategory::ALL {
            let bad = doubled_brace_input(cat);
            assert_eq!(validate(&bad, cat).issue, Some(SyntaxIssue::DoubledBraces), "{cat}");

            let out = check_and_repair(&bad, cat);
            assert!(!out.code.contains("{{"), "{cat}: {}", out.code);
            assert!(!out.code.contains("}}"), "{cat}: {}", out.code);
            assert!(out.status.valid, "{cat}: {:?}\n{}", out.status, out.code);
            assert!(out.changed);
        }
    }

    #[test]
    fn repair_is_idempotent() {
        let samples = [
            (DiagramCategory::Flowchart, "graph\r\nA-->B-->C   \r\nB -> D\r\n"),
            (DiagramCategory::Flowchart, "```mermaid\nflowchart LR\n  A{{{x}}}-->B\n```"),
            (DiagramCategory::EntityRelationship, "ERDIAGRAM\n  A {{ int id }}\n  A ||--o{ B : has"),
            (DiagramCategory::Sequence, "participant A\nA->>B: hi"),
            (DiagramCategory::State, "statediagram-v2\n[*] --> A"),
            (DiagramCategory::Pie, "\"A\" : 1\n\"B\" : 2"),
            (DiagramCategory::GitGraph, "gitgraph\n  commit"),
            (DiagramCategory::Mindmap, ""),
            (DiagramCategory::Flowchart, "A -> B\nB -> C"),
            (DiagramCategory::Flowchart, "graph LR;\n  A -> B"),
        ];
        for (cat, input) in samples {
            let once = repair(input, cat);
            let twice = repair(&once, cat);
            assert_eq!(once, twice, "{cat}");
        }
    }

    #[test]
    fn flowchart_arrows_are_canonicalized() {
        let out = repair("flowchart TD\n    A -> B\n    B-->C-->D", DiagramCategory::Flowchart);
        assert_eq!(out, "flowchart TD\n    A --> B\n    B --> C --> D");
        // Labelled and dotted arrows survive untouched.
        let out = repair("flowchart TD\n    A -->|yes| B\n    B -.-> C", DiagramCategory::Flowchart);
        assert_eq!(out, "flowchart TD\n    A -->|yes| B\n    B -.-> C");
    }

    #[test]
    fn loose_arrows_alone_earn_a_flowchart_header() {
        let out = check_and_repair("A -> B\nB -> C", DiagramCategory::Flowchart);
        assert_eq!(out.code, "flowchart TD\nA --> B\nB --> C");
        assert!(out.status.valid);
        assert!(out.changed);
    }

    #[test]
    fn flowchart_header_may_end_with_semicolon() {
        for code in ["graph TD;\n    A --> B", "flowchart LR;\n    A --> B"] {
            assert!(validate(code, DiagramCategory::Flowchart).valid, "{code}");
        }
        let out = check_and_repair("graph;\n    A --> B", DiagramCategory::Flowchart);
        assert_eq!(out.code, "flowchart TD\n    A --> B");
        assert!(out.status.valid);
    }

    #[test]
    fn bare_flowchart_header_gets_a_direction() {
        let out = check_and_repair("graph\n    A --> B", DiagramCategory::Flowchart);
        assert_eq!(out.initial.issue, Some(SyntaxIssue::MissingHeader));
        assert!(out.code.starts_with("flowchart TD\n"));
        assert!(out.status.valid);
    }

    #[test]
    fn header_casing_is_fixed() {
        let out = check_and_repair("sequencediagram\n    A->>B: hi", DiagramCategory::Sequence);
        assert!(out.code.starts_with("sequenceDiagram\n"));
        assert!(out.status.valid);
    }

    #[test]
    fn missing_header_is_prepended_only_for_headerless_bodies() {
        let out = check_and_repair("\"Dogs\" : 40\n\"Cats\" : 60", DiagramCategory::Pie);
        assert!(out.code.starts_with("pie\n"));
        assert!(out.status.valid);

        // A sequence diagram handed in as a flowchart is left for the caller to judge.
        let seq = "sequenceDiagram\n    A->>B: hi";
        let out = check_and_repair(seq, DiagramCategory::Flowchart);
        assert_eq!(out.code, seq);
        assert!(!out.status.valid);
        assert_eq!(out.status.issue, Some(SyntaxIssue::MissingHeader));
    }

    #[test]
    fn prose_does_not_get_a_header() {
        let out = check_and_repair("I cannot draw that, sorry.", DiagramCategory::Flowchart);
        assert_eq!(out.code, "I cannot draw that, sorry.");
        assert_eq!(out.status.issue, Some(SyntaxIssue::MissingHeader));
    }

    #[test]
    fn header_keywords_match_any_case() {
        assert!(is_header_keyword("gantt"));
        assert!(is_header_keyword("sequenceDiagram"));
        assert!(is_header_keyword("stateDiagram-v2"));
        assert!(!is_header_keyword("mermaid"));
        assert!(!is_header_keyword(""));
    }

    #[test]
    fn er_cardinality_markers_are_not_brackets() {
        let code = "erDiagram\n    A ||--o{ B : has\n    B }o--|| C : uses\n    C |o..o| D : maybe";
        assert!(validate(code, DiagramCategory::EntityRelationship).valid);
    }

    #[test]
    fn asymmetric_flowchart_nodes_balance() {
        let code = "flowchart LR\n    A>Flag] --> B[x > y]";
        assert!(validate(code, DiagramCategory::Flowchart).valid);
    }

    #[test]
    fn brackets_inside_quotes_are_ignored() {
        let code = "flowchart TD\n    A[\"Start: (draft\"] --> B";
        assert!(validate(code, DiagramCategory::Flowchart).valid);
    }

    #[test]
    fn unresolved_issues_leave_flag_false() {
        let code = "flowchart TD\n    A[Start --> B";
        let out = check_and_repair(code, DiagramCategory::Flowchart);
        assert!(!out.status.valid);
        assert_eq!(out.status.issue, Some(SyntaxIssue::UnbalancedBrackets));
        assert_eq!(out.code, code);
        assert!(!out.changed);

        let out = check_and_repair("pie title \"Pets\n    \"Dogs\" : 1", DiagramCategory::Pie);
        assert_eq!(out.status.issue, Some(SyntaxIssue::UnmatchedQuotes));
    }

    #[test]
    fn empty_input_is_reported() {
        assert_eq!(validate("  \n %% only a comment\n", DiagramCategory::Gantt).issue, Some(SyntaxIssue::Empty));
        let out = check_and_repair("", DiagramCategory::Gantt);
        assert_eq!(out.code, "");
        assert!(!out.status.valid);
    }

    #[test]
    fn front_matter_and_comments_before_header_are_skipped() {
        let code = "---\ntitle: Orders\n---\n%% generated\nerDiagram\n    A ||--o{ B : has";
        assert!(validate(code, DiagramCategory::EntityRelationship).valid);
    }

    #[test]
    fn describe_names_the_expected_header() {
        let status = validate("mindmap\n  root((x))", DiagramCategory::Gantt);
        assert!(status.describe(DiagramCategory::Gantt).contains("`gantt`"));
        assert_eq!(ValidationStatus::ok().describe(DiagramCategory::Pie), "Valid syntax");
    }
}
