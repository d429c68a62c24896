use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

use mermaider_core::{
    syntax, Complexity, Confidence, DiagramCategory, DiagramIdea, DiagramSuggestion, IntentAnalysis,
};

use crate::error::SuggestError;

pub const MAX_IDEAS: usize = 6;

#[derive(Deserialize)]
struct LlmSuggestion {
    #[serde(rename = "type", alias = "diagram_type", alias = "category")]
    kind: String,
    #[serde(default)]
    title: String,
    #[serde(default, alias = "rationale")]
    description: String,
    #[serde(default, alias = "useCase")]
    use_case: String,
    complexity: Option<String>,
    confidence: Option<String>,
}

#[derive(Deserialize)]
struct LlmIdea {
    title: String,
    #[serde(default)]
    description: String,
    #[serde(alias = "exampleInput")]
    example_input: String,
    #[serde(alias = "type", alias = "diagramType")]
    diagram_type: String,
    #[serde(default, alias = "category")]
    domain: String,
    complexity: Option<String>,
}

/// Extract the JSON array substring from raw LLM output.
pub fn extract_json_array(raw: &str) -> Option<&str> {
    let start = raw.find('[')?;
    let end = raw.rfind(']')?;
    if end <= start {
        return None;
    }
    Some(&raw[start..=end])
}

/// Extract the outermost JSON object substring from raw LLM output.
pub fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(&raw[start..=end])
}

/// Parse a JSON array of objects, falling back to picking out each balanced
/// object when the array as a whole is malformed.
fn parse_object_array<T: DeserializeOwned>(json_str: &str) -> Vec<T> {
    match serde_json::from_str::<Vec<Value>>(json_str) {
        Ok(items) => items
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect(),
        Err(_) => parse_line_by_line(json_str),
    }
}

/// Try to parse individual objects from a malformed JSON array.
fn parse_line_by_line<T: DeserializeOwned>(json_str: &str) -> Vec<T> {
    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut start = None;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in json_str.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start.take() {
                        if let Ok(item) = serde_json::from_str::<T>(&json_str[s..=i]) {
                            items.push(item);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    items
}

/// Booleans sometimes come back as "true"/"yes" strings.
fn flag(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => {
            matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "yes" | "y" | "1")
        }
        Some(Value::Number(n)) => n.as_i64().is_some_and(|n| n != 0),
        _ => false,
    }
}

fn text(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

fn list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Object(_) => Some(v.to_string()),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => vec![],
    }
}

fn field<'a>(obj: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names.iter().find_map(|n| obj.get(*n))
}

/// Read the intent analysis object. Missing keys default; anything that is
/// not a JSON object is an error.
pub fn parse_intent(raw: &str) -> Result<IntentAnalysis, SuggestError> {
    let json_str = extract_json_object(raw)
        .ok_or_else(|| SuggestError::Parse("no JSON object in intent analysis".to_string()))?;
    let value: Value =
        serde_json::from_str(json_str).map_err(|e| SuggestError::Parse(e.to_string()))?;
    let obj = value
        .as_object()
        .ok_or_else(|| SuggestError::Parse("intent analysis is not an object".to_string()))?;

    Ok(IntentAnalysis {
        primary_intent: text(field(obj, &["primary_intent", "primaryIntent"])),
        domain: text(field(obj, &["domain"])),
        complexity: text(field(obj, &["complexity"])).and_then(|s| Complexity::parse(&s)),
        entities: list(field(obj, &["entities"])),
        relationships: list(field(obj, &["relationships"])),
        temporal: flag(field(obj, &["temporal_aspect", "temporal"])),
        hierarchical: flag(field(obj, &["hierarchical_aspect", "hierarchical"])),
        data_visualization: flag(field(obj, &["data_visualization", "dataVisualization"])),
        process_flow: flag(field(obj, &["process_flow", "processFlow"])),
        system_design: flag(field(obj, &["system_design", "systemDesign"])),
    })
}

/// Ranked suggestions restricted to the supported categories, one per
/// category. Empty when nothing usable came back.
pub fn parse_suggestions(raw: &str) -> Vec<DiagramSuggestion> {
    let json_str = match extract_json_array(raw) {
        Some(s) => s,
        None => return vec![],
    };

    let mut out: Vec<DiagramSuggestion> = Vec::new();
    for s in parse_object_array::<LlmSuggestion>(json_str) {
        let Some(category) = DiagramCategory::from_label(&s.kind) else {
            continue;
        };
        if out.iter().any(|o| o.category == category) {
            continue;
        }
        let title = match s.title.trim() {
            "" => category.title().to_string(),
            t => t.to_string(),
        };
        out.push(DiagramSuggestion {
            category,
            title,
            rationale: s.description.trim().to_string(),
            use_case: s.use_case.trim().to_string(),
            complexity: s.complexity.as_deref().and_then(Complexity::parse),
            confidence: s.confidence.as_deref().and_then(Confidence::parse),
        });
    }
    out
}

/// Follow-up ideas as plain strings. Accepts a JSON array of strings (or of
/// objects carrying the text), otherwise a bulleted or numbered list.
pub fn parse_recommendations(raw: &str) -> Vec<String> {
    if let Some(json_str) = extract_json_array(raw) {
        if let Ok(items) = serde_json::from_str::<Vec<Value>>(json_str) {
            return items
                .iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s.trim().to_string()),
                    Value::Object(obj) => {
                        text(field(obj, &["recommendation", "text", "description", "title"]))
                    }
                    _ => None,
                })
                .filter(|s| !s.is_empty())
                .collect();
        }
    }

    raw.lines()
        .filter_map(|line| {
            let line = line.trim();
            let rest = line
                .strip_prefix("- ")
                .or_else(|| line.strip_prefix("* "))
                .or_else(|| {
                    let digits = line.find(|c: char| !c.is_ascii_digit())?;
                    if digits == 0 {
                        return None;
                    }
                    line[digits..]
                        .strip_prefix(". ")
                        .or_else(|| line[digits..].strip_prefix(") "))
                })?;
            let rest = rest.trim();
            (!rest.is_empty()).then(|| rest.to_string())
        })
        .collect()
}

/// Up to [`MAX_IDEAS`] starter ideas with a supported diagram type.
pub fn parse_ideas(raw: &str) -> Vec<DiagramIdea> {
    let json_str = match extract_json_array(raw) {
        Some(s) => s,
        None => return vec![],
    };

    parse_object_array::<LlmIdea>(json_str)
        .into_iter()
        .filter_map(|idea| {
            let category = DiagramCategory::from_label(&idea.diagram_type)?;
            let example_input = idea.example_input.trim().to_string();
            if idea.title.trim().is_empty() || example_input.is_empty() {
                return None;
            }
            Some(DiagramIdea {
                title: idea.title.trim().to_string(),
                description: idea.description.trim().to_string(),
                example_input,
                category,
                domain: idea.domain.trim().to_ascii_lowercase(),
                complexity: idea.complexity.as_deref().and_then(Complexity::parse),
            })
        })
        .take(MAX_IDEAS)
        .collect()
}

fn is_language_tag(first_line: &str) -> bool {
    first_line
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-')
        && !syntax::is_header_keyword(first_line)
}

/// Diagram code from a completion: the body of the first fenced block if
/// there is one (language tag dropped), otherwise the whole text. A fence
/// opened directly with a diagram keyword (` ```gantt `) keeps that keyword.
pub fn extract_diagram_code(raw: &str) -> String {
    let Some(open) = raw.find("```") else {
        return raw.trim().to_string();
    };
    let after = &raw[open + 3..];
    let body = match after.find('\n') {
        Some(nl) if is_language_tag(after[..nl].trim()) => &after[nl + 1..],
        _ => after,
    };
    let body = match body.find("```") {
        Some(close) => &body[..close],
        None => body,
    };
    body.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_accepts_string_booleans_and_fences() {
        let raw = r#"Here you go:
```json
{
  "primary_intent": "show the checkout process",
  "domain": "business",
  "complexity": "Medium",
  "entities": ["Customer", "Cart", "Payment"],
  "relationships": "customer pays",
  "temporal_aspect": "true",
  "hierarchical_aspect": false,
  "data_visualization": "false",
  "process_flow": true,
  "system_design": "no"
}
```"#;
        let a = parse_intent(raw).unwrap();
        assert_eq!(a.primary_intent.as_deref(), Some("show the checkout process"));
        assert_eq!(a.complexity, Some(Complexity::Medium));
        assert_eq!(a.entities, vec!["Customer", "Cart", "Payment"]);
        assert_eq!(a.relationships, vec!["customer pays"]);
        assert!(a.temporal && a.process_flow);
        assert!(!a.hierarchical && !a.data_visualization && !a.system_design);
    }

    #[test]
    fn intent_without_object_is_an_error() {
        assert!(matches!(parse_intent("sorry, no"), Err(SuggestError::Parse(_))));
        assert!(parse_intent("{ not json }").is_err());
    }

    #[test]
    fn suggestions_keep_only_known_categories_once() {
        let raw = r#"[
            {"type": "sequenceDiagram", "title": "Login exchange", "description": "calls over time", "use_case": "auth", "complexity": "simple", "confidence": "high"},
            {"type": "quadrantChart", "title": "Nope"},
            {"type": "sequence", "title": "Duplicate"},
            {"type": "erDiagram", "title": ""}
        ]"#;
        let s = parse_suggestions(raw);
        assert_eq!(s.len(), 2);
        assert_eq!(s[0].category, DiagramCategory::Sequence);
        assert_eq!(s[0].title, "Login exchange");
        assert_eq!(s[0].confidence, Some(Confidence::High));
        assert_eq!(s[1].category, DiagramCategory::EntityRelationship);
        assert_eq!(s[1].title, DiagramCategory::EntityRelationship.title());
    }

    #[test]
    fn malformed_array_is_recovered_object_by_object() {
        let raw = r#"[
            {"type": "gantt", "title": "Plan {phase 1}"},
            {"type": "pie", "title": "broken",,},
            {"type": "mindmap", "title": "Topics"}
        "#;
        // No closing bracket at all: nothing to extract.
        assert!(parse_suggestions(raw).is_empty());

        let raw = format!("{raw}]");
        let s = parse_suggestions(&raw);
        let cats: Vec<_> = s.iter().map(|s| s.category).collect();
        assert_eq!(cats, vec![DiagramCategory::Gantt, DiagramCategory::Mindmap]);
        assert_eq!(s[0].title, "Plan {phase 1}");
    }

    #[test]
    fn recommendations_from_json_or_list() {
        assert_eq!(
            parse_recommendations(r#"["Add a sequence diagram", " ", {"recommendation": "Model the data"}]"#),
            vec!["Add a sequence diagram", "Model the data"]
        );
        assert_eq!(
            parse_recommendations("Ideas:\n1. Add swimlanes\n2) Split by team\n- Show errors\nplain prose"),
            vec!["Add swimlanes", "Split by team", "Show errors"]
        );
        assert!(parse_recommendations("nothing useful").is_empty());
    }

    #[test]
    fn ideas_are_filtered_and_capped() {
        let mut items: Vec<String> = (0..8)
            .map(|i| {
                format!(
                    r#"{{"title": "Idea {i}", "description": "d", "example_input": "input {i}", "diagram_type": "flowchart", "domain": "Business"}}"#
                )
            })
            .collect();
        items.insert(
            0,
            r#"{"title": "Bad", "example_input": "x", "diagram_type": "sankey"}"#.to_string(),
        );
        let raw = format!("[{}]", items.join(","));
        let ideas = parse_ideas(&raw);
        assert_eq!(ideas.len(), MAX_IDEAS);
        assert_eq!(ideas[0].title, "Idea 0");
        assert_eq!(ideas[0].domain, "business");
    }

    #[test]
    fn diagram_code_is_unfenced() {
        assert_eq!(
            extract_diagram_code("Sure!\n```mermaid\nflowchart TD\n    A --> B\n```\nEnjoy."),
            "flowchart TD\n    A --> B"
        );
        assert_eq!(extract_diagram_code("```\npie\n    \"A\" : 1\n```"), "pie\n    \"A\" : 1");
        assert_eq!(extract_diagram_code("  gantt\n    title T  "), "gantt\n    title T");
        assert_eq!(extract_diagram_code("```\n```"), "");
        assert_eq!(extract_diagram_code("```mermaid\nmindmap\n  root((X))"), "mindmap\n  root((X))");
        assert_eq!(extract_diagram_code("```gantt\n    title T\n```"), "gantt\n    title T");
        assert_eq!(
            extract_diagram_code("```erDiagram\n    A ||--o{ B : has\n```"),
            "erDiagram\n    A ||--o{ B : has"
        );
    }
}
