use crate::DiagramCategory;

/// Minimal correct example for each category. Shown to the model as the
/// shape to imitate and returned by the `get_syntax` tool.
pub fn reference_syntax(category: DiagramCategory) -> &'static str {
    match category {
        DiagramCategory::Flowchart => "\
flowchart TD
    A[Start] --> B{Decision}
    B -->|Yes| C[Action 1]
    B -->|No| D[Action 2]
    C --> E[End]
    D --> E",
        DiagramCategory::Sequence => "\
sequenceDiagram
    participant A as User
    participant B as System
    A->>B: Request
    activate B
    B-->>A: Response
    deactivate B",
        DiagramCategory::Class => "\
classDiagram
    class Animal {
        +String name
        +int age
        +makeSound() String
    }
    class Dog {
        +String breed
        +bark() void
    }
    Animal <|-- Dog",
        DiagramCategory::EntityRelationship => "\
erDiagram
    CUSTOMER {
        int customer_id PK
        string name
        string email
    }
    ORDER {
        int order_id PK
        int customer_id FK
        date order_date
    }
    CUSTOMER ||--o{ ORDER : \"places\"",
        DiagramCategory::State => "\
stateDiagram-v2
    [*] --> Idle
    Idle --> Processing : start
    Processing --> Success : complete
    Processing --> Error : fail
    Success --> [*]
    Error --> Idle : retry
    Error --> [*] : abort",
        DiagramCategory::Gantt => "\
gantt
    title Project Timeline
    dateFormat YYYY-MM-DD
    section Planning
    Define Requirements : milestone, requirements, 2025-01-01, 0d
    Research Phase      : research, 2025-01-02, 5d
    section Development
    Setup Environment   : setup, after research, 2d
    Development         : dev, after setup, 10d
    Testing             : test, after dev, 3d",
        DiagramCategory::Journey => "\
journey
    title User Registration Journey
    section Discovery
      Visit Website: 3: User
      Browse Features: 4: User
    section Registration
      Click Sign Up: 5: User
      Fill Form: 2: User
    section Confirmation
      Receive Email: 5: User
      Verify Account: 5: User",
        DiagramCategory::Pie => "\
pie title \"Sample Data Distribution\"
    \"Category A\" : 45.0
    \"Category B\" : 30.0
    \"Category C\" : 15.0
    \"Category D\" : 10.0",
        DiagramCategory::Mindmap => "\
mindmap
  root((Main Topic))
    Branch 1
      Leaf 1a
      Leaf 1b
    Branch 2
      Leaf 2a
      Leaf 2b",
        DiagramCategory::GitGraph => "\
gitGraph
    commit id: \"Initial commit\"
    commit id: \"Add feature A\"
    branch feature-b
    checkout feature-b
    commit id: \"Start feature B\"
    checkout main
    merge feature-b
    commit id: \"Release v1.0\"",
    }
}

/// User text made safe to embed in a node label: no quotes, brackets or
/// line breaks, truncated on a char boundary.
fn label_snippet(text: &str, max_chars: usize) -> String {
    let cleaned: String = text
        .chars()
        .map(|c| match c {
            '"' => '\'',
            '\n' | '\r' | '\t' => ' ',
            c => c,
        })
        .filter(|c| !matches!(c, '(' | ')' | '[' | ']' | '{' | '}' | '%' | '`'))
        .collect();
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() > max_chars {
        let head: String = collapsed.chars().take(max_chars).collect();
        format!("{}...", head.trim_end())
    } else {
        collapsed
    }
}

/// Skeleton diagram used when the model cannot produce one. Always passes
/// [`crate::syntax::validate`] for its own category.
pub fn fallback_diagram(category: DiagramCategory, user_text: &str) -> String {
    match category {
        DiagramCategory::Flowchart => {
            let snippet = label_snippet(user_text, 30);
            let start = if snippet.is_empty() {
                "Start".to_string()
            } else {
                format!("Start: {}", snippet)
            };
            format!(
                "flowchart TD
    A[\"{start}\"] --> B[\"Process\"]
    B --> C{{\"Decision\"}}
    C -->|\"Yes\"| D[\"Success\"]
    C -->|\"No\"| E[\"Alternative\"]
    D --> F[\"End\"]
    E --> F"
            )
        }
        DiagramCategory::Sequence => "\
sequenceDiagram
    participant User
    participant System
    User->>System: Request
    System->>System: Process
    System-->>User: Response"
            .to_string(),
        DiagramCategory::EntityRelationship => "\
erDiagram
    ENTITY1 {
        int id PK
        string name
        datetime created_at
    }
    ENTITY2 {
        int id PK
        int entity1_id FK
        string description
    }
    ENTITY1 ||--o{ ENTITY2 : \"has\""
            .to_string(),
        DiagramCategory::Class => "\
classDiagram
    class MainClass {
        +int id
        +String name
        +process() void
    }
    class RelatedClass {
        +int id
        +int reference
        +getData() String
    }
    MainClass --> RelatedClass"
            .to_string(),
        DiagramCategory::Gantt => "\
gantt
    title Project Timeline
    dateFormat YYYY-MM-DD
    section Phase 1
    Planning : planning, 2025-01-01, 5d
    Design : design, after planning, 3d
    section Phase 2
    Implementation : impl, after design, 10d
    Testing : testing, after impl, 5d"
            .to_string(),
        DiagramCategory::State => "\
stateDiagram-v2
    [*] --> Initial
    Initial --> Processing : start
    Processing --> Success : complete
    Processing --> Error : fail
    Success --> [*]
    Error --> Initial : retry"
            .to_string(),
        DiagramCategory::Journey => "\
journey
    title User Journey
    section Discovery
      Find Service: 3: User
      Research Options: 4: User
    section Engagement
      Sign Up: 5: User
      Use Service: 4: User"
            .to_string(),
        DiagramCategory::Pie => "\
pie title \"Data Distribution\"
    \"Category A\" : 40
    \"Category B\" : 30
    \"Category C\" : 20
    \"Category D\" : 10"
            .to_string(),
        DiagramCategory::Mindmap => {
            let snippet = label_snippet(user_text, 20);
            let root = if snippet.is_empty() {
                "Main Topic".to_string()
            } else {
                snippet
            };
            format!(
                "mindmap
  root(({root}))
    Topic 1
      Subtopic A
      Subtopic B
    Topic 2
      Subtopic C
      Subtopic D"
            )
        }
        DiagramCategory::GitGraph => "\
gitGraph
    commit id: \"Initial commit\"
    branch feature
    checkout feature
    commit id: \"Add feature\"
    checkout main
    commit id: \"Update main\"
    merge feature"
            .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax;

    #[test]
    fn reference_examples_validate() {
        for cat in DiagramCategory::ALL {
            let status = syntax::validate(reference_syntax(cat), cat);
            assert!(status.valid, "{cat}: {:?}", status);
        }
    }

    #[test]
    fn fallback_embeds_a_sanitized_snippet() {
        let code = fallback_diagram(
            DiagramCategory::Flowchart,
            "Show the \"checkout\" flow {{with}} retries\nand (partial) refunds for orders",
        );
        assert!(code.contains("Start: Show the 'checkout' flow with..."));
        assert!(syntax::validate(&code, DiagramCategory::Flowchart).valid);

        let code = fallback_diagram(DiagramCategory::Mindmap, "");
        assert!(code.contains("root((Main Topic))"));
    }

    #[test]
    fn snippet_truncates_on_char_boundaries() {
        let s = label_snippet("ダイアグラムを作成してください、ユーザー登録の流れ", 5);
        assert_eq!(s, "ダイアグラ...");
    }

    #[test]
    fn fallback_ignores_user_text_where_the_skeleton_has_no_label() {
        let a = fallback_diagram(DiagramCategory::Pie, "one");
        let b = fallback_diagram(DiagramCategory::Pie, "two");
        assert_eq!(a, b);
    }
}
