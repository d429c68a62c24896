/// Mermaid authoring rules. Shared by the generation prompts and the MCP server instructions.
pub const RULES: &str = "\
1. The first line declares the diagram type and nothing else: `flowchart TD`, `sequenceDiagram`, \
`classDiagram`, `erDiagram`, `stateDiagram-v2`, `gantt`, `journey`, `pie title \"...\"`, `mindmap`, \
`gitGraph`. Do not wrap the code in Markdown fences and do not add prose before or after it.\n\
2. Use SINGLE curly braces { } everywhere. Doubled braces {{ }} are a templating artifact, not Mermaid.\n\
3. Flowchart arrows are `-->` (solid), `-.->` (dotted) and `==>` (thick), with spaces around them. \
`->` is not a flowchart arrow. Edge labels go between pipes: `A -->|\"label\"| B`.\n\
4. Sequence messages use `->>` (solid) and `-->>` (reply). Activation is `activate X` / `deactivate X`.\n\
5. ER relationships use cardinality markers on both ends, e.g. `||--o{`, `}o--||`, `||--||`, `}o--o{`, \
followed by `: \"label\"`. Attributes are `type name [PK|FK|UK]`, one per line inside the entity braces.\n\
6. Every opening bracket has a matching closing bracket and every double quote is closed on the same \
line. Put labels that contain brackets, colons or punctuation inside double quotes.\n\
7. Node IDs are short and unique (A, B, C or snake_case). The readable text lives in the label.\n\
8. Keep diagrams readable: at most 15 flowchart nodes, 8 sequence participants, 6 entities or classes, \
10 states, 15 Gantt tasks, 8 pie slices, 20 mindmap nodes, 15 commits.\n\
9. Gantt charts declare `dateFormat YYYY-MM-DD`, group tasks in sections and reference dependencies \
with `after <taskId>`.\n\
10. Journey tasks are `Task name: <score 1-5>: Actor`. Pie slices are `\"Label\" : value`.";
