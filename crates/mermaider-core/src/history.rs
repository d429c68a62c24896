use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{DiagramCategory, DiagramRequest, GeneratedDiagram};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub recorded_at: DateTime<Utc>,
    pub request: DiagramRequest,
    pub category: DiagramCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_intent: Option<String>,
    pub suggestion_count: usize,
    pub valid: bool,
    pub code: String,
}

/// Append-only log of one session's interactions. Owned by the presentation
/// side; the pipeline never reads it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionHistory {
    entries: Vec<HistoryEntry>,
}

impl SessionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &mut self,
        request: &DiagramRequest,
        diagram: &GeneratedDiagram,
        primary_intent: Option<&str>,
        suggestion_count: usize,
    ) -> &HistoryEntry {
        self.entries.push(HistoryEntry {
            recorded_at: Utc::now(),
            request: request.clone(),
            category: diagram.category,
            primary_intent: primary_intent.map(str::to_string),
            suggestion_count,
            valid: diagram.is_valid(),
            code: diagram.code.clone(),
        });
        &self.entries[self.entries.len() - 1]
    }

    /// Oldest first.
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
