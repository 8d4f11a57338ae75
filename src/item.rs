//! The unit of work and the labels it gets sorted into.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A saved note or link, as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    pub details: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// When the message was sent in the source chat.
    pub sent_at: DateTime<Utc>,
    /// When the message was copied into the store.
    pub saved_at: DateTime<Utc>,
    /// The message carried binary media (photo, image). Never classified.
    #[serde(skip)]
    pub has_media: bool,
}

impl Item {
    /// The JSON shape the oracle sees. Media flags and ids stay out of it.
    pub fn to_prompt_json(&self) -> serde_json::Value {
        serde_json::json!({
            "date_saved": self.saved_at.to_rfc3339(),
            "date_detail": self.sent_at.to_rfc3339(),
            "details": self.details,
            "title": self.title,
            "description": self.description,
        })
    }
}

/// An item not yet in the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewItem {
    pub details: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub sent_at: DateTime<Utc>,
    pub has_media: bool,
}

impl NewItem {
    pub fn new(details: impl Into<String>) -> Self {
        Self {
            details: details.into(),
            title: None,
            description: None,
            sent_at: Utc::now(),
            has_media: false,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Previously used category labels, kept sorted for a stable prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategorySet(BTreeSet<String>);

impl CategorySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, label: &str) -> bool {
        self.0.insert(normalize_category(label))
    }

    pub fn contains(&self, label: &str) -> bool {
        self.0.contains(&normalize_category(label))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: AsRef<str>> FromIterator<S> for CategorySet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = Self::new();
        for label in iter {
            set.insert(label.as_ref());
        }
        set
    }
}

impl fmt::Display for CategorySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels: Vec<&str> = self.iter().collect();
        write!(f, "[{}]", labels.join(", "))
    }
}

/// Lower-case and turn hyphens into spaces, so "Machine-Learning" and
/// "machine learning" land in the same bucket.
pub fn normalize_category(label: &str) -> String {
    label.to_lowercase().replace('-', " ")
}

/// The fields written back to the store for a classified item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemUpdate {
    pub category: String,
    pub summary: String,
    pub reasoning: String,
    pub cost: f64,
    pub completed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_lowercases_and_replaces_hyphens() {
        assert_eq!(normalize_category("Machine-Learning"), "machine learning");
        assert_eq!(normalize_category("LLM"), "llm");
        assert_eq!(normalize_category("to-do list"), "to do list");
    }

    #[test]
    fn normalize_is_idempotent() {
        for label in ["LLM", "To-Do-List", "already normal", "", "Ünïcode-Ä", "--"] {
            let once = normalize_category(label);
            assert_eq!(normalize_category(&once), once);
        }
    }

    #[test]
    fn category_set_dedupes_after_normalizing() {
        let set: CategorySet = ["LLM", "llm", "Machine-Learning", "machine learning"]
            .into_iter()
            .collect();
        assert_eq!(set.len(), 2);
        assert!(set.contains("MACHINE-learning"));
    }

    #[test]
    fn category_set_displays_sorted() {
        let set: CategorySet = ["tutorial", "llm"].into_iter().collect();
        assert_eq!(set.to_string(), "[llm, tutorial]");
        assert_eq!(CategorySet::new().to_string(), "[]");
    }

    #[test]
    fn prompt_json_omits_media_flag() {
        let item = Item {
            id: 7,
            details: "https://a.example".to_string(),
            title: Some("X".to_string()),
            description: None,
            sent_at: Utc::now(),
            saved_at: Utc::now(),
            has_media: true,
        };
        let json = item.to_prompt_json();
        assert_eq!(json["details"], "https://a.example");
        assert_eq!(json["title"], "X");
        assert!(json["description"].is_null());
        assert!(json.get("has_media").is_none());
    }
}
