use serde::Deserialize;
use serde_json::{Map, Value};

/// Row operation carried by a change message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
    Other(String),
}

impl From<&str> for ChangeKind {
    fn from(raw: &str) -> Self {
        match raw.to_ascii_uppercase().as_str() {
            "INSERT" => ChangeKind::Insert,
            "UPDATE" => ChangeKind::Update,
            "DELETE" => ChangeKind::Delete,
            _ => ChangeKind::Other(raw.to_string()),
        }
    }
}

/// A canal change message. Only the fields the indexer acts on are kept.
#[derive(Debug, Clone, Deserialize)]
pub struct ChangeMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub database: String,
    #[serde(default)]
    pub table: String,
    #[serde(rename = "isDdl", default)]
    pub is_ddl: bool,
    /// Row images after the change (before it, for deletes).
    #[serde(default)]
    pub data: Option<Vec<Map<String, Value>>>,
}

impl ChangeMessage {
    pub fn parse(payload: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(payload)
    }

    pub fn change_kind(&self) -> ChangeKind {
        ChangeKind::from(self.kind.as_str())
    }

    pub fn rows(&self) -> &[Map<String, Value>] {
        self.data.as_deref().unwrap_or(&[])
    }
}

/// Document id for a row: its `id` column as text.
///
/// Canal renders numbers either as strings or as JSON numbers, possibly
/// floating point; both map to the same integer text.
pub fn document_id(row: &Map<String, Value>) -> Option<String> {
    match row.get("id")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i.to_string())
            } else if let Some(u) = n.as_u64() {
                Some(u.to_string())
            } else {
                n.as_f64().map(|f| format!("{:.0}", f))
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_canal_message() {
        let payload = br#"{
            "type": "INSERT",
            "database": "tiktok",
            "table": "video",
            "isDdl": false,
            "data": [{"id": "7", "title": "hello"}],
            "ts": 1700000000000
        }"#;

        let msg = ChangeMessage::parse(payload).unwrap();
        assert_eq!(msg.change_kind(), ChangeKind::Insert);
        assert_eq!(msg.table, "video");
        assert!(!msg.is_ddl);
        assert_eq!(msg.rows().len(), 1);
    }

    #[test]
    fn test_ddl_message_without_rows() {
        let payload = br#"{"type": "ALTER", "isDdl": true, "data": null}"#;

        let msg = ChangeMessage::parse(payload).unwrap();
        assert!(msg.is_ddl);
        assert!(msg.rows().is_empty());
        assert_eq!(msg.change_kind(), ChangeKind::Other("ALTER".to_string()));
    }

    #[test]
    fn test_document_id_forms() {
        let row = |id: Value| json!({ "id": id }).as_object().cloned().unwrap();

        assert_eq!(document_id(&row(json!("42"))), Some("42".to_string()));
        assert_eq!(document_id(&row(json!(42))), Some("42".to_string()));
        assert_eq!(document_id(&row(json!(42.0))), Some("42".to_string()));
        assert_eq!(document_id(&row(json!(""))), None);
        assert_eq!(document_id(&row(json!(null))), None);
        assert_eq!(document_id(&Map::new()), None);
    }
}
