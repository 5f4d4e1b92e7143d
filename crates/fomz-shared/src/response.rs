use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::UserId;

/// A single answer value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Scalar {
    /// Key used when bucketing values into a distribution.
    pub fn key(&self) -> String {
        match self {
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => format_number(*n),
            Self::Text(s) => s.clone(),
        }
    }

    /// Numeric reading of the value; text is parsed leniently.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) if n.is_finite() => Some(*n),
            Self::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            _ => None,
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Self::Text(s) if s.trim().is_empty())
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<f64> for Scalar {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

/// An answer is either one scalar or a list of them (checkbox questions).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Answer {
    Many(Vec<Scalar>),
    One(Scalar),
}

impl Answer {
    /// Whether the answer carries any content at all.
    pub fn is_answered(&self) -> bool {
        match self {
            Self::Many(values) => values.iter().any(|v| !v.is_blank()),
            Self::One(value) => !value.is_blank(),
        }
    }

    /// Flattened view over the contained scalars.
    pub fn values(&self) -> Vec<&Scalar> {
        match self {
            Self::Many(values) => values.iter().collect(),
            Self::One(value) => vec![value],
        }
    }
}

impl From<&str> for Answer {
    fn from(s: &str) -> Self {
        Self::One(Scalar::from(s))
    }
}

impl From<f64> for Answer {
    fn from(n: f64) -> Self {
        Self::One(Scalar::Number(n))
    }
}

impl From<Vec<&str>> for Answer {
    fn from(values: Vec<&str>) -> Self {
        Self::Many(values.into_iter().map(Scalar::from).collect())
    }
}

/// Answers keyed by question id.
pub type Answers = BTreeMap<String, Answer>;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    #[serde(default)]
    pub user_agent: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migrated_from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_submitted_at: Option<DateTime<Utc>>,
}

impl ResponseMetadata {
    pub fn with_user_agent(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub id: String,
    /// Parent form id (cloud responses).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_id: Option<String>,
    /// Parent share token (local responses).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_id: Option<String>,
    #[serde(default)]
    pub answers: Answers,
    pub submitted_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitter_id: Option<UserId>,
    #[serde(default)]
    pub metadata: ResponseMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answers_deserialize_untagged() {
        let answers: Answers =
            serde_json::from_str(r#"{"a":"hello","b":4,"c":["x","y"],"d":[]}"#).unwrap();
        assert_eq!(answers["a"], Answer::from("hello"));
        assert_eq!(answers["b"], Answer::from(4.0));
        assert_eq!(answers["c"], Answer::from(vec!["x", "y"]));
        assert!(!answers["d"].is_answered());
    }

    #[test]
    fn scalar_number_parsing() {
        assert_eq!(Scalar::from(" 12.5 ").as_f64(), Some(12.5));
        assert_eq!(Scalar::from("abc").as_f64(), None);
        assert_eq!(Scalar::Number(4.0).key(), "4");
    }
}
