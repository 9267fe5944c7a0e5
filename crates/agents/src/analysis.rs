//! Query analysis produced by the triage classifier.
//!
//! The classifier's reply is parsed into a loose [`RawAnalysis`] first, where
//! every field is optional, and then validated into [`QueryAnalysis`] with
//! explicit defaults. Nothing downstream ever sees a half-filled record.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use techassist_core::{AppError, AppResult};

/// Below this classifier confidence a query is escalated.
pub const ESCALATION_CONFIDENCE_THRESHOLD: f32 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Low,
    Medium,
    High,
}

impl Complexity {
    fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "low" => Complexity::Low,
            "high" => Complexity::High,
            _ => Complexity::Medium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Complexity::Low => "low",
            Complexity::Medium => "medium",
            Complexity::High => "high",
        }
    }
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Routing category. Deliberately independent of the corpus folder names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryCategory {
    Installation,
    Configuration,
    Bug,
    Performance,
    Security,
    Other,
}

impl QueryCategory {
    fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "installation" => QueryCategory::Installation,
            "configuration" => QueryCategory::Configuration,
            "bug" => QueryCategory::Bug,
            "performance" => QueryCategory::Performance,
            "security" => QueryCategory::Security,
            _ => QueryCategory::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QueryCategory::Installation => "installation",
            QueryCategory::Configuration => "configuration",
            QueryCategory::Bug => "bug",
            QueryCategory::Performance => "performance",
            QueryCategory::Security => "security",
            QueryCategory::Other => "other",
        }
    }

    /// Wording used when talking to the user about the category.
    pub fn describe(&self) -> &'static str {
        match self {
            QueryCategory::Other => "technical",
            other => other.as_str(),
        }
    }
}

impl fmt::Display for QueryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated classification of one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryAnalysis {
    pub complexity: Complexity,
    pub category: QueryCategory,
    pub needs_expertise: bool,
    /// In `[0, 1]`
    pub confidence: f32,
    /// De-duplicated, in the order the classifier gave them
    pub keywords: Vec<String>,
    pub reasoning: String,
}

/// Classifier reply as received; every field may be absent or mistyped.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawAnalysis {
    complexity: Option<Value>,
    category: Option<Value>,
    #[serde(alias = "needs_expertise", alias = "needsExpertise")]
    needs_technical_expertise: Option<Value>,
    confidence: Option<Value>,
    keywords: Option<Value>,
    reasoning: Option<Value>,
}

fn as_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn as_score(value: &Value) -> Option<f32> {
    match value {
        Value::Number(n) => n.as_f64().map(|n| n as f32),
        Value::String(s) => s.trim().parse::<f32>().ok(),
        _ => None,
    }
}

fn as_keywords(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        Value::String(s) => s.split(',').map(str::to_string).collect(),
        _ => Vec::new(),
    }
}

impl From<RawAnalysis> for QueryAnalysis {
    fn from(raw: RawAnalysis) -> Self {
        let mut keywords: Vec<String> = Vec::new();
        for keyword in raw.keywords.as_ref().map(as_keywords).unwrap_or_default() {
            let keyword = keyword.trim();
            if !keyword.is_empty() && !keywords.iter().any(|k| k == keyword) {
                keywords.push(keyword.to_string());
            }
        }

        let confidence = raw.confidence.as_ref().and_then(as_score).unwrap_or(1.0);
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };

        Self {
            complexity: raw
                .complexity
                .as_ref()
                .and_then(Value::as_str)
                .map(Complexity::from_label)
                .unwrap_or(Complexity::Medium),
            category: raw
                .category
                .as_ref()
                .and_then(Value::as_str)
                .map(QueryCategory::from_label)
                .unwrap_or(QueryCategory::Other),
            needs_expertise: raw
                .needs_technical_expertise
                .as_ref()
                .and_then(as_flag)
                .unwrap_or(false),
            confidence,
            keywords,
            reasoning: raw
                .reasoning
                .as_ref()
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_default(),
        }
    }
}

impl QueryAnalysis {
    /// Parse a classifier reply.
    ///
    /// The JSON object may be surrounded by prose or code fences; the span
    /// from the first `{` to the last `}` is used.
    pub fn parse(reply: &str) -> AppResult<Self> {
        let start = reply.find('{');
        let end = reply.rfind('}');
        let json = match (start, end) {
            (Some(start), Some(end)) if start < end => &reply[start..=end],
            _ => {
                return Err(AppError::Analysis(
                    "classifier reply contains no JSON object".to_string(),
                ))
            }
        };

        let raw: RawAnalysis = serde_json::from_str(json)
            .map_err(|e| AppError::Analysis(format!("invalid classifier JSON: {}", e)))?;
        Ok(raw.into())
    }

    /// Analysis used when the classifier cannot be reached or understood.
    pub fn fallback() -> Self {
        Self {
            complexity: Complexity::High,
            category: QueryCategory::Other,
            needs_expertise: true,
            confidence: 0.0,
            keywords: Vec::new(),
            reasoning: "analysis failed".to_string(),
        }
    }

    /// Any single risk signal hands the query to the specialist.
    pub fn should_escalate(&self) -> bool {
        self.complexity == Complexity::High
            || self.needs_expertise
            || self.confidence < ESCALATION_CONFIDENCE_THRESHOLD
    }
}
