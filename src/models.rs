//! Core data models for the finance tutor client
//!
//! Backend records are kept as opaque JSON so they round-trip unchanged.
//! The typed views below are read-only conveniences for display.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::TutorError;
use crate::Result;

/// Element of the dashboard's `expenses` array
pub type Expense = Value;

/// Element of the dashboard's `insights` array
pub type Insight = Value;

/// Persona record returned by `/generate-persona`
pub type Persona = Value;

//
// ================= Enums =================
//

/// Tone used for insight explanations
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AiMode {
    #[default]
    Polite,
    Savage,
}

/// What the tutor should do with an insight
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExplainAction {
    #[default]
    Explain,
    DraftCancel,
}

/// Backend call sites, used to label errors and reports
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Upload,
    SampleData,
    Dashboard,
    Explain,
    Persona,
    Health,
}

impl fmt::Display for AiMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AiMode::Polite => "polite",
            AiMode::Savage => "savage",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for AiMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "polite" => Ok(AiMode::Polite),
            "savage" => Ok(AiMode::Savage),
            other => Err(format!("unknown AI mode '{}', expected polite or savage", other)),
        }
    }
}

impl fmt::Display for ExplainAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExplainAction::Explain => "explain",
            ExplainAction::DraftCancel => "draft_cancel",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for ExplainAction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "explain" => Ok(ExplainAction::Explain),
            "draft_cancel" => Ok(ExplainAction::DraftCancel),
            other => Err(format!(
                "unknown action '{}', expected explain or draft_cancel",
                other
            )),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operation::Upload => "upload",
            Operation::SampleData => "sample-data",
            Operation::Dashboard => "dashboard",
            Operation::Explain => "explain-insight",
            Operation::Persona => "generate-persona",
            Operation::Health => "health",
        };
        write!(f, "{}", s)
    }
}

//
// ================= Dashboard =================
//

/// Dashboard-shaped backend response.
///
/// `raw` is the full response; `expenses` and `insights` are extracted from
/// it once, so they can never disagree with it.
#[derive(Debug, Clone, PartialEq)]
pub struct Dashboard {
    raw: Value,
    expenses: Vec<Expense>,
    insights: Vec<Insight>,
}

impl Dashboard {
    /// Validate a response body. The body must be a JSON object; `expenses`
    /// and `insights` must be arrays, `null` or absent (the latter two read
    /// as empty).
    pub fn from_value(raw: Value) -> Result<Self> {
        let Some(fields) = raw.as_object() else {
            return Err(TutorError::ShapeError(format!(
                "expected a JSON object, got {}",
                kind_of(&raw)
            )));
        };

        let expenses = extract_sequence(fields.get("expenses"), "expenses")?;
        let insights = extract_sequence(fields.get("insights"), "insights")?;

        Ok(Self {
            raw,
            expenses,
            insights,
        })
    }

    pub fn as_value(&self) -> &Value {
        &self.raw
    }

    pub fn expenses(&self) -> &[Expense] {
        &self.expenses
    }

    pub fn insights(&self) -> &[Insight] {
        &self.insights
    }

    /// Headline figures, when the backend supplied them
    pub fn summary(&self) -> DashboardSummary {
        serde_json::from_value(self.raw.clone()).unwrap_or_default()
    }
}

fn extract_sequence(value: Option<&Value>, field: &str) -> Result<Vec<Value>> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items.clone()),
        Some(other) => Err(TutorError::ShapeError(format!(
            "field '{}' must be an array, got {}",
            field,
            kind_of(other)
        ))),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

//
// ================= Explain Request =================
//

/// JSON body of `/explain-insight`. An absent follow-up is left out of the
/// body entirely.
#[derive(Debug, Clone, Serialize)]
pub struct ExplainRequest<'a> {
    pub insight: &'a Insight,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub follow_up: Option<&'a str>,
    pub style: AiMode,
    pub action: ExplainAction,
}

//
// ================= Typed Views =================
//
// Every field reads `null` the same as absent, so one null field never
// blanks the rest of a view.

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct DashboardSummary {
    #[serde(deserialize_with = "null_as_default")]
    pub total_expenses: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub expense_count: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub average_daily: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub monthly_breakdown: HashMap<String, f64>,
    /// 0-100 financial health score
    #[serde(deserialize_with = "null_as_default")]
    pub confidence_score: i64,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExpenseRecord {
    #[serde(deserialize_with = "null_as_default")]
    pub date: String,
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(deserialize_with = "null_as_default")]
    pub amount: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub category: String,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct InsightRecord {
    #[serde(rename = "type", deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(deserialize_with = "null_as_default")]
    pub monthly_cost: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub percentage: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub message: String,
    /// "info", "warning" or "alert"
    #[serde(deserialize_with = "null_as_default")]
    pub flag_level: String,
    #[serde(deserialize_with = "null_as_default")]
    pub breakdown: HashMap<String, f64>,
    #[serde(deserialize_with = "null_as_default")]
    pub impact_context: String,
    #[serde(deserialize_with = "null_as_default")]
    pub actionable_step: String,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct PersonaProfile {
    #[serde(deserialize_with = "null_as_default")]
    pub archetype: String,
    #[serde(deserialize_with = "null_as_default")]
    pub emoji: String,
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(deserialize_with = "null_as_default")]
    pub savage_quote: String,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Explanation {
    #[serde(deserialize_with = "null_as_default")]
    pub explanation: String,
    #[serde(deserialize_with = "null_as_default")]
    pub tip: String,
    #[serde(deserialize_with = "null_as_default")]
    pub next_step: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl ExpenseRecord {
    pub fn view(value: &Expense) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_default()
    }
}

impl InsightRecord {
    pub fn view(value: &Insight) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_default()
    }
}

impl PersonaProfile {
    pub fn view(value: &Persona) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_default()
    }
}

impl Explanation {
    pub fn view(value: &Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ai_mode_wire_format() {
        assert_eq!(serde_json::to_value(AiMode::Savage).unwrap(), json!("savage"));
        assert_eq!(AiMode::default(), AiMode::Polite);
        assert_eq!("SAVAGE".parse::<AiMode>().unwrap(), AiMode::Savage);
        assert!("rude".parse::<AiMode>().is_err());
    }

    #[test]
    fn test_explain_action_wire_format() {
        assert_eq!(
            serde_json::to_value(ExplainAction::DraftCancel).unwrap(),
            json!("draft_cancel")
        );
        assert_eq!(
            "draft-cancel".parse::<ExplainAction>().unwrap(),
            ExplainAction::DraftCancel
        );
        assert_eq!(ExplainAction::default(), ExplainAction::Explain);
    }

    #[test]
    fn test_dashboard_extracts_groups() {
        let raw = json!({
            "total_expenses": 1200.5,
            "expenses": [{"amount": 10.0}, {"amount": 20.0}],
            "insights": [{"type": "high_food"}]
        });

        let dashboard = Dashboard::from_value(raw.clone()).unwrap();
        assert_eq!(dashboard.as_value(), &raw);
        assert_eq!(dashboard.expenses(), &[json!({"amount": 10.0}), json!({"amount": 20.0})]);
        assert_eq!(dashboard.insights(), &[json!({"type": "high_food"})]);
        assert_eq!(dashboard.summary().total_expenses, 1200.5);
    }

    #[test]
    fn test_dashboard_null_groups_read_as_empty() {
        let dashboard = Dashboard::from_value(json!({"expenses": null})).unwrap();
        assert!(dashboard.expenses().is_empty());
        assert!(dashboard.insights().is_empty());
    }

    #[test]
    fn test_dashboard_rejects_malformed_bodies() {
        assert!(Dashboard::from_value(json!([1, 2, 3])).is_err());
        assert!(Dashboard::from_value(json!("ok")).is_err());

        let err = Dashboard::from_value(json!({"expenses": {"a": 1}})).unwrap_err();
        assert!(matches!(err, TutorError::ShapeError(ref detail) if detail.contains("expenses")));
    }

    #[test]
    fn test_explain_request_omits_missing_follow_up() {
        let insight = json!({"type": "subscription_waste", "monthly_cost": 499.0});

        let request = ExplainRequest {
            insight: &insight,
            follow_up: None,
            style: AiMode::default(),
            action: ExplainAction::default(),
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"insight": insight, "style": "polite", "action": "explain"})
        );

        let request = ExplainRequest {
            follow_up: Some("What about X?"),
            style: AiMode::Savage,
            ..request
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "insight": insight,
                "follow_up": "What about X?",
                "style": "savage",
                "action": "explain"
            })
        );
    }

    #[test]
    fn test_typed_views_are_lenient() {
        let insight = InsightRecord::view(&json!({
            "type": "subscription_waste",
            "monthly_cost": 1800.0,
            "message": "Three streaming services",
            "flag_level": "alert"
        }));
        assert_eq!(insight.kind, "subscription_waste");
        assert_eq!(insight.flag_level, "alert");
        assert!(insight.breakdown.is_empty());

        let persona = PersonaProfile::view(&json!({"archetype": "The Coffee Shop Philanthropist"}));
        assert_eq!(persona.archetype, "The Coffee Shop Philanthropist");
        assert_eq!(persona.emoji, "");

        assert_eq!(ExpenseRecord::view(&json!(42)), ExpenseRecord::default());
    }

    #[test]
    fn test_null_fields_read_as_defaults() {
        let dashboard = Dashboard::from_value(json!({
            "total_expenses": 4200.0,
            "expense_count": 37,
            "monthly_breakdown": null,
            "confidence_score": 64
        }))
        .unwrap();

        let summary = dashboard.summary();
        assert_eq!(summary.total_expenses, 4200.0);
        assert_eq!(summary.expense_count, 37);
        assert!(summary.monthly_breakdown.is_empty());
        assert_eq!(summary.confidence_score, 64);

        let insight = InsightRecord::view(&json!({
            "type": "high_food",
            "breakdown": null,
            "actionable_step": null,
            "message": "Food is 40% of spend"
        }));
        assert_eq!(insight.kind, "high_food");
        assert_eq!(insight.message, "Food is 40% of spend");
        assert!(insight.breakdown.is_empty());
        assert_eq!(insight.actionable_step, "");
    }

    #[test]
    fn test_explanation_carries_tip_and_next_step() {
        let explanation = Explanation::view(&json!({
            "explanation": "You spend a lot on delivery.",
            "tip": "Cook twice a week.",
            "next_step": "Delete one delivery app."
        }));
        assert_eq!(explanation.explanation, "You spend a lot on delivery.");
        assert_eq!(explanation.tip, "Cook twice a week.");
        assert_eq!(explanation.next_step, "Delete one delivery app.");

        let partial = Explanation::view(&json!({"explanation": "Fine.", "tip": null}));
        assert_eq!(partial.tip, "");
        assert_eq!(partial.next_step, "");
    }
}
