use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub(crate) const DATE_PATTERN: &str = r"^\d{4}-(0[1-9]|1[0-2])-(0[1-9]|[12]\d|3[01])$";
pub(crate) const MONTH_PATTERN: &str = r"^\d{4}-(0[1-9]|1[0-2])$";

/// Input flavour of a short answer field; maps onto the HTML input `type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum AnswerType {
    #[default]
    Text,
    Number,
    Date,
    Month,
}

impl AnswerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerType::Text => "text",
            AnswerType::Number => "number",
            AnswerType::Date => "date",
            AnswerType::Month => "month",
        }
    }
}

/// Optional bounds for a short answer. Values are kept raw and only
/// interpreted against the answer type when rendered or validated.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct DataValidation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<Value>,
}

impl DataValidation {
    /// Lower bound as it should appear in a `min` attribute, if it is usable.
    pub fn min_for(&self, answer_type: AnswerType) -> Option<String> {
        self.min
            .as_ref()
            .and_then(|bound| normalize_bound(bound, answer_type))
    }

    /// Upper bound as it should appear in a `max` attribute, if it is usable.
    pub fn max_for(&self, answer_type: AnswerType) -> Option<String> {
        self.max
            .as_ref()
            .and_then(|bound| normalize_bound(bound, answer_type))
    }

    pub fn numeric_min(&self) -> Option<f64> {
        self.min.as_ref().and_then(numeric_bound)
    }

    pub fn numeric_max(&self) -> Option<f64> {
        self.max.as_ref().and_then(numeric_bound)
    }
}

fn numeric_bound(bound: &Value) -> Option<f64> {
    match bound {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|value| value.is_finite())
}

fn normalize_bound(bound: &Value, answer_type: AnswerType) -> Option<String> {
    match answer_type {
        AnswerType::Text => None,
        AnswerType::Number => numeric_bound(bound).map(|value| value.to_string()),
        AnswerType::Date => matching_text(bound, DATE_PATTERN),
        AnswerType::Month => matching_text(bound, MONTH_PATTERN),
    }
}

fn matching_text(bound: &Value, pattern: &str) -> Option<String> {
    let text = bound.as_str()?.trim();
    if Regex::new(pattern).is_ok_and(|regex| regex.is_match(text)) {
        Some(text.to_string())
    } else {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShortAnswer {
    pub name: String,
    pub question: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub mandatory: bool,
    #[serde(default)]
    pub answer_type: AnswerType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_validation: Option<DataValidation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LongAnswer {
    pub name: String,
    pub question: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub mandatory: bool,
}

/// Single-select question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MultipleChoice {
    pub name: String,
    pub question: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub mandatory: bool,
    pub answers: Vec<String>,
}

/// Multi-select question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MultiAnswer {
    pub name: String,
    pub question: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub mandatory: bool,
    pub answers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LikertScale {
    pub name: String,
    pub question: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub mandatory: bool,
    pub scale: Vec<String>,
}

/// Informational block. The description is markdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TextElement {
    pub name: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continue_button_text: Option<String>,
}

/// One element of a survey, discriminated by its `type` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SurveyElement {
    ShortAnswer(ShortAnswer),
    LongAnswer(LongAnswer),
    MultipleChoice(MultipleChoice),
    MultiAnswer(MultiAnswer),
    LikertScale(LikertScale),
    Text(TextElement),
}

impl SurveyElement {
    pub fn name(&self) -> &str {
        match self {
            SurveyElement::ShortAnswer(element) => &element.name,
            SurveyElement::LongAnswer(element) => &element.name,
            SurveyElement::MultipleChoice(element) => &element.name,
            SurveyElement::MultiAnswer(element) => &element.name,
            SurveyElement::LikertScale(element) => &element.name,
            SurveyElement::Text(element) => &element.name,
        }
    }

    /// The `type` tag used in stored settings.
    pub fn type_label(&self) -> &'static str {
        match self {
            SurveyElement::ShortAnswer(_) => "shortAnswer",
            SurveyElement::LongAnswer(_) => "longAnswer",
            SurveyElement::MultipleChoice(_) => "multipleChoice",
            SurveyElement::MultiAnswer(_) => "multiAnswer",
            SurveyElement::LikertScale(_) => "likertScale",
            SurveyElement::Text(_) => "text",
        }
    }

    /// Whether the element produces a response value.
    pub fn is_interactive(&self) -> bool {
        !matches!(self, SurveyElement::Text(_))
    }

    pub fn is_mandatory(&self) -> bool {
        match self {
            SurveyElement::ShortAnswer(element) => element.mandatory,
            SurveyElement::LongAnswer(element) => element.mandatory,
            SurveyElement::MultipleChoice(element) => element.mandatory,
            SurveyElement::MultiAnswer(element) => element.mandatory,
            SurveyElement::LikertScale(element) => element.mandatory,
            SurveyElement::Text(_) => false,
        }
    }

    /// Whether the recorded value is an array of selected options.
    pub fn is_multi_select(&self) -> bool {
        matches!(self, SurveyElement::MultiAnswer(_))
    }

    /// Options of a choice element, in display order.
    pub fn options(&self) -> Option<&[String]> {
        match self {
            SurveyElement::MultipleChoice(element) => Some(&element.answers),
            SurveyElement::MultiAnswer(element) => Some(&element.answers),
            SurveyElement::LikertScale(element) => Some(&element.scale),
            _ => None,
        }
    }

    /// Question text for interactive elements, title for text blocks.
    pub fn heading(&self) -> &str {
        match self {
            SurveyElement::ShortAnswer(element) => &element.question,
            SurveyElement::LongAnswer(element) => &element.question,
            SurveyElement::MultipleChoice(element) => &element.question,
            SurveyElement::MultiAnswer(element) => &element.question,
            SurveyElement::LikertScale(element) => &element.question,
            SurveyElement::Text(element) => &element.title,
        }
    }

    pub fn description(&self) -> &str {
        match self {
            SurveyElement::ShortAnswer(element) => &element.description,
            SurveyElement::LongAnswer(element) => &element.description,
            SurveyElement::MultipleChoice(element) => &element.description,
            SurveyElement::MultiAnswer(element) => &element.description,
            SurveyElement::LikertScale(element) => &element.description,
            SurveyElement::Text(element) => &element.description,
        }
    }
}

/// A raw entry of the survey list.
///
/// Entries that do not parse as a known element (unknown `type`, or missing
/// fields for a known one) are kept verbatim so that a single bad entry never
/// invalidates the whole settings document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum SurveyEntry {
    Element(SurveyElement),
    Unrecognized(Value),
}

impl SurveyEntry {
    pub fn element(&self) -> Option<&SurveyElement> {
        match self {
            SurveyEntry::Element(element) => Some(element),
            SurveyEntry::Unrecognized(_) => None,
        }
    }

    /// Declared `type` of an unrecognized entry, if it has one.
    pub fn declared_type(&self) -> Option<&str> {
        match self {
            SurveyEntry::Element(element) => Some(element.type_label()),
            SurveyEntry::Unrecognized(raw) => raw.get("type").and_then(Value::as_str),
        }
    }

    /// Declared `name`, if any.
    pub fn declared_name(&self) -> Option<&str> {
        match self {
            SurveyEntry::Element(element) => Some(element.name()),
            SurveyEntry::Unrecognized(raw) => raw.get("name").and_then(Value::as_str),
        }
    }
}

impl From<SurveyElement> for SurveyEntry {
    fn from(element: SurveyElement) -> Self {
        SurveyEntry::Element(element)
    }
}
