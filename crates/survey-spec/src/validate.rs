use std::collections::BTreeSet;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::markdown::is_safe_url;
use crate::spec::element::{
    AnswerType, DATE_PATTERN, DataValidation, MONTH_PATTERN, ShortAnswer, SurveyElement,
};
use crate::spec::AppSettings;

const NAME_PATTERN: &str = r"^[A-Za-z0-9_][A-Za-z0-9_.:-]*$";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    pub question_id: Option<String>,
    pub path: Option<String>,
    pub message: String,
    pub code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
    pub missing_required: Vec<String>,
    pub unknown_fields: Vec<String>,
}

impl ValidationResult {
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if !self.missing_required.is_empty() {
            parts.push(format!("missing {}", self.missing_required.join(", ")));
        }
        for error in &self.errors {
            parts.push(format!(
                "{}: {}",
                error.question_id.as_deref().unwrap_or("?"),
                error.message
            ));
        }
        if !self.unknown_fields.is_empty() {
            parts.push(format!("unknown {}", self.unknown_fields.join(", ")));
        }
        if parts.is_empty() {
            "valid".into()
        } else {
            parts.join("; ")
        }
    }
}

/// Checks submitted form values against the elements shown on a stage.
///
/// Mirrors what the browser enforces: mandatory fields must be non-empty
/// (at least one box for multi-select), choices must be among the options,
/// and numeric short answers must parse and respect their bounds.
pub fn validate_submission(elements: &[SurveyElement], answers: &Map<String, Value>) -> ValidationResult {
    let mut errors = Vec::new();
    let mut missing_required = Vec::new();

    for element in elements.iter().filter(|element| element.is_interactive()) {
        match answers.get(element.name()).filter(|value| !is_blank(value)) {
            None => {
                if element.is_mandatory() {
                    missing_required.push(element.name().to_string());
                }
            }
            Some(value) => {
                if let Some(error) = validate_value(element, value) {
                    errors.push(error);
                }
            }
        }
    }

    let known: BTreeSet<&str> = elements.iter().map(SurveyElement::name).collect();
    let unknown_fields: Vec<String> = answers
        .keys()
        .filter(|key| !known.contains(key.as_str()))
        .cloned()
        .collect();

    ValidationResult {
        valid: errors.is_empty() && missing_required.is_empty() && unknown_fields.is_empty(),
        errors,
        missing_required,
        unknown_fields,
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn validate_value(element: &SurveyElement, value: &Value) -> Option<ValidationError> {
    match element {
        SurveyElement::ShortAnswer(short) => validate_short_answer(short, value),
        SurveyElement::LongAnswer(_) => {
            (!value.is_string()).then(|| base_error(element.name(), "expected text", "type_mismatch"))
        }
        SurveyElement::MultipleChoice(_) | SurveyElement::LikertScale(_) => {
            let options = element.options().unwrap_or_default();
            match value.as_str() {
                None => Some(base_error(element.name(), "expected a single option", "type_mismatch")),
                Some(choice) if !options.iter().any(|option| option == choice) => {
                    Some(base_error(element.name(), "invalid option", "invalid_option"))
                }
                Some(_) => None,
            }
        }
        SurveyElement::MultiAnswer(_) => {
            let options = element.options().unwrap_or_default();
            let Some(items) = value.as_array() else {
                return Some(base_error(element.name(), "expected a list of options", "type_mismatch"));
            };
            let all_valid = items.iter().all(|item| {
                item.as_str()
                    .is_some_and(|choice| options.iter().any(|option| option == choice))
            });
            (!all_valid).then(|| base_error(element.name(), "invalid option", "invalid_option"))
        }
        SurveyElement::Text(_) => None,
    }
}

fn validate_short_answer(element: &ShortAnswer, value: &Value) -> Option<ValidationError> {
    let bounds = element.data_validation.clone().unwrap_or_default();
    match element.answer_type {
        AnswerType::Text => {
            (!value.is_string()).then(|| base_error(&element.name, "expected text", "type_mismatch"))
        }
        AnswerType::Number => {
            let number = match value {
                Value::Number(number) => number.as_f64(),
                Value::String(text) => text.trim().parse::<f64>().ok(),
                _ => None,
            };
            let Some(number) = number.filter(|number| number.is_finite()) else {
                return Some(base_error(&element.name, "expected a number", "type_mismatch"));
            };
            if bounds.numeric_min().is_some_and(|min| number < min) {
                return Some(base_error(&element.name, "value below minimum", "min"));
            }
            if bounds.numeric_max().is_some_and(|max| number > max) {
                return Some(base_error(&element.name, "value above maximum", "max"));
            }
            None
        }
        AnswerType::Date => validate_calendar(&element.name, value, &bounds, AnswerType::Date, DATE_PATTERN),
        AnswerType::Month => {
            validate_calendar(&element.name, value, &bounds, AnswerType::Month, MONTH_PATTERN)
        }
    }
}

// ISO dates and months order lexicographically, so bounds compare as strings.
fn validate_calendar(
    name: &str,
    value: &Value,
    bounds: &DataValidation,
    answer_type: AnswerType,
    pattern: &str,
) -> Option<ValidationError> {
    let Some(text) = value.as_str().map(str::trim) else {
        return Some(base_error(name, "expected a date", "type_mismatch"));
    };
    if !Regex::new(pattern).is_ok_and(|regex| regex.is_match(text)) {
        return Some(base_error(name, "value does not match the date format", "format_mismatch"));
    }
    if bounds
        .min_for(answer_type)
        .is_some_and(|min| text < min.as_str())
    {
        return Some(base_error(name, "value below minimum", "min"));
    }
    if bounds
        .max_for(answer_type)
        .is_some_and(|max| text > max.as_str())
    {
        return Some(base_error(name, "value above maximum", "max"));
    }
    None
}

fn base_error(name: &str, message: &str, code: &str) -> ValidationError {
    ValidationError {
        question_id: Some(name.to_string()),
        path: Some(format!("/{}", name)),
        message: message.into(),
        code: Some(code.into()),
    }
}

/// Authoring problem found in a settings document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsIssue {
    pub position: Option<usize>,
    pub name: Option<String>,
    pub code: String,
    pub message: String,
}

impl SettingsIssue {
    fn new(position: Option<usize>, name: Option<&str>, code: &str, message: impl Into<String>) -> Self {
        Self {
            position,
            name: name.map(String::from),
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Reports everything in the settings that the compiler would skip or that
/// would break the name join between model and stored responses.
pub fn validate_settings(settings: &AppSettings) -> Vec<SettingsIssue> {
    let mut issues = Vec::new();
    let mut seen = BTreeSet::new();

    for (position, entry) in settings.survey_settings.survey.iter().enumerate() {
        let Some(element) = entry.element() else {
            issues.push(SettingsIssue::new(
                Some(position),
                entry.declared_name(),
                "unrecognized_element",
                format!(
                    "type '{}' is unknown or the entry is malformed",
                    entry.declared_type().unwrap_or("<missing>")
                ),
            ));
            continue;
        };
        let name = element.name();
        if name.trim().is_empty() {
            issues.push(SettingsIssue::new(Some(position), None, "empty_name", "element has no name"));
        } else if !Regex::new(NAME_PATTERN).is_ok_and(|regex| regex.is_match(name)) {
            issues.push(SettingsIssue::new(
                Some(position),
                Some(name),
                "invalid_name",
                "name must only contain letters, digits, '_', '.', ':' or '-'",
            ));
        }
        if !seen.insert(name) {
            issues.push(SettingsIssue::new(
                Some(position),
                Some(name),
                "duplicate_name",
                "name is already used by an earlier element",
            ));
        }
        if let Some(options) = element.options() {
            if options.is_empty() {
                issues.push(SettingsIssue::new(Some(position), Some(name), "empty_options", "no options defined"));
            }
            let unique: BTreeSet<&String> = options.iter().collect();
            if unique.len() != options.len() {
                issues.push(SettingsIssue::new(
                    Some(position),
                    Some(name),
                    "duplicate_option",
                    "options contain duplicates",
                ));
            }
        }
    }

    let delay = settings.page_button_settings.continue_button_delay;
    if !delay.is_finite() || delay < 0.0 {
        issues.push(SettingsIssue::new(
            None,
            None,
            "invalid_delay",
            "continueButtonDelay must be a non-negative number of seconds",
        ));
    }

    let next = &settings.next_step_settings;
    if next.link_to_next_page {
        if next.link.trim().is_empty() {
            issues.push(SettingsIssue::new(None, None, "missing_next_step_link", "next step is enabled without a link"));
        } else if !is_safe_url(&next.link) {
            issues.push(SettingsIssue::new(None, None, "unsafe_next_step_link", "next step link uses a script scheme"));
        }
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn elements(value: Value) -> Vec<SurveyElement> {
        serde_json::from_value(value).expect("elements")
    }

    fn answers(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn missing_mandatory_answers_are_reported() {
        let elements = elements(json!([
            { "type": "shortAnswer", "name": "q1", "question": "Name", "mandatory": true },
            { "type": "multiAnswer", "name": "q2", "question": "Pets", "mandatory": true, "answers": ["cat"] },
            { "type": "longAnswer", "name": "q3", "question": "Notes" }
        ]));
        let result = validate_submission(&elements, &answers(json!({ "q1": "  ", "q2": [] })));
        assert!(!result.valid);
        assert_eq!(result.missing_required, vec!["q1", "q2"]);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn choices_must_come_from_options() {
        let elements = elements(json!([
            { "type": "multipleChoice", "name": "q1", "question": "Pick", "answers": ["A", "B"] },
            { "type": "multiAnswer", "name": "q2", "question": "Pick many", "answers": ["x", "y"] }
        ]));
        let result = validate_submission(&elements, &answers(json!({ "q1": "C", "q2": ["x", "z"] })));
        let codes = result
            .errors
            .iter()
            .filter_map(|error| error.code.as_deref())
            .collect::<Vec<_>>();
        assert_eq!(codes, vec!["invalid_option", "invalid_option"]);
    }

    #[test]
    fn numeric_bounds_are_enforced() {
        let elements = elements(json!([
            { "type": "shortAnswer", "name": "age", "question": "Age", "answerType": "number",
              "dataValidation": { "min": 18, "max": "99" } }
        ]));
        let low = validate_submission(&elements, &answers(json!({ "age": "12" })));
        assert_eq!(low.errors[0].code.as_deref(), Some("min"));
        let ok = validate_submission(&elements, &answers(json!({ "age": "30" })));
        assert!(ok.valid);
        let text = validate_submission(&elements, &answers(json!({ "age": "old" })));
        assert_eq!(text.errors[0].code.as_deref(), Some("type_mismatch"));
    }

    #[test]
    fn malformed_bounds_do_not_fail_validation() {
        let elements = elements(json!([
            { "type": "shortAnswer", "name": "age", "question": "Age", "answerType": "number",
              "dataValidation": { "min": "soon" } }
        ]));
        assert!(validate_submission(&elements, &answers(json!({ "age": "-5" }))).valid);
    }

    #[test]
    fn dates_respect_format_and_bounds() {
        let elements = elements(json!([
            { "type": "shortAnswer", "name": "day", "question": "Day", "answerType": "date",
              "dataValidation": { "min": "2024-01-01" } }
        ]));
        let early = validate_submission(&elements, &answers(json!({ "day": "2023-12-31" })));
        assert_eq!(early.errors[0].code.as_deref(), Some("min"));
        let garbage = validate_submission(&elements, &answers(json!({ "day": "tomorrow" })));
        assert_eq!(garbage.errors[0].code.as_deref(), Some("format_mismatch"));
        assert!(validate_submission(&elements, &answers(json!({ "day": "2024-02-29" }))).valid);
        let impossible = validate_submission(&elements, &answers(json!({ "day": "2024-13-99" })));
        assert_eq!(impossible.errors[0].code.as_deref(), Some("format_mismatch"));

        let months = self::elements(json!([
            { "type": "shortAnswer", "name": "month", "question": "Month", "answerType": "month" }
        ]));
        let bad_month = validate_submission(&months, &answers(json!({ "month": "2024-13" })));
        assert_eq!(bad_month.errors[0].code.as_deref(), Some("format_mismatch"));
        assert!(validate_submission(&months, &answers(json!({ "month": "2024-12" }))).valid);
    }

    #[test]
    fn unknown_fields_invalidate_submission() {
        let elements = elements(json!([
            { "type": "shortAnswer", "name": "q1", "question": "Name" }
        ]));
        let result = validate_submission(&elements, &answers(json!({ "q1": "a", "q9": "b" })));
        assert_eq!(result.unknown_fields, vec!["q9"]);
        assert!(!result.valid);
    }

    #[test]
    fn settings_issues_cover_authoring_mistakes() {
        let settings: AppSettings = serde_json::from_value(json!({
            "pageButtonSettings": { "continueButtonDelay": -2 },
            "nextStepSettings": { "linkToNextPage": true, "link": "" },
            "surveySettings": { "survey": [
                { "type": "foo", "name": "weird" },
                { "type": "shortAnswer", "name": "q1", "question": "One" },
                { "type": "shortAnswer", "name": "q1", "question": "Two" },
                { "type": "likertScale", "name": "has space", "question": "Scale", "scale": ["1", "1"] }
            ]}
        }))
        .expect("settings");
        let codes = validate_settings(&settings)
            .into_iter()
            .map(|issue| issue.code)
            .collect::<Vec<_>>();
        assert_eq!(
            codes,
            vec![
                "unrecognized_element",
                "duplicate_name",
                "invalid_name",
                "duplicate_option",
                "invalid_delay",
                "missing_next_step_link",
            ]
        );
    }
}
