use serde_json::{Map, Value, json};

use crate::spec::element::{DATE_PATTERN, MONTH_PATTERN};
use crate::spec::{AnswerType, AppSettings, SurveyElement};

/// JSON Schema of the settings document.
pub fn settings_schema() -> Result<Value, serde_json::Error> {
    serde_json::to_value(schemars::schema_for!(AppSettings))
}

/// JSON Schema of the response object a combined survey submits: one
/// property per interactive element, mandatory elements required.
pub fn response_schema(settings: &AppSettings) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();

    for element in settings
        .survey_settings
        .elements()
        .filter(|element| element.is_interactive())
    {
        if properties.contains_key(element.name()) {
            continue;
        }
        let mut property = property_schema(element);
        if let Value::Object(map) = &mut property {
            map.insert("title".into(), Value::String(element.heading().to_string()));
            if !element.description().is_empty() {
                map.insert(
                    "description".into(),
                    Value::String(element.description().to_string()),
                );
            }
        }
        if element.is_mandatory() {
            required.push(Value::String(element.name().to_string()));
        }
        properties.insert(element.name().to_string(), property);
    }

    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false,
    })
}

fn property_schema(element: &SurveyElement) -> Value {
    match element {
        SurveyElement::ShortAnswer(short) => match short.answer_type {
            AnswerType::Text => json!({ "type": "string" }),
            AnswerType::Number => {
                let mut schema = json!({ "type": ["number", "string"] });
                if let (Value::Object(map), Some(bounds)) = (&mut schema, &short.data_validation) {
                    if let Some(min) = bounds.numeric_min() {
                        map.insert("minimum".into(), json!(min));
                    }
                    if let Some(max) = bounds.numeric_max() {
                        map.insert("maximum".into(), json!(max));
                    }
                }
                schema
            }
            AnswerType::Date => json!({ "type": "string", "pattern": DATE_PATTERN }),
            AnswerType::Month => json!({ "type": "string", "pattern": MONTH_PATTERN }),
        },
        SurveyElement::LongAnswer(_) => json!({ "type": "string" }),
        SurveyElement::MultipleChoice(_) | SurveyElement::LikertScale(_) => json!({
            "type": "string",
            "enum": element.options().unwrap_or_default(),
        }),
        SurveyElement::MultiAnswer(_) => {
            let mut schema = json!({
                "type": "array",
                "items": { "type": "string", "enum": element.options().unwrap_or_default() },
                "uniqueItems": true,
            });
            if element.is_mandatory()
                && let Value::Object(map) = &mut schema
            {
                map.insert("minItems".into(), json!(1));
            }
            schema
        }
        SurveyElement::Text(_) => json!({}),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_schema_describes_sections() {
        let schema = settings_schema().expect("schema");
        let text = schema.to_string();
        assert!(text.contains("surveySettings"));
        assert!(text.contains("pageButtonSettings"));
        assert!(text.contains("likertScale"));
    }

    #[test]
    fn response_schema_tracks_element_types() {
        let settings: AppSettings = serde_json::from_value(json!({
            "surveySettings": { "survey": [
                { "type": "shortAnswer", "name": "age", "question": "Age", "answerType": "number",
                  "dataValidation": { "min": 18 }, "mandatory": true },
                { "type": "multipleChoice", "name": "q2", "question": "Pick", "answers": ["A", "B"] },
                { "type": "multiAnswer", "name": "pets", "question": "Pets", "answers": ["cat"], "mandatory": true },
                { "type": "text", "name": "intro", "title": "Hi", "description": "" }
            ]}
        }))
        .expect("settings");
        let schema = response_schema(&settings);
        assert_eq!(schema["required"], json!(["age", "pets"]));
        assert_eq!(schema["properties"]["age"]["minimum"], json!(18.0));
        assert_eq!(schema["properties"]["q2"]["enum"], json!(["A", "B"]));
        assert_eq!(schema["properties"]["pets"]["minItems"], json!(1));
        assert!(schema["properties"].get("intro").is_none());
    }
}
