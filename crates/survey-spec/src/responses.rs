use std::collections::HashMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::spec::AppSettings;

/// One recorded stage: the captured response keyed by field name, plus
/// whatever free-form metadata the runtime attached.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct ResponseElement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Map<String, Value>>,
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

impl ResponseElement {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn with_response(mut self, response: Map<String, Value>) -> Self {
        self.response = Some(response);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct RawData {
    #[serde(default)]
    pub trials: Vec<ResponseElement>,
}

/// Persisted record of a respondent: the settings at time of run and the
/// captured trials.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<AppSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_data: Option<RawData>,
}

impl ExperimentResult {
    pub fn trials(&self) -> &[ResponseElement] {
        self.raw_data
            .as_ref()
            .map(|raw| raw.trials.as_slice())
            .unwrap_or_default()
    }

    pub fn with_trials(settings: &AppSettings, trials: Vec<ResponseElement>) -> Self {
        Self {
            settings: Some(settings.clone()),
            raw_data: Some(RawData { trials }),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Previously saved answers indexed by field name.
///
/// Built once per compile by walking the stored trials in order and indexing
/// every key of every `response` map, so a later trial overwrites an earlier
/// one for the same field (most recent write wins). This covers both paged
/// trials (one field each) and combined trials (every field at once).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriorAnswers {
    values: HashMap<String, Value>,
}

impl PriorAnswers {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_result(result: Option<&ExperimentResult>) -> Self {
        result
            .map(|result| Self::from_trials(result.trials()))
            .unwrap_or_default()
    }

    pub fn from_trials(trials: &[ResponseElement]) -> Self {
        let mut values = HashMap::new();
        for response in trials.iter().filter_map(|trial| trial.response.as_ref()) {
            for (field, value) in response {
                values.insert(field.clone(), value.clone());
            }
        }
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Stored value rendered as text, for inputs, text areas and single-select groups.
    pub fn text(&self, name: &str) -> Option<String> {
        match self.get(name)? {
            Value::String(text) => Some(text.clone()),
            Value::Number(number) => Some(number.to_string()),
            Value::Bool(flag) => Some(flag.to_string()),
            _ => None,
        }
    }

    /// Stored selections of a multi-select group. A bare string counts as a
    /// single selection.
    pub fn selections(&self, name: &str) -> Vec<String> {
        match self.get(name) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect(),
            Some(Value::String(text)) => vec![text.clone()],
            _ => Vec::new(),
        }
    }
}

/// Looks up the previously saved answer for `name`; absence is not an error.
pub fn lookup_prior_answer(result: Option<&ExperimentResult>, name: &str) -> Option<Value> {
    PriorAnswers::from_result(result).get(name).cloned()
}
