use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::responses::{ExperimentResult, ResponseElement};

/// A result as kept by the host: the respondent's data plus bookkeeping.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredResult {
    #[serde(default)]
    pub respondent: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub data: ExperimentResult,
}

/// One row of the results overview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultSummary {
    pub respondent: Option<String>,
    /// Entries in the settings snapshot, if one was stored.
    pub page_count: Option<usize>,
    pub trial_count: usize,
}

pub fn summarize(result: &StoredResult) -> ResultSummary {
    ResultSummary {
        respondent: result.respondent.clone(),
        page_count: result
            .data
            .settings
            .as_ref()
            .map(|settings| settings.survey_settings.survey.len()),
        trial_count: result.data.trials().len(),
    }
}

/// Trials of a single result as a JSON array; empty when nothing was recorded.
pub fn export_one(result: &StoredResult) -> Value {
    trials_value(result.data.trials())
}

/// One trial array per result that carries raw data. Results without raw
/// data are left out rather than exported as empty arrays.
pub fn export_all(results: &[StoredResult]) -> Value {
    Value::Array(
        results
            .iter()
            .filter_map(|result| result.data.raw_data.as_ref())
            .map(|raw| trials_value(&raw.trials))
            .collect(),
    )
}

/// Download name for a single export, e.g. `surveyapp_alice_2024-05-01.json`.
pub fn export_file_name(result: &StoredResult) -> String {
    let part = |value: &Option<String>| {
        value
            .as_deref()
            .unwrap_or("unknown")
            .chars()
            .map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' { ch } else { '_' })
            .collect::<String>()
    };
    format!(
        "surveyapp_{}_{}.json",
        part(&result.respondent),
        part(&result.updated_at)
    )
}

fn trials_value(trials: &[ResponseElement]) -> Value {
    serde_json::to_value(trials).unwrap_or_else(|_| Value::Array(Vec::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stored(value: Value) -> StoredResult {
        serde_json::from_value(value).expect("stored result")
    }

    #[test]
    fn summary_counts_pages_and_trials() {
        let result = stored(json!({
            "respondent": "alice",
            "data": {
                "settings": { "surveySettings": { "survey": [
                    { "type": "shortAnswer", "name": "q1", "question": "One" },
                    { "type": "foo", "name": "odd" }
                ]}},
                "rawData": { "trials": [ { "name": "q1", "response": { "q1": "x" } } ] }
            }
        }));
        assert_eq!(
            summarize(&result),
            ResultSummary {
                respondent: Some("alice".into()),
                page_count: Some(2),
                trial_count: 1,
            }
        );
    }

    #[test]
    fn export_all_skips_results_without_raw_data() {
        let results = vec![
            stored(json!({ "data": { "rawData": { "trials": [ { "name": "a", "rt": 12 } ] } } })),
            stored(json!({ "respondent": "bob" })),
            stored(json!({ "data": { "rawData": { "trials": [] } } })),
        ];
        assert_eq!(
            export_all(&results),
            json!([[{ "name": "a", "rt": 12 }], []])
        );
        assert_eq!(export_one(&results[1]), json!([]));
    }

    #[test]
    fn file_name_is_filesystem_safe() {
        let result = stored(json!({ "respondent": "Ann Lee", "updatedAt": "2024-05-01T10:00" }));
        assert_eq!(export_file_name(&result), "surveyapp_Ann_Lee_2024-05-01T10_00.json");
    }
}
