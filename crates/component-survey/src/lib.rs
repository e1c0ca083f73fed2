use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use thiserror::Error;
use tracing::debug;

use survey_spec::{
    AppSettings, Compiler, ExperimentResult, PriorAnswers, ResponseElement, StoredResult,
    TemplateError, export_all, generate_fragment, lookup_prior_answer, merge_responses,
    response_schema, summarize, validate_settings, validate_submission,
};

const DEFAULT_SETTINGS: &str = include_str!("../../survey-spec/tests/fixtures/basic_survey.json");

#[derive(Debug, Error)]
enum ComponentError {
    #[error("failed to parse config/{0}")]
    ConfigParse(#[source] serde_json::Error),
    #[error("failed to parse input/{0}")]
    InputParse(#[source] serde_json::Error),
    #[error("element '{0}' is not part of the survey")]
    ElementUnavailable(String),
    #[error("json encode error: {0}")]
    JsonEncode(#[source] serde_json::Error),
    #[error(transparent)]
    Template(#[from] TemplateError),
}

#[derive(Debug, Deserialize, Serialize, Default)]
struct ComponentConfig {
    #[serde(default)]
    settings_json: Option<String>,
}

fn load_settings(config_json: &str) -> Result<AppSettings, ComponentError> {
    let config = if config_json.trim().is_empty() {
        ComponentConfig::default()
    } else {
        serde_json::from_str(config_json).map_err(ComponentError::ConfigParse)?
    };

    let settings_json = config.settings_json.as_deref().unwrap_or(DEFAULT_SETTINGS);

    AppSettings::from_json(settings_json).map_err(ComponentError::ConfigParse)
}

/// An empty string means "no prior result".
fn parse_prior(prior_json: &str) -> Result<Option<ExperimentResult>, ComponentError> {
    if prior_json.trim().is_empty() {
        return Ok(None);
    }
    ExperimentResult::from_json(prior_json)
        .map(Some)
        .map_err(ComponentError::InputParse)
}

fn parse_trials(trials_json: &str) -> Result<Vec<ResponseElement>, ComponentError> {
    if trials_json.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(trials_json).map_err(ComponentError::InputParse)
}

/// An empty string means "nothing answered yet".
fn parse_answers(answers_json: &str) -> Result<Map<String, Value>, ComponentError> {
    if answers_json.trim().is_empty() {
        return Ok(Map::new());
    }
    serde_json::from_str(answers_json).map_err(ComponentError::InputParse)
}

fn encode<T: Serialize>(value: &T) -> Result<Value, ComponentError> {
    serde_json::to_value(value).map_err(ComponentError::JsonEncode)
}

fn respond(result: Result<Value, ComponentError>) -> String {
    match result {
        Ok(value) => serde_json::to_string(&value).unwrap_or_else(|error| {
            json!({"error": format!("json encode: {}", error)}).to_string()
        }),
        Err(err) => json!({ "error": err.to_string() }).to_string(),
    }
}

pub fn describe(config_json: &str) -> String {
    respond(load_settings(config_json).and_then(|settings| {
        let elements = settings
            .survey_settings
            .elements()
            .map(|element| {
                json!({
                    "name": element.name(),
                    "type": element.type_label(),
                    "mandatory": element.is_mandatory(),
                })
            })
            .collect::<Vec<_>>();
        Ok(json!({
            "paged": settings.is_paged(),
            "full_screen": settings.full_screen_settings.full_screen,
            "next_step": settings.next_step_settings.link_to_next_page,
            "entries": settings.survey_settings.survey.len(),
            "elements": elements,
            "settings": encode(&settings)?,
        }))
    }))
}

pub fn compile_timeline(config_json: &str, prior_json: &str) -> String {
    respond(load_settings(config_json).and_then(|settings| {
        let prior = parse_prior(prior_json)?;
        let timeline = Compiler::new()?.compile(&settings, prior.as_ref());
        debug!(stages = timeline.total_stages(), "compiled timeline for host");
        encode(&timeline)
    }))
}

pub fn render_fragment(config_json: &str, element_name: &str, prior_json: &str) -> String {
    respond(load_settings(config_json).and_then(|settings| {
        let element = settings
            .survey_settings
            .elements()
            .find(|element| element.name() == element_name)
            .ok_or_else(|| ComponentError::ElementUnavailable(element_name.to_string()))?;
        let prior = parse_prior(prior_json)?;
        let compiler = Compiler::new()?;
        let fragment = generate_fragment(
            compiler.engine(),
            element,
            &PriorAnswers::from_result(prior.as_ref()),
        )?;
        encode(&fragment)
    }))
}

pub fn check_settings(config_json: &str) -> String {
    respond(load_settings(config_json).and_then(|settings| {
        let issues = validate_settings(&settings);
        Ok(json!({
            "valid": issues.is_empty(),
            "issues": encode(&issues)?,
        }))
    }))
}

pub fn get_response_schema(config_json: &str) -> String {
    respond(load_settings(config_json).map(|settings| response_schema(&settings)))
}

/// Validates a combined submission against every element of the survey.
pub fn validate_answers(config_json: &str, answers_json: &str) -> String {
    respond(load_settings(config_json).and_then(|settings| {
        let elements = settings.survey_settings.elements().cloned().collect::<Vec<_>>();
        let answers = parse_answers(answers_json)?;
        encode(&validate_submission(&elements, &answers))
    }))
}

pub fn lookup_answer(prior_json: &str, name: &str) -> String {
    respond(parse_prior(prior_json).map(|prior| {
        json!({
            "name": name,
            "value": lookup_prior_answer(prior.as_ref(), name),
        })
    }))
}

/// Merges the trials of a run over the trials of a prior result and wraps
/// them into a result carrying the current settings.
pub fn merge_results(config_json: &str, prior_json: &str, trials_json: &str) -> String {
    respond(load_settings(config_json).and_then(|settings| {
        let prior = parse_prior(prior_json)?;
        let incoming = parse_trials(trials_json)?;
        let prior_trials = prior.as_ref().map(ExperimentResult::trials).unwrap_or_default();
        let merged = merge_responses(prior_trials, &incoming);
        encode(&ExperimentResult::with_trials(&settings, merged))
    }))
}

pub fn export_results(results_json: &str) -> String {
    respond(
        serde_json::from_str::<Vec<StoredResult>>(results_json)
            .map_err(ComponentError::InputParse)
            .map(|results| export_all(&results)),
    )
}

pub fn summarize_results(results_json: &str) -> String {
    respond(
        serde_json::from_str::<Vec<StoredResult>>(results_json)
            .map_err(ComponentError::InputParse)
            .and_then(|results| encode(&results.iter().map(summarize).collect::<Vec<_>>())),
    )
}
