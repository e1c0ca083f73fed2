use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::spec::element::{SurveyElement, SurveyEntry};

/// The ordered survey model.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SurveySettings {
    #[serde(default)]
    pub survey: Vec<SurveyEntry>,
}

impl SurveySettings {
    /// Recognized elements in model order.
    pub fn elements(&self) -> impl Iterator<Item = &SurveyElement> {
        self.survey.iter().filter_map(SurveyEntry::element)
    }
}

/// Localized control labels and the forced dwell time of continue buttons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PageButtonSettings {
    #[serde(default = "default_next_page_text")]
    pub next_page_text: String,
    #[serde(default = "default_previous_page_text")]
    pub previous_page_text: String,
    #[serde(default = "default_finish_survey_text")]
    pub finish_survey_text: String,
    #[serde(default = "default_continue_button_text")]
    pub continue_button_text: String,
    /// Seconds the continue control stays disabled after a page renders.
    #[serde(default)]
    pub continue_button_delay: f64,
}

fn default_next_page_text() -> String {
    "Next".into()
}

fn default_previous_page_text() -> String {
    "Previous".into()
}

fn default_finish_survey_text() -> String {
    "Finish".into()
}

fn default_continue_button_text() -> String {
    "Continue".into()
}

impl Default for PageButtonSettings {
    fn default() -> Self {
        Self {
            next_page_text: default_next_page_text(),
            previous_page_text: default_previous_page_text(),
            finish_survey_text: default_finish_survey_text(),
            continue_button_text: default_continue_button_text(),
            continue_button_delay: 0.0,
        }
    }
}

impl PageButtonSettings {
    /// The dwell time as a duration; negative or non-finite values mean no delay.
    pub fn continue_delay(&self) -> Duration {
        let seconds = self.continue_button_delay;
        if seconds.is_finite() && seconds > 0.0 {
            Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX)
        } else {
            Duration::ZERO
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FullScreenSettings {
    #[serde(default)]
    pub full_screen: bool,
    #[serde(default)]
    pub page_per_question: bool,
    #[serde(default = "default_start_message")]
    pub start_message: String,
    #[serde(default = "default_start_button_text")]
    pub start_button_text: String,
}

fn default_start_message() -> String {
    "Begin the Experiment".into()
}

fn default_start_button_text() -> String {
    "Start".into()
}

impl Default for FullScreenSettings {
    fn default() -> Self {
        Self {
            full_screen: false,
            page_per_question: false,
            start_message: default_start_message(),
            start_button_text: default_start_button_text(),
        }
    }
}

/// Optional closing page pointing the respondent to a follow-up link.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NextStepSettings {
    #[serde(default)]
    pub link_to_next_page: bool,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub link_text: String,
}

/// Snapshot of everything the builder configures for one survey.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    #[serde(default)]
    pub survey_settings: SurveySettings,
    #[serde(default)]
    pub page_button_settings: PageButtonSettings,
    #[serde(default)]
    pub full_screen_settings: FullScreenSettings,
    #[serde(default)]
    pub next_step_settings: NextStepSettings,
}

impl AppSettings {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn is_paged(&self) -> bool {
        self.full_screen_settings.page_per_question
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let settings = AppSettings::from_json("{}").expect("settings");
        assert!(settings.survey_settings.survey.is_empty());
        assert_eq!(settings.page_button_settings.next_page_text, "Next");
        assert_eq!(settings.full_screen_settings.start_button_text, "Start");
        assert!(!settings.next_step_settings.link_to_next_page);
        assert!(!settings.is_paged());
    }

    #[test]
    fn continue_delay_ignores_negative_and_nan() {
        let mut buttons = PageButtonSettings {
            continue_button_delay: 3.0,
            ..Default::default()
        };
        assert_eq!(buttons.continue_delay(), Duration::from_secs(3));
        buttons.continue_button_delay = -1.0;
        assert_eq!(buttons.continue_delay(), Duration::ZERO);
        buttons.continue_button_delay = f64::NAN;
        assert_eq!(buttons.continue_delay(), Duration::ZERO);
    }
}
