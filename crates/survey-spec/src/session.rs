use std::time::Duration;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    clock::{Clock, SystemClock},
    merge::merge_responses,
    progress::{ProgressTracker, ProgressView},
    responses::{ExperimentResult, ResponseElement},
    spec::AppSettings,
    timeline::{FieldCapture, Stage, StageKind, Timeline},
    validate::{ValidationResult, validate_submission},
};

/// Raw form values keyed by field name, as submitted by the runtime.
pub type FormSubmission = Map<String, Value>;

/// Receives the accumulated trials whenever they should be persisted.
///
/// Called when the final survey stage finishes, again when the last stage of
/// the timeline finishes, and on every unload. The
/// call is fire-and-forget: failures are the receiver's business.
pub trait ResultSink {
    fn on_finish(&mut self, trials: &[ResponseElement], settings: &AppSettings);
}

impl<F> ResultSink for F
where
    F: FnMut(&[ResponseElement], &AppSettings),
{
    fn on_finish(&mut self, trials: &[ResponseElement], settings: &AppSettings) {
        self(trials, settings)
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("the timeline has no stages left")]
    Finished,
    #[error("stage {index} ('{name}') does not accept {action}")]
    UnexpectedAction {
        index: usize,
        name: String,
        action: &'static str,
    },
    #[error("continue is locked for another {} ms", .remaining.as_millis())]
    ContinueLocked { remaining: Duration },
    #[error("submission rejected: {}", .0.summary())]
    Invalid(ValidationResult),
}

/// Runs a compiled [`Timeline`] one stage at a time.
///
/// The session owns the response buffer for the current run. Each finished
/// stage is recorded, merged over the prior trials and reflected in the
/// progress counter.
pub struct Session<S, C = SystemClock> {
    timeline: Timeline,
    settings: AppSettings,
    prior_trials: Vec<ResponseElement>,
    run_trials: Vec<ResponseElement>,
    trials: Vec<ResponseElement>,
    progress: ProgressTracker,
    notify_at: Option<usize>,
    current: usize,
    loaded_at: Option<Duration>,
    started_at: Duration,
    clock: C,
    sink: S,
}

impl<S: ResultSink> Session<S, SystemClock> {
    pub fn new(
        timeline: Timeline,
        settings: AppSettings,
        prior: Option<&ExperimentResult>,
        sink: S,
    ) -> Self {
        Self::with_clock(timeline, settings, prior, sink, SystemClock::new())
    }
}

impl<S: ResultSink, C: Clock> Session<S, C> {
    pub fn with_clock(
        timeline: Timeline,
        settings: AppSettings,
        prior: Option<&ExperimentResult>,
        sink: S,
        clock: C,
    ) -> Self {
        let prior_trials = prior
            .map(|result| result.trials().to_vec())
            .unwrap_or_default();
        let progress = ProgressTracker::new(timeline.total_stages());
        let notify_at = timeline
            .final_survey_stage()
            .or_else(|| timeline.total_stages().checked_sub(1));
        Self {
            trials: prior_trials.clone(),
            prior_trials,
            run_trials: Vec::new(),
            progress,
            notify_at,
            current: 0,
            loaded_at: None,
            started_at: clock.now(),
            timeline,
            settings,
            clock,
            sink,
        }
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    pub fn current_stage(&self) -> Option<&Stage> {
        self.timeline.stage(self.current)
    }

    pub fn is_finished(&self) -> bool {
        self.current >= self.timeline.total_stages()
    }

    /// Marks the current stage as rendered; starts its continue gate.
    /// Loading an already loaded stage keeps the original load time.
    pub fn load_stage(&mut self) -> Option<&Stage> {
        if self.is_finished() {
            return None;
        }
        if self.loaded_at.is_none() {
            self.loaded_at = Some(self.clock.now());
            debug!(index = self.current, "stage loaded");
        }
        self.timeline.stage(self.current)
    }

    /// Time left before the continue control of the current stage becomes
    /// actionable. A stage that has not been loaded yet reports its full delay.
    pub fn continue_remaining(&self) -> Duration {
        let Some(stage) = self.current_stage() else {
            return Duration::ZERO;
        };
        let delay = stage.continue_delay();
        match self.loaded_at {
            Some(loaded_at) => delay.saturating_sub(self.clock.now().saturating_sub(loaded_at)),
            None => delay,
        }
    }

    pub fn continue_ready(&self) -> bool {
        self.continue_remaining().is_zero()
    }

    pub fn progress(&self) -> f64 {
        self.progress.fraction()
    }

    pub fn progress_view(&self) -> ProgressView {
        ProgressView::new(&self.progress, self.timeline.show_progress)
    }

    /// Trials of the current result: this run merged over the prior ones.
    pub fn trials(&self) -> &[ResponseElement] {
        &self.trials
    }

    pub fn result(&self) -> ExperimentResult {
        ExperimentResult::with_trials(&self.settings, self.trials.clone())
    }

    /// Finishes the fullscreen entry stage.
    pub fn start(&mut self) -> Result<(), SessionError> {
        self.expect_kind(StageKind::Fullscreen, "start")?;
        self.finish_stage(None);
        Ok(())
    }

    /// Finishes a survey form stage with the submitted values.
    pub fn submit(&mut self, submission: &FormSubmission) -> Result<(), SessionError> {
        let stage = self.expect_kind(StageKind::SurveyForm, "a form submission")?;
        let captured = capture_fields(stage.captures(), submission);
        let validation = validate_submission(&stage.elements, &captured);
        if !validation.valid {
            return Err(SessionError::Invalid(validation));
        }
        self.finish_stage(Some(captured));
        Ok(())
    }

    /// Finishes an information stage once its continue gate has elapsed.
    pub fn advance(&mut self) -> Result<(), SessionError> {
        self.expect_kind(StageKind::Information, "continue")?;
        let remaining = self.continue_remaining();
        if !remaining.is_zero() {
            return Err(SessionError::ContinueLocked { remaining });
        }
        self.finish_stage(None);
        Ok(())
    }

    /// Dismisses the terminal next-step stage.
    pub fn dismiss(&mut self) -> Result<(), SessionError> {
        self.expect_kind(StageKind::NextStep, "dismissal")?;
        self.finish_stage(None);
        Ok(())
    }

    /// Best-effort flush when the respondent navigates away.
    pub fn unload(&mut self) {
        debug!(trials = self.trials.len(), "flushing trials on unload");
        self.sink.on_finish(&self.trials, &self.settings);
    }

    fn expect_kind(&self, kind: StageKind, action: &'static str) -> Result<&Stage, SessionError> {
        let stage = self.current_stage().ok_or(SessionError::Finished)?;
        if stage.kind == kind {
            Ok(stage)
        } else {
            warn!(index = stage.index, name = %stage.name, action, "unexpected stage action");
            Err(SessionError::UnexpectedAction {
                index: stage.index,
                name: stage.name.clone(),
                action,
            })
        }
    }

    fn finish_stage(&mut self, response: Option<FormSubmission>) {
        let Some(stage) = self.timeline.stage(self.current) else {
            return;
        };
        let now = self.clock.now();
        let mut trial = ResponseElement::named(stage.name.clone())
            .with_metadata("trial_type", Value::from(stage.kind.trial_type()))
            .with_metadata("trial_index", Value::from(stage.index))
            .with_metadata("time_elapsed", Value::from(millis(now.saturating_sub(self.started_at))));
        if let Some(loaded_at) = self.loaded_at {
            trial = trial.with_metadata("rt", Value::from(millis(now.saturating_sub(loaded_at))));
        }
        if let Some(response) = response {
            trial = trial.with_response(response);
        }

        let finished_index = stage.index;
        self.run_trials.push(trial);
        self.trials = merge_responses(&self.prior_trials, &self.run_trials);
        let fraction = self.progress.advance();
        self.current += 1;
        self.loaded_at = None;
        debug!(index = finished_index, progress = fraction, "stage finished");

        if self.notify_at == Some(finished_index) || self.is_finished() {
            self.sink.on_finish(&self.trials, &self.settings);
        }
    }
}

fn millis(duration: Duration) -> u64 {
    duration.as_millis().try_into().unwrap_or(u64::MAX)
}

/// Reads the captured fields out of a submission. Absent single-value
/// fields become empty strings and absent multi-select fields empty lists,
/// matching what a submitted HTML form yields.
fn capture_fields(fields: &[FieldCapture], submission: &FormSubmission) -> FormSubmission {
    fields
        .iter()
        .map(|field| {
            let value = match (submission.get(&field.name), field.multiple) {
                (Some(Value::Array(items)), true) => Value::Array(items.clone()),
                (Some(Value::String(text)), true) => Value::Array(vec![Value::String(text.clone())]),
                (None | Some(Value::Null), true) => Value::Array(Vec::new()),
                (None | Some(Value::Null), false) => Value::String(String::new()),
                (Some(other), _) => other.clone(),
            };
            (field.name.clone(), value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::compile;
    use serde_json::json;

    #[test]
    fn capture_normalizes_missing_fields() {
        let fields = vec![
            FieldCapture {
                name: "text".into(),
                multiple: false,
            },
            FieldCapture {
                name: "many".into(),
                multiple: true,
            },
            FieldCapture {
                name: "one".into(),
                multiple: true,
            },
        ];
        let submission = json!({ "one": "x", "ignored": "y" })
            .as_object()
            .cloned()
            .unwrap_or_default();
        let captured = capture_fields(&fields, &submission);
        assert_eq!(
            Value::Object(captured),
            json!({ "text": "", "many": [], "one": ["x"] })
        );
    }

    #[test]
    fn wrong_action_is_rejected_without_progress() {
        let settings: AppSettings = serde_json::from_value(json!({
            "surveySettings": { "survey": [
                { "type": "shortAnswer", "name": "q1", "question": "One" }
            ]}
        }))
        .expect("settings");
        let timeline = compile(&settings, None).expect("compile");
        let mut session = Session::new(timeline, settings, None, |_: &[ResponseElement], _: &AppSettings| {});
        assert!(matches!(
            session.advance(),
            Err(SessionError::UnexpectedAction { index: 0, .. })
        ));
        assert!(matches!(session.dismiss(), Err(SessionError::UnexpectedAction { .. })));
        assert_eq!(session.progress(), 0.0);
        assert!(!session.is_finished());
    }
}
