use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    clock::Clock,
    progress::ProgressView,
    session::{FormSubmission, ResultSink, Session, SessionError},
    timeline::Stage,
};

/// What the respondent did with a presented stage.
#[derive(Debug, Clone, PartialEq)]
pub enum StageAction {
    Start,
    Submit(FormSubmission),
    Continue,
    Dismiss,
    Unload,
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("presentation failed: {0}")]
    Presentation(String),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// State shown next to a stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StageContext {
    pub progress: ProgressView,
    /// Time left before the continue control may be used.
    pub continue_in: Duration,
}

/// Renders stages and reports what the respondent did.
pub trait PresentationRuntime {
    fn present(&mut self, stage: &Stage, context: &StageContext) -> Result<StageAction, RuntimeError>;

    /// Called when the action for `stage` was refused; the stage is then
    /// presented again.
    fn rejected(&mut self, stage: &Stage, error: &SessionError) {
        warn!(index = stage.index, name = %stage.name, %error, "stage action rejected");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    Unloaded,
}

/// Drives `session` to the end of its timeline through `runtime`.
pub fn run_timeline<S, C, R>(
    session: &mut Session<S, C>,
    runtime: &mut R,
) -> Result<RunOutcome, RuntimeError>
where
    S: ResultSink,
    C: Clock,
    R: PresentationRuntime + ?Sized,
{
    while let Some(stage) = session.load_stage().cloned() {
        let context = StageContext {
            progress: session.progress_view(),
            continue_in: session.continue_remaining(),
        };
        let outcome = match runtime.present(&stage, &context)? {
            StageAction::Start => session.start(),
            StageAction::Submit(submission) => session.submit(&submission),
            StageAction::Continue => session.advance(),
            StageAction::Dismiss => session.dismiss(),
            StageAction::Unload => {
                session.unload();
                return Ok(RunOutcome::Unloaded);
            }
        };
        match outcome {
            Ok(()) => {}
            Err(error @ (SessionError::Invalid(_)
            | SessionError::ContinueLocked { .. }
            | SessionError::UnexpectedAction { .. })) => runtime.rejected(&stage, &error),
            Err(error) => return Err(error.into()),
        }
    }
    debug!(trials = session.trials().len(), "timeline completed");
    Ok(RunOutcome::Completed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::ManualClock,
        responses::ResponseElement,
        spec::AppSettings,
        timeline::{StageKind, compile},
    };
    use serde_json::json;
    use std::collections::VecDeque;

    struct Scripted {
        actions: VecDeque<StageAction>,
        presented: Vec<(String, StageContext)>,
        rejections: usize,
    }

    impl PresentationRuntime for Scripted {
        fn present(&mut self, stage: &Stage, context: &StageContext) -> Result<StageAction, RuntimeError> {
            self.presented.push((stage.name.clone(), *context));
            self.actions
                .pop_front()
                .ok_or_else(|| RuntimeError::Presentation("script exhausted".into()))
        }

        fn rejected(&mut self, _stage: &Stage, _error: &SessionError) {
            self.rejections += 1;
        }
    }

    fn submission(value: serde_json::Value) -> StageAction {
        StageAction::Submit(value.as_object().cloned().unwrap_or_default())
    }

    #[test]
    fn rejected_actions_represent_the_same_stage() {
        let settings: AppSettings = serde_json::from_value(json!({
            "fullScreenSettings": { "fullScreen": true },
            "surveySettings": { "survey": [
                { "type": "shortAnswer", "name": "q1", "question": "One", "mandatory": true }
            ]},
            "nextStepSettings": { "linkToNextPage": true, "link": "https://example.org" }
        }))
        .expect("settings");
        let timeline = compile(&settings, None).expect("compile");
        let mut finishes = 0;
        let mut session = Session::with_clock(
            timeline,
            settings,
            None,
            |_: &[ResponseElement], _: &AppSettings| finishes += 1,
            ManualClock::new(),
        );
        let mut runtime = Scripted {
            actions: VecDeque::from(vec![
                StageAction::Start,
                submission(json!({ "q1": "" })),
                submission(json!({ "q1": "ok" })),
                StageAction::Dismiss,
            ]),
            presented: Vec::new(),
            rejections: 0,
        };

        let outcome = run_timeline(&mut session, &mut runtime).expect("run");
        assert_eq!(outcome, RunOutcome::Completed);
        assert_eq!(runtime.rejections, 1);
        let names = runtime
            .presented
            .iter()
            .map(|(name, _)| name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["fullscreen", "combined_survey", "combined_survey", "next_step"]);
        assert_eq!(session.trials().len(), 3);
        assert_eq!(session.timeline().stages[2].kind, StageKind::NextStep);
        drop(session);
        assert_eq!(finishes, 2);
    }

    #[test]
    fn unload_stops_the_run_and_flushes() {
        let settings = AppSettings::default();
        let timeline = compile(&settings, None).expect("compile");
        let mut flushed = Vec::new();
        let mut session = Session::with_clock(
            timeline,
            settings,
            None,
            |trials: &[ResponseElement], _: &AppSettings| flushed.push(trials.len()),
            ManualClock::new(),
        );
        let mut runtime = Scripted {
            actions: VecDeque::from(vec![StageAction::Unload]),
            presented: Vec::new(),
            rejections: 0,
        };
        let outcome = run_timeline(&mut session, &mut runtime).expect("run");
        assert_eq!(outcome, RunOutcome::Unloaded);
        drop(session);
        assert_eq!(flushed, vec![0]);
    }
}
