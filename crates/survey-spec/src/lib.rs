#![allow(missing_docs)]

pub mod clock;
pub mod export;
pub mod markdown;
pub mod markup;
pub mod merge;
pub mod progress;
pub mod responses;
pub mod runtime;
pub mod schema;
pub mod session;
pub mod spec;
pub mod template;
pub mod timeline;
pub mod validate;

pub use clock::{Clock, ManualClock, SystemClock};
pub use export::{ResultSummary, StoredResult, export_all, export_file_name, export_one, summarize};
pub use markdown::{is_safe_url, render_markdown};
pub use markup::{ControlKind, Fragment, FragmentKind, fragment_for, generate_fragment};
pub use merge::merge_responses;
pub use progress::{ProgressTracker, ProgressView};
pub use responses::{ExperimentResult, PriorAnswers, RawData, ResponseElement, lookup_prior_answer};
pub use runtime::{
    PresentationRuntime, RunOutcome, RuntimeError, StageAction, StageContext, run_timeline,
};
pub use schema::{response_schema, settings_schema};
pub use session::{FormSubmission, ResultSink, Session, SessionError};
pub use spec::{
    AnswerType, AppSettings, FullScreenSettings, NextStepSettings, PageButtonSettings,
    SurveyElement, SurveyEntry, SurveySettings,
};
pub use template::{Template, TemplateEngine, TemplateError};
pub use timeline::{
    CompileWarning, Compiler, FieldCapture, FinishHook, LoadHook, PresentationMode, Stage,
    StageHooks, StageKind, Timeline, WarningKind, compile,
};
pub use validate::{
    SettingsIssue, ValidationError, ValidationResult, validate_settings, validate_submission,
};
