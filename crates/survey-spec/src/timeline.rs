use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use serde::Serialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::{
    markdown::{is_safe_url, render_markdown},
    markup::{Fragment, FragmentKind, generate_fragment},
    responses::{ExperimentResult, PriorAnswers},
    spec::{AppSettings, SurveyElement, SurveyEntry},
    template::{Template, TemplateEngine, TemplateError},
};

pub const COMBINED_STAGE_NAME: &str = "combined_survey";
pub const FULLSCREEN_STAGE_NAME: &str = "fullscreen";
pub const NEXT_STEP_STAGE_NAME: &str = "next_step";

/// How survey elements are distributed over stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentationMode {
    /// Every element on one page.
    Combined,
    /// One stage per element.
    Paged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Entry stage that switches the display to fullscreen.
    Fullscreen,
    /// Form with one or more questions, finished by submitting it.
    SurveyForm,
    /// Informational page, finished by pressing continue.
    Information,
    /// Terminal page with the follow-up link, finished by dismissal.
    NextStep,
}

impl StageKind {
    /// Label recorded as `trial_type` in the captured data.
    pub fn trial_type(&self) -> &'static str {
        match self {
            StageKind::Fullscreen => "fullscreen",
            StageKind::SurveyForm => "survey-html-form",
            StageKind::Information => "html-button-response",
            StageKind::NextStep => "html-keyboard-response",
        }
    }

    /// Stages that belong to the survey proper, as opposed to entry and exit.
    pub fn is_survey(&self) -> bool {
        matches!(self, StageKind::SurveyForm | StageKind::Information)
    }
}

/// Behaviour attached when a stage is rendered. Hooks are scoped to the
/// stage container and torn down with the stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "hook", rename_all = "snake_case")]
pub enum LoadHook {
    /// Keep a `selected` class on the label of the checked option of
    /// `question` inside `container`.
    HighlightSelection { container: String, question: String },
    /// Keep the continue control disabled for `delay_ms` after load.
    GateContinue { delay_ms: u64 },
}

/// One field read from the submitted form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldCapture {
    pub name: String,
    /// Multi-select fields are captured as arrays.
    pub multiple: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "hook", rename_all = "snake_case")]
pub enum FinishHook {
    /// Read the listed fields from the submitted form.
    Capture { fields: Vec<FieldCapture> },
    /// Request fullscreen, then scroll the document to the top.
    EnterFullscreen,
    /// Record the stage without a response.
    Acknowledge,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageHooks {
    pub on_load: Vec<LoadHook>,
    pub on_finish: FinishHook,
}

/// One unit of presentation handed to the runtime.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stage {
    pub index: usize,
    pub name: String,
    pub kind: StageKind,
    /// Id of the element the runtime renders the stage into.
    pub container_id: String,
    pub html: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub button_label: Option<String>,
    /// Survey elements shown on this stage, in model order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub elements: Vec<SurveyElement>,
    pub hooks: StageHooks,
}

impl Stage {
    /// Minimum time the continue control stays disabled.
    pub fn continue_delay(&self) -> Duration {
        self.hooks
            .on_load
            .iter()
            .find_map(|hook| match hook {
                LoadHook::GateContinue { delay_ms } => Some(Duration::from_millis(*delay_ms)),
                _ => None,
            })
            .unwrap_or(Duration::ZERO)
    }

    pub fn captures(&self) -> &[FieldCapture] {
        match &self.hooks.on_finish {
            FinishHook::Capture { fields } => fields,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum WarningKind {
    UnknownElement { declared_type: Option<String> },
    DuplicateName,
    EmptyOptions,
    RenderFailed { message: String },
}

/// Non-fatal problem found while compiling; the element was omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompileWarning {
    /// Position of the entry in the survey list.
    pub position: usize,
    pub name: Option<String>,
    #[serde(flatten)]
    pub kind: WarningKind,
}

impl fmt::Display for CompileWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.name.as_deref().unwrap_or("<unnamed>");
        match &self.kind {
            WarningKind::UnknownElement { declared_type } => write!(
                f,
                "entry {} ({}) has unknown or malformed type '{}'",
                self.position,
                name,
                declared_type.as_deref().unwrap_or("<missing>")
            ),
            WarningKind::DuplicateName => write!(
                f,
                "entry {} reuses the name '{}' of an earlier element",
                self.position, name
            ),
            WarningKind::EmptyOptions => {
                write!(f, "entry {} ({}) has no options", self.position, name)
            }
            WarningKind::RenderFailed { message } => write!(
                f,
                "entry {} ({}) failed to render: {}",
                self.position, name, message
            ),
        }
    }
}

/// Ordered stages plus what was dropped on the way.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Timeline {
    pub mode: PresentationMode,
    pub stages: Vec<Stage>,
    pub warnings: Vec<CompileWarning>,
    pub show_progress: bool,
}

impl Timeline {
    /// Denominator of the progress fraction.
    pub fn total_stages(&self) -> usize {
        self.stages.len()
    }

    pub fn stage(&self, index: usize) -> Option<&Stage> {
        self.stages.get(index)
    }

    /// Index of the stage whose completion means every answer is captured.
    pub fn final_survey_stage(&self) -> Option<usize> {
        self.stages
            .iter()
            .rposition(|stage| stage.kind.is_survey())
    }
}

struct CompiledElement<'a> {
    element: &'a SurveyElement,
    fragment: Fragment,
}

/// Turns survey settings into a [`Timeline`]. Holds the template registry so
/// repeated compiles do not re-parse templates.
#[derive(Debug, Clone)]
pub struct Compiler {
    engine: TemplateEngine,
}

impl Compiler {
    pub fn new() -> Result<Self, TemplateError> {
        Ok(Self {
            engine: TemplateEngine::new()?,
        })
    }

    pub fn engine(&self) -> &TemplateEngine {
        &self.engine
    }

    /// Compiles the settings, pre-filling answers from `prior`.
    ///
    /// Never fails: elements that cannot be compiled are omitted and
    /// reported in [`Timeline::warnings`].
    pub fn compile(&self, settings: &AppSettings, prior: Option<&ExperimentResult>) -> Timeline {
        let answers = PriorAnswers::from_result(prior);
        let mut warnings = Vec::new();
        let compiled = self.compile_elements(&settings.survey_settings.survey, &answers, &mut warnings);

        let mode = if settings.is_paged() {
            PresentationMode::Paged
        } else {
            PresentationMode::Combined
        };

        let mut stages = Vec::new();
        if settings.full_screen_settings.full_screen {
            stages.push(self.fullscreen_stage(settings));
        }
        match mode {
            PresentationMode::Combined => stages.push(combined_stage(settings, &compiled)),
            PresentationMode::Paged => {
                let last_question = compiled
                    .iter()
                    .rposition(|item| item.element.is_interactive());
                for (position, item) in compiled.iter().enumerate() {
                    stages.push(paged_stage(settings, item, Some(position) == last_question));
                }
            }
        }
        if settings.next_step_settings.link_to_next_page {
            match self.next_step_stage(settings) {
                Ok(stage) => stages.push(stage),
                Err(error) => warn!(%error, "failed to render next step page"),
            }
        }

        for (index, stage) in stages.iter_mut().enumerate() {
            stage.index = index;
            stage.container_id = container_id(index);
            for hook in &mut stage.hooks.on_load {
                if let LoadHook::HighlightSelection { container, .. } = hook {
                    *container = container_id(index);
                }
            }
        }

        let show_progress = mode == PresentationMode::Paged && stages.len() > 1;
        debug!(
            stages = stages.len(),
            warnings = warnings.len(),
            ?mode,
            "compiled survey timeline"
        );

        Timeline {
            mode,
            stages,
            warnings,
            show_progress,
        }
    }

    fn compile_elements<'a>(
        &self,
        entries: &'a [SurveyEntry],
        answers: &PriorAnswers,
        warnings: &mut Vec<CompileWarning>,
    ) -> Vec<CompiledElement<'a>> {
        let mut seen = HashSet::new();
        let mut compiled = Vec::with_capacity(entries.len());

        for (position, entry) in entries.iter().enumerate() {
            let mut skip = |kind: WarningKind| {
                let warning = CompileWarning {
                    position,
                    name: entry.declared_name().map(String::from),
                    kind,
                };
                warn!(%warning, "skipping survey element");
                warnings.push(warning);
            };

            let Some(element) = entry.element() else {
                skip(WarningKind::UnknownElement {
                    declared_type: entry.declared_type().map(String::from),
                });
                continue;
            };
            if !seen.insert(element.name()) {
                skip(WarningKind::DuplicateName);
                continue;
            }
            if element.options().is_some_and(|options| options.is_empty()) {
                skip(WarningKind::EmptyOptions);
                continue;
            }
            match generate_fragment(&self.engine, element, answers) {
                Ok(fragment) => compiled.push(CompiledElement { element, fragment }),
                Err(error) => skip(WarningKind::RenderFailed {
                    message: error.to_string(),
                }),
            }
        }

        compiled
    }

    fn fullscreen_stage(&self, settings: &AppSettings) -> Stage {
        let fullscreen = &settings.full_screen_settings;
        let html = self
            .engine
            .render(
                Template::Fullscreen,
                &json!({ "message": fullscreen.start_message }),
            )
            .unwrap_or_else(|error| {
                warn!(%error, "failed to render fullscreen message");
                String::new()
            });
        Stage {
            index: 0,
            name: FULLSCREEN_STAGE_NAME.into(),
            kind: StageKind::Fullscreen,
            container_id: String::new(),
            html,
            button_label: Some(fullscreen.start_button_text.clone()),
            elements: Vec::new(),
            hooks: StageHooks {
                on_load: Vec::new(),
                on_finish: FinishHook::EnterFullscreen,
            },
        }
    }

    fn next_step_stage(&self, settings: &AppSettings) -> Result<Stage, TemplateError> {
        let next = &settings.next_step_settings;
        let link = if is_safe_url(&next.link) {
            next.link.as_str()
        } else {
            "#"
        };
        let html = self.engine.render(
            Template::NextStep,
            &json!({
                "title": next.title,
                "description": render_markdown(&next.description),
                "link": link,
                "link_text": next.link_text,
            }),
        )?;
        Ok(Stage {
            index: 0,
            name: NEXT_STEP_STAGE_NAME.into(),
            kind: StageKind::NextStep,
            container_id: String::new(),
            html,
            button_label: None,
            elements: Vec::new(),
            hooks: StageHooks {
                on_load: Vec::new(),
                on_finish: FinishHook::Acknowledge,
            },
        })
    }
}

/// Compiles with a fresh [`Compiler`].
pub fn compile(
    settings: &AppSettings,
    prior: Option<&ExperimentResult>,
) -> Result<Timeline, TemplateError> {
    Ok(Compiler::new()?.compile(settings, prior))
}

fn container_id(index: usize) -> String {
    format!("survey-stage-{index}")
}

fn capture_of(element: &SurveyElement) -> Option<FieldCapture> {
    element.is_interactive().then(|| FieldCapture {
        name: element.name().to_string(),
        multiple: element.is_multi_select(),
    })
}

fn highlight_of(item: &CompiledElement<'_>) -> Option<LoadHook> {
    item.fragment
        .highlight_selection
        .then(|| LoadHook::HighlightSelection {
            container: String::new(),
            question: item.fragment.name.clone(),
        })
}

fn combined_stage(settings: &AppSettings, compiled: &[CompiledElement<'_>]) -> Stage {
    let html = compiled
        .iter()
        .map(|item| item.fragment.html.as_str())
        .collect::<String>();
    let fields = compiled
        .iter()
        .filter_map(|item| capture_of(item.element))
        .collect();
    Stage {
        index: 0,
        name: COMBINED_STAGE_NAME.into(),
        kind: StageKind::SurveyForm,
        container_id: String::new(),
        html,
        button_label: Some(settings.page_button_settings.finish_survey_text.clone()),
        elements: compiled.iter().map(|item| item.element.clone()).collect(),
        hooks: StageHooks {
            on_load: compiled.iter().filter_map(highlight_of).collect(),
            on_finish: FinishHook::Capture { fields },
        },
    }
}

fn paged_stage(settings: &AppSettings, item: &CompiledElement<'_>, is_last: bool) -> Stage {
    let buttons = &settings.page_button_settings;
    let (kind, button_label, hooks) = match (item.fragment.kind, item.element) {
        (FragmentKind::Information, SurveyElement::Text(text)) => {
            let delay = buttons.continue_delay();
            let on_load = if delay.is_zero() {
                Vec::new()
            } else {
                vec![LoadHook::GateContinue {
                    delay_ms: delay.as_millis().try_into().unwrap_or(u64::MAX),
                }]
            };
            let label = text
                .continue_button_text
                .clone()
                .filter(|label| !label.trim().is_empty())
                .unwrap_or_else(|| buttons.continue_button_text.clone());
            (
                StageKind::Information,
                label,
                StageHooks {
                    on_load,
                    on_finish: FinishHook::Acknowledge,
                },
            )
        }
        _ => {
            let label = if is_last {
                buttons.finish_survey_text.clone()
            } else {
                buttons.next_page_text.clone()
            };
            (
                StageKind::SurveyForm,
                label,
                StageHooks {
                    on_load: highlight_of(item).into_iter().collect(),
                    on_finish: FinishHook::Capture {
                        fields: capture_of(item.element).into_iter().collect(),
                    },
                },
            )
        }
    };
    Stage {
        index: 0,
        name: item.fragment.name.clone(),
        kind,
        container_id: String::new(),
        html: item.fragment.html.clone(),
        button_label: Some(button_label),
        elements: vec![item.element.clone()],
        hooks,
    }
}
