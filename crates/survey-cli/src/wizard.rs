use std::io::{BufRead, Write};
use std::thread;

use serde_json::{Map, Value};
use survey_spec::{
    AnswerType, AppSettings, PresentationRuntime, PriorAnswers, RuntimeError, SessionError, Stage,
    StageAction, StageContext, StageKind, SurveyElement,
};

/// Controls which bits of state the player prints.
#[derive(Copy, Clone, Eq, PartialEq)]
pub enum Verbosity {
    /// Clean output: stage content and prompts only.
    Clean,
    /// Verbose output: stage names, hooks, error details.
    Verbose,
}

impl Verbosity {
    pub fn from_verbose(verbose: bool) -> Self {
        if verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Clean
        }
    }

    pub fn is_verbose(&self) -> bool {
        matches!(self, Verbosity::Verbose)
    }
}

/// Presents stages as plain text and reads answers line by line.
///
/// Typing `exit`, or closing the input, unloads the session.
pub struct TerminalRuntime<R, W> {
    settings: AppSettings,
    prior: PriorAnswers,
    input: R,
    output: W,
    verbosity: Verbosity,
    wait_for_continue: bool,
}

enum Line {
    Text(String),
    Exit,
}

impl<R: BufRead, W: Write> TerminalRuntime<R, W> {
    pub fn new(settings: AppSettings, prior: PriorAnswers, input: R, output: W, verbosity: Verbosity) -> Self {
        Self {
            settings,
            prior,
            input,
            output,
            verbosity,
            wait_for_continue: true,
        }
    }

    /// Skips sleeping through continue gates; the session still enforces them.
    pub fn without_waiting(mut self) -> Self {
        self.wait_for_continue = false;
        self
    }

    fn read_line(&mut self) -> Result<Line, RuntimeError> {
        write!(self.output, "> ")?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(Line::Exit);
        }
        let trimmed = line.trim();
        if trimmed.eq_ignore_ascii_case("exit") {
            Ok(Line::Exit)
        } else {
            Ok(Line::Text(trimmed.to_string()))
        }
    }

    fn show_header(&mut self, stage: &Stage, context: &StageContext) -> Result<(), RuntimeError> {
        if context.progress.visible {
            writeln!(
                self.output,
                "[{}/{}]",
                context.progress.completed + 1,
                context.progress.total
            )?;
        }
        if self.verbosity.is_verbose() {
            writeln!(
                self.output,
                "Stage {} '{}' ({})",
                stage.index,
                stage.name,
                stage.kind.trial_type()
            )?;
        }
        Ok(())
    }

    fn present_fullscreen(&mut self, stage: &Stage) -> Result<StageAction, RuntimeError> {
        writeln!(self.output, "{}", self.settings.full_screen_settings.start_message)?;
        let label = stage.button_label.as_deref().unwrap_or("Start");
        writeln!(self.output, "Press Enter to {}", label.to_lowercase())?;
        match self.read_line()? {
            Line::Exit => Ok(StageAction::Unload),
            Line::Text(_) => Ok(StageAction::Start),
        }
    }

    fn present_information(
        &mut self,
        stage: &Stage,
        context: &StageContext,
    ) -> Result<StageAction, RuntimeError> {
        for element in &stage.elements {
            if let SurveyElement::Text(text) = element {
                writeln!(self.output, "{}", text.title)?;
                if !text.description.is_empty() {
                    writeln!(self.output, "{}", text.description)?;
                }
            }
        }
        if self.wait_for_continue && !context.continue_in.is_zero() {
            writeln!(
                self.output,
                "Please wait {:.1}s before continuing...",
                context.continue_in.as_secs_f64()
            )?;
            self.output.flush()?;
            thread::sleep(context.continue_in);
        }
        let label = stage.button_label.as_deref().unwrap_or("Continue");
        writeln!(self.output, "Press Enter to {}", label.to_lowercase())?;
        match self.read_line()? {
            Line::Exit => Ok(StageAction::Unload),
            Line::Text(_) => Ok(StageAction::Continue),
        }
    }

    fn present_form(&mut self, stage: &Stage) -> Result<StageAction, RuntimeError> {
        let mut submission = Map::new();
        for element in &stage.elements {
            if !element.is_interactive() {
                continue;
            }
            match self.prompt_element(element)? {
                Some(value) => {
                    submission.insert(element.name().to_string(), value);
                }
                None => return Ok(StageAction::Unload),
            }
        }
        if let Some(label) = &stage.button_label {
            writeln!(self.output, "({})", label)?;
        }
        Ok(StageAction::Submit(submission))
    }

    fn present_next_step(&mut self) -> Result<StageAction, RuntimeError> {
        let next = &self.settings.next_step_settings;
        writeln!(self.output, "{}", next.title)?;
        if !next.description.is_empty() {
            writeln!(self.output, "{}", next.description)?;
        }
        writeln!(self.output, "{}: {}", next.link_text, next.link)?;
        writeln!(self.output, "Press Enter to close")?;
        match self.read_line()? {
            Line::Exit => Ok(StageAction::Unload),
            Line::Text(_) => Ok(StageAction::Dismiss),
        }
    }

    /// Prompts until the answer parses; `None` when the respondent leaves.
    fn prompt_element(&mut self, element: &SurveyElement) -> Result<Option<Value>, RuntimeError> {
        let prompt = PromptContext::new(element, &self.prior);
        loop {
            self.show_prompt(&prompt)?;
            let raw = match self.read_line()? {
                Line::Exit => return Ok(None),
                Line::Text(raw) => raw,
            };
            match parse_answer(element, &raw, prompt.default.as_deref()) {
                Ok(value) => return Ok(Some(value)),
                Err(err) => self.show_parse_error(&err),
            }
        }
    }

    fn show_prompt(&mut self, prompt: &PromptContext) -> Result<(), RuntimeError> {
        let mut line = prompt.title.clone();
        if prompt.required {
            line.push_str(" *");
        }
        if let Some(hint) = &prompt.hint {
            line.push(' ');
            line.push_str(hint);
        }
        if let Some(default) = &prompt.default {
            line.push_str(&format!(" [{}]", default));
        }
        writeln!(self.output, "{}", line)?;
        if let Some(description) = &prompt.description {
            writeln!(self.output, "{}", description)?;
        }
        for (position, choice) in prompt.choices.iter().enumerate() {
            writeln!(self.output, "  {}) {}", position + 1, choice)?;
        }
        Ok(())
    }

    fn show_parse_error(&self, error: &AnswerParseError) {
        eprintln!("Invalid answer: {}", error.user_message);
        if self.verbosity.is_verbose()
            && let Some(debug) = &error.debug_message
        {
            eprintln!("  Expected: {}", debug);
        }
    }
}

impl<R: BufRead, W: Write> PresentationRuntime for TerminalRuntime<R, W> {
    fn present(&mut self, stage: &Stage, context: &StageContext) -> Result<StageAction, RuntimeError> {
        self.show_header(stage, context)?;
        match stage.kind {
            StageKind::Fullscreen => self.present_fullscreen(stage),
            StageKind::SurveyForm => self.present_form(stage),
            StageKind::Information => self.present_information(stage, context),
            StageKind::NextStep => self.present_next_step(),
        }
    }

    fn rejected(&mut self, _stage: &Stage, error: &SessionError) {
        match error {
            SessionError::Invalid(result) => {
                if !result.missing_required.is_empty() {
                    eprintln!(
                        "Missing required answers for: {}",
                        result.missing_required.join(", ")
                    );
                }
                for error in &result.errors {
                    eprintln!(
                        "  {}: {}",
                        error.question_id.as_deref().unwrap_or("<unknown>"),
                        error.message
                    );
                }
            }
            other => eprintln!("{}", other),
        }
    }
}

/// Context used to format a single prompt.
pub struct PromptContext {
    pub title: String,
    pub description: Option<String>,
    pub required: bool,
    pub hint: Option<String>,
    pub choices: Vec<String>,
    /// Previously stored answer, offered as the default.
    pub default: Option<String>,
}

impl PromptContext {
    pub fn new(element: &SurveyElement, prior: &PriorAnswers) -> Self {
        let choices = element.options().map(<[String]>::to_vec).unwrap_or_default();
        let default = if element.is_multi_select() {
            let selected = prior.selections(element.name());
            (!selected.is_empty()).then(|| selected.join(","))
        } else {
            prior.text(element.name()).filter(|value| !value.is_empty())
        };
        Self {
            title: element.heading().to_string(),
            description: Some(element.description())
                .filter(|description| !description.is_empty())
                .map(String::from),
            required: element.is_mandatory(),
            hint: hint_for(element),
            choices,
            default,
        }
    }
}

fn hint_for(element: &SurveyElement) -> Option<String> {
    match element {
        SurveyElement::ShortAnswer(short) => match short.answer_type {
            AnswerType::Text => None,
            AnswerType::Number => Some("(number)".to_string()),
            AnswerType::Date => Some("(YYYY-MM-DD)".to_string()),
            AnswerType::Month => Some("(YYYY-MM)".to_string()),
        },
        SurveyElement::MultiAnswer(_) => Some("(numbers or values, comma separated)".to_string()),
        SurveyElement::MultipleChoice(_) | SurveyElement::LikertScale(_) => {
            Some("(number or value)".to_string())
        }
        _ => None,
    }
}

/// Error produced when parsing answers from the user.
#[derive(Debug)]
pub struct AnswerParseError {
    pub user_message: String,
    pub debug_message: Option<String>,
}

impl AnswerParseError {
    pub fn new(user_message: impl Into<String>, debug_message: Option<String>) -> Self {
        Self {
            user_message: user_message.into(),
            debug_message,
        }
    }
}

/// Turns a typed line into the value a submitted form would carry.
/// Blank input falls back to `default`; mandatory checks are left to the
/// session.
pub fn parse_answer(
    element: &SurveyElement,
    raw: &str,
    default: Option<&str>,
) -> Result<Value, AnswerParseError> {
    let raw = if raw.trim().is_empty() {
        default.unwrap_or("").trim()
    } else {
        raw.trim()
    };

    match element {
        SurveyElement::MultipleChoice(_) | SurveyElement::LikertScale(_) => {
            if raw.is_empty() {
                return Ok(Value::String(String::new()));
            }
            parse_choice(element.options().unwrap_or_default(), raw).map(Value::String)
        }
        SurveyElement::MultiAnswer(multi) => {
            let mut selected = Vec::new();
            for part in raw.split(',').map(str::trim).filter(|part| !part.is_empty()) {
                let choice = parse_choice(&multi.answers, part)?;
                if !selected.contains(&choice) {
                    selected.push(choice);
                }
            }
            // keep option order
            let ordered = multi
                .answers
                .iter()
                .filter(|option| selected.contains(option))
                .cloned()
                .map(Value::String)
                .collect();
            Ok(Value::Array(ordered))
        }
        _ => Ok(Value::String(raw.to_string())),
    }
}

fn parse_choice(options: &[String], raw: &str) -> Result<String, AnswerParseError> {
    if let Ok(position) = raw.parse::<usize>()
        && let Some(choice) = position.checked_sub(1).and_then(|index| options.get(index))
    {
        return Ok(choice.clone());
    }
    options
        .iter()
        .find(|option| option.eq_ignore_ascii_case(raw))
        .cloned()
        .ok_or_else(|| {
            AnswerParseError::new(
                format!("Choose one of: {}.", options.join(", ")),
                Some(format!("allowed values: {}", options.join(", "))),
            )
        })
}
