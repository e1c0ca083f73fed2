mod wizard;

use clap::{Parser, Subcommand, ValueEnum};
use component_survey::{
    check_settings, compile_timeline, export_results, get_response_schema, summarize_results,
    validate_answers,
};
use serde_json::{Value, json};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use survey_spec::{
    AppSettings, ExperimentResult, PriorAnswers, ResponseElement, RunOutcome, Session, Template,
    TemplateEngine, compile, run_timeline, settings_schema,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use wizard::{TerminalRuntime, Verbosity};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Survey compiler CLI",
    long_about = "Compiles survey settings into presentation stages, plays them in a terminal, and exports collected results"
)]
struct Cli {
    /// Log stage transitions and skipped elements (overridden by RUST_LOG).
    #[arg(long, global = true, alias = "debug")]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum OutputFormat {
    Json,
    Html,
}

#[derive(Subcommand)]
enum Command {
    /// Compile survey settings into a timeline of stages.
    Compile {
        /// Path to the settings JSON.
        #[arg(long, value_name = "SETTINGS")]
        settings: PathBuf,
        /// Optional stored result used to pre-fill answers.
        #[arg(long, value_name = "RESULT")]
        result: Option<PathBuf>,
        /// Emit the timeline as JSON or as a standalone HTML document.
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
        /// Write to a file instead of stdout.
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Take the survey in the terminal.
    Play {
        /// Path to the settings JSON.
        #[arg(long, value_name = "SETTINGS")]
        settings: PathBuf,
        /// Stored result to resume from.
        #[arg(long, value_name = "RESULT")]
        result: Option<PathBuf>,
        /// File the result is written to whenever it is flushed.
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
        /// Do not sleep through continue delays.
        #[arg(long)]
        no_wait: bool,
    },
    /// Check settings for authoring problems, and optionally a submission.
    Validate {
        /// Path to the settings JSON.
        #[arg(long, value_name = "SETTINGS")]
        settings: PathBuf,
        /// Path to a combined submission JSON object.
        #[arg(long, value_name = "ANSWERS")]
        answers: Option<PathBuf>,
    },
    /// Summarize stored results and export their trials.
    Export {
        /// JSON array of stored results.
        #[arg(long, value_name = "RESULTS")]
        results: PathBuf,
        /// Write the exported trials to a file instead of stdout.
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Print a JSON Schema: of the settings document, or of the responses of a survey.
    Schema {
        /// Settings whose response object should be described.
        #[arg(long, value_name = "SETTINGS")]
        settings: Option<PathBuf>,
    },
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.command {
        Command::Compile {
            settings,
            result,
            format,
            out,
        } => run_compile(settings, result, format, out),
        Command::Play {
            settings,
            result,
            out,
            no_wait,
        } => run_play(settings, result, out, no_wait, cli.verbose),
        Command::Validate { settings, answers } => run_validate(settings, answers),
        Command::Export { results, out } => run_export(results, out),
        Command::Schema { settings } => run_schema(settings),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn settings_config(path: &Path) -> CliResult<String> {
    let settings_json = fs::read_to_string(path)?;
    Ok(json!({ "settings_json": settings_json }).to_string())
}

fn read_optional(path: Option<&Path>) -> CliResult<String> {
    match path {
        Some(path) => Ok(fs::read_to_string(path)?),
        None => Ok(String::new()),
    }
}

fn parse_component_result(response: &str) -> CliResult<Value> {
    let value: Value = serde_json::from_str(response)?;
    if let Some(error) = value.get("error").and_then(Value::as_str) {
        Err(error.into())
    } else {
        Ok(value)
    }
}

fn emit(contents: &str, out: Option<&Path>) -> CliResult<()> {
    match out {
        Some(path) => {
            fs::write(path, contents)?;
            println!("Wrote {}", path.display());
        }
        None => println!("{}", contents),
    }
    Ok(())
}

fn run_compile(
    settings_path: PathBuf,
    result_path: Option<PathBuf>,
    format: OutputFormat,
    out: Option<PathBuf>,
) -> CliResult<()> {
    let config_json = settings_config(&settings_path)?;
    let prior_json = read_optional(result_path.as_deref())?;
    let timeline = parse_component_result(&compile_timeline(&config_json, &prior_json))?;

    if let Some(warnings) = timeline.get("warnings").and_then(Value::as_array) {
        for warning in warnings {
            eprintln!(
                "Skipped entry {} ({}): {}",
                warning["position"],
                warning["name"].as_str().unwrap_or("<unnamed>"),
                warning["code"].as_str().unwrap_or("unknown")
            );
        }
    }

    let contents = match format {
        OutputFormat::Json => serde_json::to_string_pretty(&timeline)?,
        OutputFormat::Html => render_document(&timeline)?,
    };
    emit(&contents, out.as_deref())
}

/// Lays every stage out in its own container; hooks travel as data attributes.
fn render_document(timeline: &Value) -> CliResult<String> {
    let stages = timeline["stages"]
        .as_array()
        .into_iter()
        .flatten()
        .map(|stage| {
            json!({
                "container_id": stage["container_id"],
                "name": stage["name"],
                "kind": stage["kind"],
                "hooks_json": stage["hooks"].to_string(),
                "html": stage["html"],
                "button_label": stage["button_label"],
            })
        })
        .collect::<Vec<_>>();
    let engine = TemplateEngine::new()?;
    Ok(engine.render(Template::Document, &json!({ "title": "Survey", "stages": stages }))?)
}

fn run_play(
    settings_path: PathBuf,
    result_path: Option<PathBuf>,
    out: Option<PathBuf>,
    no_wait: bool,
    verbose: bool,
) -> CliResult<()> {
    let settings = AppSettings::from_json(&fs::read_to_string(&settings_path)?)?;
    let prior = match result_path {
        Some(path) => Some(ExperimentResult::from_json(&fs::read_to_string(path)?)?),
        None => None,
    };
    let timeline = compile(&settings, prior.as_ref())?;
    for warning in &timeline.warnings {
        eprintln!("Skipped: {}", warning);
    }

    let sink_path = out.clone();
    let sink = move |trials: &[ResponseElement], settings: &AppSettings| {
        let Some(path) = &sink_path else {
            return;
        };
        if let Err(error) = write_result(path, settings, trials) {
            warn!(%error, path = %path.display(), "failed to persist result");
        }
    };

    let mut session = Session::new(timeline, settings.clone(), prior.as_ref(), sink);
    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut runtime = TerminalRuntime::new(
        settings,
        PriorAnswers::from_result(prior.as_ref()),
        stdin.lock(),
        stdout.lock(),
        Verbosity::from_verbose(verbose),
    );
    if no_wait {
        runtime = runtime.without_waiting();
    }

    let outcome = run_timeline(&mut session, &mut runtime)?;
    drop(runtime);
    info!(?outcome, trials = session.trials().len(), "session ended");

    match outcome {
        RunOutcome::Completed => println!("Done ✅"),
        RunOutcome::Unloaded => println!("Session left early; answers so far were kept."),
    }
    if out.is_none() {
        println!("{}", serde_json::to_string_pretty(&session.result())?);
    }
    Ok(())
}

fn write_result(path: &Path, settings: &AppSettings, trials: &[ResponseElement]) -> CliResult<()> {
    let result = ExperimentResult::with_trials(settings, trials.to_vec());
    let mut file = fs::File::create(path)?;
    file.write_all(serde_json::to_string_pretty(&result)?.as_bytes())?;
    file.write_all(b"\n")?;
    Ok(())
}

fn run_validate(settings_path: PathBuf, answers_path: Option<PathBuf>) -> CliResult<()> {
    let config_json = settings_config(&settings_path)?;
    let report = parse_component_result(&check_settings(&config_json))?;
    let mut valid = report["valid"].as_bool().unwrap_or(false);
    println!(
        "Settings: {}",
        if valid { "valid" } else { "invalid" }
    );
    for issue in report["issues"].as_array().into_iter().flatten() {
        println!(
            "  [{}] {}{}",
            issue["code"].as_str().unwrap_or("issue"),
            issue["name"]
                .as_str()
                .map(|name| format!("{}: ", name))
                .unwrap_or_default(),
            issue["message"].as_str().unwrap_or_default()
        );
    }

    if let Some(path) = answers_path {
        let answers_json = fs::read_to_string(path)?;
        let result = parse_component_result(&validate_answers(&config_json, &answers_json))?;
        let answers_valid = result["valid"].as_bool().unwrap_or(false);
        println!(
            "Answers: {}",
            if answers_valid { "valid" } else { "invalid" }
        );
        describe_validation(&result);
        valid &= answers_valid;
    }

    if valid {
        Ok(())
    } else {
        Err("validation failed".into())
    }
}

fn describe_validation(result: &Value) {
    let strings = |key: &str| {
        result[key]
            .as_array()
            .map(|values| {
                values
                    .iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_default()
    };
    if let Some(errors) = result["errors"].as_array().filter(|errors| !errors.is_empty()) {
        println!("Errors:");
        for error in errors {
            println!(
                "  {} - {}",
                error["path"].as_str().unwrap_or("<unknown>"),
                error["message"].as_str().unwrap_or("validation failed")
            );
        }
    }
    let missing = strings("missing_required");
    if !missing.is_empty() {
        println!("Missing required answers: {}", missing);
    }
    let unknown = strings("unknown_fields");
    if !unknown.is_empty() {
        println!("Unknown answer fields: {}", unknown);
    }
}

fn run_export(results_path: PathBuf, out: Option<PathBuf>) -> CliResult<()> {
    let results_json = fs::read_to_string(results_path)?;
    let summary = parse_component_result(&summarize_results(&results_json))?;
    let exported = parse_component_result(&export_results(&results_json))?;

    eprintln!("{:<24} {:>8} {:>8}", "User", "Pages", "Trials");
    for row in summary.as_array().into_iter().flatten() {
        eprintln!(
            "{:<24} {:>8} {:>8}",
            row["respondent"].as_str().unwrap_or("-"),
            row["page_count"]
                .as_u64()
                .map(|count| count.to_string())
                .unwrap_or_else(|| "-".into()),
            row["trial_count"].as_u64().unwrap_or(0)
        );
    }

    emit(&serde_json::to_string_pretty(&exported)?, out.as_deref())
}

fn run_schema(settings_path: Option<PathBuf>) -> CliResult<()> {
    let schema = match settings_path {
        Some(path) => parse_component_result(&get_response_schema(&settings_config(&path)?))?,
        None => settings_schema()?,
    };
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const BASIC: &str = include_str!("../../survey-spec/tests/fixtures/basic_survey.json");

    #[test]
    fn document_wraps_each_stage() -> CliResult<()> {
        let timeline = json!({
            "stages": [
                { "container_id": "survey-stage-0", "name": "combined_survey", "kind": "survey_form",
                  "html": "<p>q</p>", "button_label": "Finish <now>", "hooks": { "on_load": [] } },
                { "container_id": "survey-stage-1", "name": "next_step", "kind": "next_step",
                  "html": "<a>bye</a>", "button_label": null, "hooks": { "on_load": [] } }
            ]
        });
        let document = render_document(&timeline)?;
        assert!(document.contains(r#"<section id="survey-stage-0" data-stage="combined_survey""#));
        assert!(document.contains(r#"data-hooks="{&quot;on_load&quot;:[]}""#));
        assert!(document.contains("<p>q</p>"));
        assert!(document.contains("Finish &lt;now&gt;"));
        assert!(document.contains(r#"<section id="survey-stage-1""#));
        assert_eq!(document.matches("<button").count(), 1);
        Ok(())
    }

    #[test]
    fn write_result_overwrites_previous_flush() -> CliResult<()> {
        let file = tempfile::NamedTempFile::new()?;
        let settings = AppSettings::from_json(BASIC)?;
        write_result(file.path(), &settings, &[ResponseElement::named("first")])?;
        write_result(file.path(), &settings, &[])?;

        let stored = ExperimentResult::from_json(&std::fs::read_to_string(file.path())?)?;
        assert!(stored.trials().is_empty());
        assert!(stored.settings.is_some());
        Ok(())
    }
}
