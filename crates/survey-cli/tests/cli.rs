use assert_cmd::Command;
use assert_fs::prelude::*;
use serde_json::{Value, json};

type TestResult = Result<(), Box<dyn std::error::Error>>;

const BASIC: &str = include_str!("../../survey-spec/tests/fixtures/basic_survey.json");

fn survey() -> Command {
    Command::cargo_bin("survey").expect("binary")
}

#[test]
fn compile_command_prints_timeline() -> TestResult {
    let temp = assert_fs::TempDir::new()?;
    let settings = temp.child("settings.json");
    settings.write_str(BASIC)?;

    let output = survey()
        .arg("compile")
        .arg("--settings")
        .arg(settings.path())
        .output()?;
    assert!(output.status.success());
    let timeline: Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(timeline["mode"], "combined");
    assert_eq!(timeline["stages"][0]["name"], "combined_survey");
    Ok(())
}

#[test]
fn compile_command_renders_html_document() -> TestResult {
    let temp = assert_fs::TempDir::new()?;
    let settings = temp.child("settings.json");
    settings.write_str(BASIC)?;
    let out = temp.child("survey.html");

    survey()
        .arg("compile")
        .arg("--settings")
        .arg(settings.path())
        .arg("--format")
        .arg("html")
        .arg("--out")
        .arg(out.path())
        .assert()
        .success();

    let document = std::fs::read_to_string(out.path())?;
    assert!(document.starts_with("<!DOCTYPE html>"));
    assert!(document.contains(r#"<section id="survey-stage-0" data-stage="combined_survey""#));
    assert!(document.contains(r#"name="q1""#));
    Ok(())
}

#[test]
fn play_command_writes_result_file() -> TestResult {
    let temp = assert_fs::TempDir::new()?;
    let settings = temp.child("settings.json");
    settings.write_str(BASIC)?;
    let out = temp.child("result.json");

    survey()
        .arg("play")
        .arg("--settings")
        .arg(settings.path())
        .arg("--out")
        .arg(out.path())
        .write_stdin("hello\n2\n")
        .assert()
        .success();

    let result: Value = serde_json::from_str(&std::fs::read_to_string(out.path())?)?;
    let trial = &result["rawData"]["trials"][0];
    assert_eq!(trial["name"], "combined_survey");
    assert_eq!(trial["response"], json!({ "q1": "hello", "q2": "B" }));
    assert!(result["settings"]["surveySettings"].is_object());
    Ok(())
}

#[test]
fn play_command_resumes_with_stored_answers() -> TestResult {
    let temp = assert_fs::TempDir::new()?;
    let settings = temp.child("settings.json");
    settings.write_str(BASIC)?;
    let prior = temp.child("prior.json");
    prior.write_str(
        &json!({
            "rawData": { "trials": [
                { "name": "combined_survey", "response": { "q1": "before", "q2": "A" } }
            ]}
        })
        .to_string(),
    )?;
    let out = temp.child("result.json");

    // blank lines keep the stored answers
    survey()
        .arg("play")
        .arg("--settings")
        .arg(settings.path())
        .arg("--result")
        .arg(prior.path())
        .arg("--out")
        .arg(out.path())
        .write_stdin("\n\n")
        .assert()
        .success();

    let result: Value = serde_json::from_str(&std::fs::read_to_string(out.path())?)?;
    assert_eq!(
        result["rawData"]["trials"][0]["response"],
        json!({ "q1": "before", "q2": "A" })
    );
    Ok(())
}

#[test]
fn validate_command_fails_on_missing_answers() -> TestResult {
    let temp = assert_fs::TempDir::new()?;
    let settings = temp.child("settings.json");
    settings.write_str(BASIC)?;
    let answers = temp.child("answers.json");
    answers.write_str(r#"{"q2":"B"}"#)?;

    let output = survey()
        .arg("validate")
        .arg("--settings")
        .arg(settings.path())
        .arg("--answers")
        .arg(answers.path())
        .output()?;
    assert!(!output.status.success());
    let stdout = String::from_utf8(output.stdout)?;
    assert!(stdout.contains("Settings: valid"));
    assert!(stdout.contains("Missing required answers: q1"));
    Ok(())
}

#[test]
fn validate_command_rejects_malformed_answers() -> TestResult {
    let temp = assert_fs::TempDir::new()?;
    let settings = temp.child("settings.json");
    settings.write_str(BASIC)?;
    let answers = temp.child("answers.json");
    answers.write_str("{not json")?;

    let output = survey()
        .arg("validate")
        .arg("--settings")
        .arg(settings.path())
        .arg("--answers")
        .arg(answers.path())
        .output()?;
    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr)?;
    assert!(stderr.contains("failed to parse input"));
    Ok(())
}

#[test]
fn export_command_writes_trial_arrays() -> TestResult {
    let temp = assert_fs::TempDir::new()?;
    let results = temp.child("results.json");
    results.write_str(
        &json!([
            { "respondent": "alice", "data": { "rawData": { "trials": [ { "name": "q1" } ] } } },
            { "respondent": "bob", "data": {} }
        ])
        .to_string(),
    )?;
    let out = temp.child("export.json");

    let output = survey()
        .arg("export")
        .arg("--results")
        .arg(results.path())
        .arg("--out")
        .arg(out.path())
        .output()?;
    assert!(output.status.success());
    let table = String::from_utf8(output.stderr)?;
    assert!(table.contains("alice"));
    let exported: Value = serde_json::from_str(&std::fs::read_to_string(out.path())?)?;
    assert_eq!(exported, json!([[{ "name": "q1" }]]));
    Ok(())
}

#[test]
fn schema_command_describes_settings() -> TestResult {
    let output = survey().arg("schema").output()?;
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout)?;
    assert!(stdout.contains("surveySettings"));
    Ok(())
}
