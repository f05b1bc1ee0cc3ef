//! CLI command implementations
//!
//! Both commands load definitions from a forms directory, read one JSON
//! request from stdin and print one JSON response. Submissions run against
//! an in-memory store that lives for the duration of the command.

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::PipelineConfig;
use crate::observability::{LogTarget, Logger};
use crate::schema::{FormId, FormLoader, RawSubmission};
use crate::store::MemoryStore;
use crate::submission::{EntryService, PipelineBuilder, SubmissionEntry};

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::{read_request, write_error, write_response};

/// Body of a `submit` request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitRequest {
    form_id: FormId,
    #[serde(default)]
    title: String,
    #[serde(default)]
    data: RawSubmission,
}

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
///
/// Log lines go to stderr so stdout carries only the JSON response.
pub fn run() -> CliResult<()> {
    Logger::set_target(LogTarget::Stderr);
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    let mut stdin = io::stdin().lock();
    let mut stdout = io::stdout().lock();

    match cmd {
        Command::Validate {
            forms_dir,
            form,
            config,
        } => validate(
            forms_dir.as_deref(),
            config.as_deref(),
            &form,
            &mut stdin,
            &mut stdout,
        ),
        Command::Submit { forms_dir, config } => submit(
            forms_dir.as_deref(),
            config.as_deref(),
            &mut stdin,
            &mut stdout,
        ),
    }
}

/// Validate a raw submission against the form with `handle`
///
/// Prints `{"form", "valid", "errors"}`; a failing submission is not a CLI error.
pub fn validate<R: Read, W: Write>(
    forms_dir: Option<&Path>,
    config_path: Option<&Path>,
    handle: &str,
    input: &mut R,
    out: &mut W,
) -> CliResult<()> {
    let config = load_config(config_path)?;
    let service = build_service(forms_dir, config)?;

    let Some(form) = service.form_by_handle(handle)? else {
        let message = format!("Form '{}' not found", handle);
        write_error(out, "FORMENTRY_FORM_NOT_FOUND", &message)?;
        return Err(CliError::bad_request(message));
    };

    let raw: RawSubmission = serde_json::from_value(read_request(input)?)?;
    let errors = service.validate_entry(form.id, &raw)?;

    write_response(
        out,
        json!({
            "form": form.handle,
            "valid": errors.is_empty(),
            "errors": errors,
        }),
    )
}

/// Run one submission through the pipeline and print its outcome
pub fn submit<R: Read, W: Write>(
    forms_dir: Option<&Path>,
    config_path: Option<&Path>,
    input: &mut R,
    out: &mut W,
) -> CliResult<()> {
    let config = load_config(config_path)?;
    let service = build_service(forms_dir, config)?;

    let request: SubmitRequest = serde_json::from_value(read_request(input)?)?;
    let mut entry = SubmissionEntry::new(request.form_id, request.title, request.data);

    match service.process_submission(&mut entry) {
        Ok(outcome) => {
            let mut data = serde_json::to_value(&outcome)?;
            if let Value::Object(map) = &mut data {
                map.insert("accepted".to_string(), json!(outcome.is_accepted()));
            }
            write_response(out, data)
        }
        Err(e) => {
            write_error(out, e.code(), &e.to_string())?;
            Err(e.into())
        }
    }
}

fn load_config(path: Option<&Path>) -> CliResult<PipelineConfig> {
    match path {
        Some(path) => Ok(PipelineConfig::load(path)?),
        None => Ok(PipelineConfig::default()),
    }
}

/// `--forms-dir` wins over the config file's `forms_dir`
fn resolve_forms_dir(arg: Option<&Path>, config: &PipelineConfig) -> CliResult<PathBuf> {
    arg.map(Path::to_path_buf)
        .or_else(|| config.forms_dir.clone())
        .ok_or_else(|| {
            CliError::config_error("No forms directory: pass --forms-dir or set forms_dir")
        })
}

fn build_service(forms_dir: Option<&Path>, config: PipelineConfig) -> CliResult<EntryService> {
    let dir = resolve_forms_dir(forms_dir, &config)?;
    let mut loader = FormLoader::new(&dir);
    loader.load_all()?;

    let store = Arc::new(MemoryStore::with_record_rules(config.record_rules()));
    let pipeline = PipelineBuilder::with_store(Arc::new(loader), store)
        .with_config(config)?
        .build();

    Ok(EntryService::new(pipeline))
}
