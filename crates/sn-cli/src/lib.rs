use std::ffi::OsString;
use std::path::Path;

use clap::Parser;
use sn_core::{NarrativeError, Value};
use tracing::info;

mod case_runner;
mod check;
mod cli_args;
mod config;
mod error_map;
mod line_tui;
mod logging;
mod models;
mod session_ops;
mod source_loader;
mod state_store;

pub(crate) use cli_args::{CaseArgs, CheckArgs, Cli, Mode, PlayArgs};
pub(crate) use config::{CliConfig, DEFAULT_LOG_FILTER};
pub(crate) use error_map::{
    emit_error, map_cli_config_invalid, map_cli_config_read, map_cli_output, map_cli_source_path,
    map_cli_state_invalid, map_cli_state_read, map_cli_state_write, map_error, map_tool_error,
    map_tui_io,
};
pub(crate) use logging::init_logging;
pub(crate) use models::{
    LoadedScripts, PlayContext, SaveFileV1, TuiCommandAction, DEFAULT_SAVE_FILE, SAVE_SCHEMA,
    SCRIPTS_DIR_PREFIX,
};
pub(crate) use session_ops::{load_session, save_session, start_session};
pub(crate) use source_loader::{load_scripts_by_dir, resolve_scripts_dir};
pub(crate) use state_store::{load_progress, load_world_state, save_progress};

const TARGET: &str = "sn::cli";

pub fn run_cli_from_args<I, T>(args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => {
            let _ = error.print();
            return error.exit_code();
        }
    };
    match run(cli) {
        Ok(code) => code,
        Err(error) => emit_error(error),
    }
}

fn run(cli: Cli) -> Result<i32, NarrativeError> {
    let (config, config_path) = CliConfig::load(cli.config.as_deref())?;
    init_logging(&config.log_filter);
    if let Some(path) = config_path {
        info!(target: TARGET, "Loaded config from {}", path.display());
    }

    match cli.command {
        Mode::Check(args) => check::run_check(args),
        Mode::Play(args) => run_play(args, &config),
        Mode::Case(args) => case_runner::run_case_command(args, &config),
    }
}

fn run_play(args: PlayArgs, config: &CliConfig) -> Result<i32, NarrativeError> {
    let scripts = load_scripts_by_dir(&args.scripts_dir)?;
    let state = match args.state_in.as_deref().or(config.state_file.as_deref()) {
        Some(path) => load_world_state(Path::new(path))?,
        None => Value::empty_map(),
    };
    let save_file = args
        .save_file
        .unwrap_or_else(|| DEFAULT_SAVE_FILE.to_string());
    let options = config.bus_options();
    let context = PlayContext {
        save_file: &save_file,
        scripts: &scripts,
        entry_script: &args.script,
        options: &options,
        stub_ai: config.auto_ai,
    };

    let mut session = start_session(&context, state)?;
    line_tui::run_play_line_mode(&context, &mut session)
}
