use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "sn-cli")]
#[command(about = "Storynet script checker, player and case runner")]
pub(crate) struct Cli {
    /// TOML config file. Defaults to ./storynet.toml when present.
    #[arg(long = "config", global = true)]
    pub(crate) config: Option<String>,
    #[command(subcommand)]
    pub(crate) command: Mode,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Mode {
    Check(CheckArgs),
    Play(PlayArgs),
    Case(CaseArgs),
}

#[derive(Debug, Args)]
pub(crate) struct CheckArgs {
    #[arg(long = "scripts-dir")]
    pub(crate) scripts_dir: String,
}

#[derive(Debug, Args)]
pub(crate) struct PlayArgs {
    #[arg(long = "scripts-dir")]
    pub(crate) scripts_dir: String,
    #[arg(long = "script")]
    pub(crate) script: String,
    /// Initial world state JSON. Overrides `state_file` from the config.
    #[arg(long = "state-in")]
    pub(crate) state_in: Option<String>,
    #[arg(long = "save-file")]
    pub(crate) save_file: Option<String>,
}

#[derive(Debug, Args)]
pub(crate) struct CaseArgs {
    #[arg(long = "case-dir")]
    pub(crate) case_dir: String,
    /// Defaults to testcase.json inside the case dir.
    #[arg(long = "case")]
    pub(crate) case: Option<String>,
}
