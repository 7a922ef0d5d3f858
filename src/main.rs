#![forbid(unsafe_code)]

mod config;
mod constants;
mod derive;
mod editor;
mod error;
mod gui;
mod orchestrator;
mod persistence;
mod reconcile;
mod schema;
mod service;
mod session;
mod transfer;
mod values;

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use tokio::runtime::Runtime;
use tracing::{Level as TraceLevel, info, warn};
use tracing_subscriber::FmtSubscriber;

use config::Settings;
use constants::options::DEFAULT_SENTINEL;
use editor::{Editor, Selection, TextBuffer};
use error::UnknownOptionWarning;
use orchestrator::{PendingRequest, UpdateOutcome};
use persistence::{ConfigStateStore, KeyValueStore};
use schema::ControlKind;
use service::FormatClient;
use session::AppState;
use values::OptionValue;

#[derive(Parser, Debug)]
#[command(
    name = "clang-format-configurator",
    version,
    about = "Build a .clang-format file against a live clang-format service"
)]
struct Cli {
    /// Base URL of the format service
    #[arg(long, global = true)]
    url: Option<String>,

    /// Port of the format service
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Keep state in memory instead of the state file
    #[arg(long, global = true)]
    ephemeral: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open the configurator window (default)
    Gui,
    /// List the clang-format versions the service offers
    Versions,
    /// List options with their control kind and current value
    Options {
        /// Version to list instead of the active one
        #[arg(long)]
        version: Option<String>,
    },
    /// Set options of the active version
    Set {
        #[arg(required = true, value_name = "NAME=VALUE")]
        assignments: Vec<String>,
    },
    /// Return options to their default
    Unset {
        #[arg(required = true, value_name = "NAME")]
        names: Vec<String>,
    },
    /// Switch the active version, carrying over shared options
    UseVersion { version: String },
    /// Format a file (or the saved source) and print the result
    Format {
        file: Option<PathBuf>,
        /// Zero-based line span to format, e.g. `3:10`
        #[arg(long, value_name = "FIRST:LAST")]
        lines: Option<String>,
    },
    /// Merge a .clang-format file into the active version
    Import { file: PathBuf },
    /// Write the configuration as YAML (stdout when FILE is omitted)
    Export { file: Option<PathBuf> },
    /// Forget the saved source and options
    Reset,
}

/// Everything a one-shot command needs once the schema is loaded
struct CliSession {
    runtime: Runtime,
    client: FormatClient,
    state: AppState<Box<dyn KeyValueStore>>,
    editor: TextBuffer,
}

impl CliSession {
    fn open(settings: &Settings, state_path: Option<PathBuf>) -> Result<Self> {
        let runtime = Runtime::new().context("Failed to start async runtime")?;
        let client = FormatClient::from_settings(settings)?;
        let schema = runtime
            .block_on(client.fetch_schema())
            .with_context(|| format!("Could not load the option schema from {}", client.base_url()))?;

        let store = ConfigStateStore::new(persistence::open_store(state_path));
        let (state, source, warnings) = AppState::initialize(schema, store);
        print_warnings(&warnings);

        Ok(Self {
            runtime,
            client,
            state,
            editor: TextBuffer::new(source),
        })
    }

    /// Run one request to completion and apply its result
    fn run(&mut self, pending: PendingRequest) -> Result<()> {
        let result = self
            .runtime
            .block_on(self.client.format(&pending.format_request()));
        match self.state.complete_update(pending.seq, result, &mut self.editor) {
            UpdateOutcome::Applied => Ok(()),
            UpdateOutcome::Superseded => Err(anyhow!("format request {} was superseded", pending.seq)),
            UpdateOutcome::Failed(err) => Err(err.into()),
        }
    }

    /// Run a request, keeping the option change even when the service rejects it
    fn run_and_persist(&mut self, pending: PendingRequest) -> Result<()> {
        if let Err(err) = self.run(pending) {
            warn!(error = %err, "Format request failed, saving options anyway");
            eprintln!("warning: {err}");
            self.state.persist(self.editor.text())?;
        }
        Ok(())
    }

    fn versions(&self) {
        let active = self.state.active_version();
        for version in self.state.schema().versions() {
            let marker = if active == Some(version.as_str()) { "*" } else { " " };
            println!("{marker} {version}");
        }
    }

    fn options(&self, version: Option<String>) -> Result<()> {
        let active = self.state.active_version().unwrap_or_default().to_string();
        let version = version.unwrap_or_else(|| active.clone());
        let options = self
            .state
            .schema()
            .options_for(&version)
            .ok_or_else(|| anyhow!("unknown version {version:?}"))?;

        for (name, spec) in options {
            let kind = match spec.control() {
                ControlKind::Select(choices) => choices.join("|"),
                ControlKind::Text => "text".to_string(),
                ControlKind::Number { min: Some(min) } => format!("number >= {min}"),
                ControlKind::Number { min: None } => "number".to_string(),
            };
            let value = if version == active {
                self.state.values().get(name).map(OptionValue::display)
            } else {
                None
            };
            println!(
                "{name:<48} {kind:<32} {}",
                value.as_deref().unwrap_or(DEFAULT_SENTINEL)
            );
        }
        Ok(())
    }

    fn set(&mut self, assignments: &[String]) -> Result<()> {
        for assignment in assignments {
            let (name, value) = assignment
                .split_once('=')
                .ok_or_else(|| anyhow!("expected NAME=VALUE, got {assignment:?}"))?;
            self.set_one(name.trim(), value.trim())?;
        }
        self.state.persist(self.editor.text())
    }

    fn unset(&mut self, names: &[String]) -> Result<()> {
        for name in names {
            self.set_one(name.trim(), DEFAULT_SENTINEL)?;
        }
        self.state.persist(self.editor.text())
    }

    fn set_one(&mut self, name: &str, value: &str) -> Result<()> {
        let version = self.state.active_version().unwrap_or_default();
        if self.state.schema().spec(version, name).is_none() {
            bail!("{name} is not an option of clang-format {version}");
        }
        if !self.state.set_option(name, OptionValue::text(value)) {
            info!(option = %name, "Option already has that value");
        }
        Ok(())
    }

    fn use_version(&mut self, version: &str) -> Result<()> {
        match self.state.switch_version(version, &self.editor)? {
            Some(transition) => {
                print_warnings(&transition.warnings);
                self.run_and_persist(transition.pending)?;
                println!("Now using clang-format {version}");
            }
            None => println!("Already using clang-format {version}"),
        }
        Ok(())
    }

    fn format(&mut self, file: Option<PathBuf>, lines: Option<String>) -> Result<()> {
        if let Some(path) = file {
            let text = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {:?}", path))?;
            self.editor.set_text(text);
        }
        if let Some(lines) = lines {
            self.editor.set_selection(parse_lines(&lines)?);
        }

        let pending = self.state.begin_update(&self.editor)?;
        self.run(pending)?;
        print!("{}", self.editor.text());
        Ok(())
    }

    fn import(&mut self, path: PathBuf) -> Result<()> {
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {:?}", path))?;
        let transition = self.state.import(&contents, &self.editor)?;
        print_warnings(&transition.warnings);
        self.run_and_persist(transition.pending)
    }

    fn export(&self, file: Option<PathBuf>) -> Result<()> {
        let yaml = self.state.export()?;
        match file {
            Some(path) => {
                fs::write(&path, yaml).with_context(|| format!("Failed to write {:?}", path))?;
                info!(path = %path.display(), "Exported configuration");
            }
            None => print!("{yaml}"),
        }
        Ok(())
    }
}

/// Parse `FIRST:LAST` into a whole-line selection
fn parse_lines(raw: &str) -> Result<Selection> {
    let (first, last) = raw
        .split_once(':')
        .ok_or_else(|| anyhow!("expected FIRST:LAST, got {raw:?}"))?;
    let first: usize = first.trim().parse().with_context(|| format!("bad line number {first:?}"))?;
    let last: usize = last.trim().parse().with_context(|| format!("bad line number {last:?}"))?;
    Ok(Selection::lines(first.min(last), first.max(last)))
}

fn print_warnings(warnings: &[UnknownOptionWarning]) {
    for warning in warnings {
        eprintln!("warning: {warning}");
    }
}

fn main() -> Result<()> {
    // Parse log level from environment variable
    let log_level = match std::env::var("LOG_LEVEL")
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    };

    // stdout carries command output
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    let mut settings = Settings::load();
    settings.apply_env();
    settings.apply_overrides(cli.url, cli.port);
    info!(endpoint = %settings.endpoint(), "Loaded settings");

    let state_path = (!cli.ephemeral).then(|| settings.state_file());

    match cli.command.unwrap_or(Command::Gui) {
        Command::Gui => gui::run_gui(settings, state_path),
        Command::Reset => {
            ConfigStateStore::new(persistence::open_store(state_path)).clear()?;
            println!("Saved source and options cleared");
            Ok(())
        }
        Command::Versions => {
            CliSession::open(&settings, state_path)?.versions();
            Ok(())
        }
        Command::Options { version } => CliSession::open(&settings, state_path)?.options(version),
        Command::Set { assignments } => CliSession::open(&settings, state_path)?.set(&assignments),
        Command::Unset { names } => CliSession::open(&settings, state_path)?.unset(&names),
        Command::UseVersion { version } => {
            CliSession::open(&settings, state_path)?.use_version(&version)
        }
        Command::Format { file, lines } => {
            CliSession::open(&settings, state_path)?.format(file, lines)
        }
        Command::Import { file } => CliSession::open(&settings, state_path)?.import(file),
        Command::Export { file } => CliSession::open(&settings, state_path)?.export(file),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lines() {
        assert_eq!(parse_lines("3:10").unwrap(), Selection::lines(3, 10));
        assert_eq!(parse_lines(" 10 : 3 ").unwrap(), Selection::lines(3, 10));
        assert!(parse_lines("3").is_err());
        assert!(parse_lines("a:b").is_err());
    }

    #[test]
    fn test_cli_defaults_to_gui() {
        let cli = Cli::try_parse_from(["clang-format-configurator"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.ephemeral);
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "clang-format-configurator",
            "set",
            "ColumnLimit=100",
            "--port",
            "9000",
            "--ephemeral",
        ])
        .unwrap();
        assert_eq!(cli.port, Some(9000));
        assert!(cli.ephemeral);
        assert!(matches!(
            cli.command,
            Some(Command::Set { ref assignments }) if assignments == &["ColumnLimit=100".to_string()]
        ));
    }

    #[test]
    fn test_cli_set_requires_assignment() {
        assert!(Cli::try_parse_from(["clang-format-configurator", "set"]).is_err());
    }

    #[test]
    fn test_cli_use_version_subcommand_name() {
        let cli = Cli::try_parse_from(["clang-format-configurator", "use-version", "18"]).unwrap();
        assert!(matches!(cli.command, Some(Command::UseVersion { ref version }) if version == "18"));
    }
}
