//! Purpose: `petpact` CLI entry point.
//! Role: Binary crate root; parses args, runs commands, emits JSON or text on stdout.
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
#![allow(clippy::result_large_err)]
use std::io::{self, IsTerminal};
use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum, ValueHint, error::ErrorKind as ClapErrorKind};
use clap_complete::aot::Shell;
use serde_json::{Map, Value, json};
use std::error::Error as StdError;

mod command_dispatch;

use petpact::api::{Error, ErrorKind, to_exit_code};

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err((err, color_mode)) => {
            emit_error(&err, color_mode);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, (Error, ColorMode)> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    (
                        Error::new(ErrorKind::Io)
                            .with_message("failed to write help")
                            .with_source(io_err),
                        ColorMode::Auto,
                    )
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                return Err((
                    Error::new(ErrorKind::Usage)
                        .with_message(clap_error_summary(&err))
                        .with_hint("Run `petpact --help` for usage."),
                    ColorMode::Auto,
                ));
            }
        },
    };

    let color_mode = cli.color;
    let default_filter = match cli.command {
        Command::Serve { .. } => "info",
        _ => "warn",
    };
    petpact::serve::init_tracing(default_filter);

    command_dispatch::dispatch_command(cli.command, color_mode).map_err(|err| (err, color_mode))
}

fn clap_error_summary(err: &clap::Error) -> String {
    let rendered = err.to_string();
    rendered
        .lines()
        .find(|line| !line.trim().is_empty())
        .map(|line| line.trim_start_matches("error: ").trim().to_string())
        .unwrap_or_else(|| "invalid arguments".to_string())
}

#[derive(Parser)]
#[command(
    name = "petpact",
    version,
    about = "Pet resource service with consumer-driven contract verification",
    long_about = None,
    after_help = r#"EXAMPLES
  $ petpact serve --bind 127.0.0.1:8080
  $ petpact contract write --dir ./contracts
  $ petpact serve --provider-states &
  $ petpact verify --contract ./contracts/pet_consumer-pet_provider.json \
      --provider-url http://127.0.0.1:8080 \
      --state-change-url http://127.0.0.1:8080/_contract/provider-states"#,
    arg_required_else_help = true
)]
struct Cli {
    #[arg(
        long,
        default_value = "auto",
        value_enum,
        global = true,
        help = "Colorize human-readable output: auto|always|never"
    )]
    color: ColorMode,
    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn use_color(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Auto => is_tty,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    #[command(
        about = "Serve the /api/pets HTTP API",
        long_about = r#"Serve the pet resource over HTTP/JSON with an in-memory store.

Data lives for the lifetime of the process only."#,
        after_help = r#"EXAMPLES
  $ petpact serve
  $ petpact serve --bind 127.0.0.1:9000
  $ petpact serve --provider-states        # enable fixture setup for verification
  $ petpact serve check                    # validate config

NOTES
  - Loopback is the default; non-loopback binds require --allow-non-loopback
  - --provider-states mounts POST /_contract/provider-states (loopback only)"#
    )]
    Serve {
        #[command(subcommand)]
        subcommand: Option<ServeSubcommand>,
        #[command(flatten)]
        run: ServeRunArgs,
    },
    #[command(
        about = "Verify a contract artifact against a running provider",
        after_help = r#"EXAMPLES
  $ petpact verify --contract pacts/pet_consumer-pet_provider.json --provider-url http://127.0.0.1:8080
  $ petpact verify --contract c.json --provider-url http://127.0.0.1:8080 \
      --state-change-url http://127.0.0.1:8080/_contract/provider-states --json

NOTES
  - Exits 0 when every interaction passes, 5 on any mismatch, 6 if the provider is unreachable"#
    )]
    Verify(VerifyArgs),
    #[command(about = "Work with contract artifacts")]
    Contract {
        #[command(subcommand)]
        command: ContractCommand,
    },
    #[command(about = "Generate shell completions")]
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
    #[command(about = "Print version information")]
    Version,
}

#[derive(Subcommand)]
enum ServeSubcommand {
    #[command(about = "Validate serve config and print effective settings without starting")]
    Check {
        #[arg(long, help = "Emit JSON instead of human-readable output")]
        json: bool,
    },
}

#[derive(Args)]
struct ServeRunArgs {
    #[arg(long, default_value = "127.0.0.1:8080", help = "Bind address")]
    bind: SocketAddr,
    #[arg(long, help = "Allow binding to a non-loopback address")]
    allow_non_loopback: bool,
    #[arg(long, default_value_t = 1024 * 1024, help = "Maximum request body size in bytes")]
    max_body_bytes: u64,
    #[arg(long, help = "Mount the provider-state setup endpoint")]
    provider_states: bool,
}

#[derive(Args)]
struct VerifyArgs {
    #[arg(long, value_hint = ValueHint::FilePath, help = "Contract artifact to verify")]
    contract: PathBuf,
    #[arg(long, help = "Base URL of the provider under test")]
    provider_url: String,
    #[arg(long, help = "Provider endpoint that applies provider states")]
    state_change_url: Option<String>,
    #[arg(long, default_value_t = 5000, help = "Per-request timeout in milliseconds")]
    timeout_ms: u64,
    #[arg(long, help = "Emit the report as JSON")]
    json: bool,
}

#[derive(Subcommand)]
enum ContractCommand {
    #[command(about = "Write the pet consumer contract into a directory")]
    Write {
        #[arg(long, default_value = "contracts", value_hint = ValueHint::DirPath)]
        dir: PathBuf,
    },
}

fn emit_json(value: Value) {
    let json = if io::stdout().is_terminal() {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    }
    .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string());
    println!("{json}");
}

#[derive(Copy, Clone, Debug)]
enum AnsiColor {
    Red,
    Green,
    Yellow,
}

fn colorize_label(label: &str, enabled: bool, color: AnsiColor) -> String {
    if !enabled {
        return label.to_string();
    }
    let code = match color {
        AnsiColor::Red => "31",
        AnsiColor::Green => "32",
        AnsiColor::Yellow => "33",
    };
    format!("\u{1b}[{code}m{label}\u{1b}[0m")
}

fn emit_error(err: &Error, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        eprintln!("{}", error_text(err, color_mode.use_color(is_tty)));
        return;
    }

    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error".to_string(),
        ErrorKind::Usage => "usage error".to_string(),
        ErrorKind::NotFound => "not found".to_string(),
        ErrorKind::Validation => "invalid input".to_string(),
        ErrorKind::Mismatch => "contract mismatch".to_string(),
        ErrorKind::Unreachable => "provider unreachable".to_string(),
        ErrorKind::Corrupt => "corrupt data".to_string(),
        ErrorKind::Io => "i/o error".to_string(),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(err.kind().as_str()));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(path) = err.path() {
        inner.insert("path".to_string(), json!(path.display().to_string()));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error, use_color: bool) -> String {
    let mut lines = vec![format!(
        "{} {}",
        colorize_label("error:", use_color, AnsiColor::Red),
        error_message(err)
    )];
    if let Some(path) = err.path() {
        lines.push(format!("  path: {}", path.display()));
    }
    for cause in error_causes(err) {
        lines.push(format!("  caused by: {cause}"));
    }
    if let Some(hint) = err.hint() {
        lines.push(format!(
            "{} {hint}",
            colorize_label("hint:", use_color, AnsiColor::Yellow)
        ));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::{AnsiColor, Cli, Command, colorize_label, error_json, error_text};
    use clap::{CommandFactory, Parser};
    use petpact::api::{Error, ErrorKind};

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn verify_requires_contract_and_provider() {
        assert!(Cli::try_parse_from(["petpact", "verify"]).is_err());
        let cli = Cli::try_parse_from([
            "petpact",
            "verify",
            "--contract",
            "c.json",
            "--provider-url",
            "http://127.0.0.1:8080",
        ])
        .expect("parse");
        match cli.command {
            Command::Verify(args) => assert_eq!(args.timeout_ms, 5000),
            _ => panic!("expected verify"),
        }
    }

    #[test]
    fn error_json_carries_kind_message_and_hint() {
        let err = Error::new(ErrorKind::Unreachable)
            .with_message("provider unreachable")
            .with_hint("Start the provider.");
        let value = error_json(&err);
        assert_eq!(value["error"]["kind"], "Unreachable");
        assert_eq!(value["error"]["message"], "provider unreachable");
        assert_eq!(value["error"]["hint"], "Start the provider.");
    }

    #[test]
    fn colorize_label_wraps_only_when_enabled() {
        assert_eq!(colorize_label("OK", false, AnsiColor::Green), "OK");
        assert_eq!(
            colorize_label("OK", true, AnsiColor::Green),
            "\u{1b}[32mOK\u{1b}[0m"
        );
    }

    #[test]
    fn error_text_without_color_is_plain() {
        let err = Error::new(ErrorKind::NotFound);
        assert_eq!(error_text(&err, false), "error: not found");
    }
}
