//! Purpose: Hold top-level CLI command dispatch for `petpact`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: A failed verification prints its report and exits with the Mismatch code.

use super::*;

use petpact::contract::{HttpStateChange, Verifier, read_contract, write_contract};
use petpact::fixtures::pet_consumer_contract;
use petpact::serve::{ServeConfig, serve, validate_config};
use std::time::Duration;

pub(super) fn dispatch_command(command: Command, color_mode: ColorMode) -> Result<RunOutcome, Error> {
    match command {
        Command::Completion { shell } => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            clap_complete::aot::generate(shell, &mut cmd, "petpact", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
        Command::Version => {
            emit_json(json!({
                "name": "petpact",
                "version": env!("CARGO_PKG_VERSION"),
            }));
            Ok(RunOutcome::ok())
        }
        Command::Serve { subcommand, run } => {
            let config = serve_config_from_run_args(run);
            match subcommand {
                Some(ServeSubcommand::Check { json }) => {
                    validate_config(&config)?;
                    emit_serve_check_report(&config, json);
                    Ok(RunOutcome::ok())
                }
                None => {
                    let runtime = tokio::runtime::Builder::new_multi_thread()
                        .enable_all()
                        .build()
                        .map_err(|err| {
                            Error::new(ErrorKind::Internal)
                                .with_message("failed to start runtime")
                                .with_source(err)
                        })?;
                    runtime.block_on(serve(config))?;
                    Ok(RunOutcome::ok())
                }
            }
        }
        Command::Verify(args) => run_verify(args, color_mode),
        Command::Contract { command } => match command {
            ContractCommand::Write { dir } => {
                let contract = pet_consumer_contract()?;
                let path = write_contract(&dir, &contract)?;
                emit_json(json!({
                    "written": path.display().to_string(),
                    "consumer": contract.consumer.name,
                    "provider": contract.provider.name,
                    "interactions": contract.interactions.len(),
                }));
                Ok(RunOutcome::ok())
            }
        },
    }
}

fn serve_config_from_run_args(run: ServeRunArgs) -> ServeConfig {
    ServeConfig {
        bind: run.bind,
        allow_non_loopback: run.allow_non_loopback,
        max_body_bytes: run.max_body_bytes,
        provider_states: run.provider_states,
    }
}

fn emit_serve_check_report(config: &ServeConfig, json: bool) {
    if json {
        emit_json(json!({
            "bind": config.bind.to_string(),
            "base_url": format!("http://{}", config.bind),
            "max_body_bytes": config.max_body_bytes,
            "provider_states": config.provider_states,
        }));
        return;
    }
    println!("serve config ok");
    println!("  base url:        http://{}", config.bind);
    println!("  max body bytes:  {}", config.max_body_bytes);
    println!(
        "  provider states: {}",
        if config.provider_states { "enabled" } else { "disabled" }
    );
}

fn run_verify(args: VerifyArgs, color_mode: ColorMode) -> Result<RunOutcome, Error> {
    if args.timeout_ms == 0 {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("--timeout-ms must be greater than zero")
            .with_hint("Use a positive value like 5000."));
    }
    let timeout = Duration::from_millis(args.timeout_ms);
    let contract = read_contract(&args.contract)?;

    let mut verifier = Verifier::new(args.provider_url)?.with_timeout(timeout);
    if let Some(url) = args.state_change_url.as_deref() {
        verifier = verifier.with_states(HttpStateChange::new(url, timeout)?);
    }
    let report = verifier.verify(&contract)?;

    if args.json {
        let value = serde_json::to_value(&report).map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to encode verification report")
                .with_source(err)
        })?;
        emit_json(json!({ "passed": report.passed(), "report": value }));
    } else {
        let use_color = color_mode.use_color(io::stdout().is_terminal());
        let text = report.render_text(|verdict, passed| {
            let color = if passed { AnsiColor::Green } else { AnsiColor::Red };
            colorize_label(verdict, use_color, color)
        });
        println!("{text}");
    }

    if report.passed() {
        Ok(RunOutcome::ok())
    } else {
        Ok(RunOutcome::with_code(to_exit_code(ErrorKind::Mismatch)))
    }
}
