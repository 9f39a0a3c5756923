mod cli;
mod commands;
mod config;
mod engine;
mod manifest;
mod paths;
mod progress;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use config::Settings;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    pub config: Option<PathBuf>,
    pub gate_endpoint: Option<String>,
    pub retry_timeout: Option<u64>,
}

impl Context {
    /// Client settings with command-line overrides applied
    pub fn settings(&self) -> Result<Settings> {
        Ok(Settings::load(self.config.as_deref())?
            .with_overrides(self.gate_endpoint.clone(), self.retry_timeout))
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        config: cli.config,
        gate_endpoint: cli.gate_endpoint,
        retry_timeout: cli.retry_timeout,
    };

    match run(&ctx, cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if ctx.verbose > 0 {
                ui::error(&format!("{e:?}"));
            } else {
                ui::error(&format!("{e:#}"));
            }
            ExitCode::FAILURE
        }
    }
}

fn run(ctx: &Context, command: Command) -> Result<()> {
    match command {
        Command::Apply(args) => commands::apply::apply(ctx, args),
        Command::Plan(args) => commands::apply::plan(ctx, args),
        Command::Destroy(args) => commands::apply::destroy(ctx, args),
        Command::Get(args) => commands::get::run(ctx, args),
        Command::Validate(args) => commands::validate::run(ctx, args),
        Command::Completions { shell } => {
            generate(shell, &mut Cli::command(), "spingate", &mut io::stdout());
            Ok(())
        }
    }
}
