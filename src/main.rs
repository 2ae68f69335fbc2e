// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! corvid CLI - runs Corvid bytecode programs and debugs them remotely.

mod config;
mod console;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use corvid_debug::{DebugClient, DebugServer};
use corvid_vm::debugger::DebuggerControl;
use corvid_vm::{Interpreter, Source, VmConfig, compile};

use crate::config::Config;
use crate::console::Console;

#[derive(Parser)]
#[command(
    name = "corvid",
    about = "Interpreter and remote debugger for Corvid bytecode",
    version,
    author = "Pegasus Heavy Industries"
)]
struct Cli {
    /// Enable verbose logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Configuration file to use instead of ./corvid.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load, link and run a program
    Run {
        /// Module files; each module is named after its file stem
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Module whose `main` is the entry point (default: first file)
        #[arg(short = 'm', long)]
        entry: Option<String>,

        /// Maximum stack slots
        #[arg(long)]
        stack_capacity: Option<usize>,

        /// Serve the debugger while the program runs
        #[arg(long)]
        debug: bool,

        /// Address for the debug server
        #[arg(long)]
        debug_addr: Option<String>,

        /// Suspend before the first instruction (implies --debug)
        #[arg(long)]
        suspend: bool,

        /// Arguments passed to main
        #[arg(last = true)]
        args: Vec<String>,
    },

    /// Attach the debugger console to a running program
    Attach {
        /// Debug server address
        addr: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;
    init_logging(cli.verbose, &config);

    match cli.command {
        Commands::Run {
            files,
            entry,
            stack_capacity,
            debug,
            debug_addr,
            suspend,
            args,
        } => {
            if let Some(capacity) = stack_capacity {
                config.set("stack_capacity", &capacity.to_string())?;
            }
            if let Some(addr) = debug_addr {
                config.debug_addr = addr;
            }
            config.suspend_on_start |= suspend;
            let debug = debug || suspend;

            match run(&config, &files, entry, debug, args).await {
                Ok(code) => std::process::exit(code as i32),
                Err(e) => {
                    eprintln!("{}: {:#}", "Error".red().bold(), e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Attach { addr } => {
            let addr = addr.unwrap_or_else(|| config.debug_addr.clone());
            let client = DebugClient::connect(addr.as_str())
                .await
                .with_context(|| format!("cannot connect to {}", addr))?;
            let mut console = Console::new(client, config.history_size, config::history_path())?;
            console.run().await
        }
    }
}

/// `RUST_LOG` wins, then `--verbose`, then the configured filter.
fn init_logging(verbose: bool, config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("corvid=debug,corvid_vm=debug,corvid_debug=debug")
        } else if let Some(directives) = &config.log_filter {
            EnvFilter::new(directives)
        } else {
            EnvFilter::new("corvid=warn,corvid_vm=warn,corvid_debug=warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Runs a program and returns its exit code.
async fn run(
    config: &Config,
    files: &[PathBuf],
    entry: Option<String>,
    debug: bool,
    args: Vec<String>,
) -> anyhow::Result<i64> {
    let sources = files
        .iter()
        .map(Source::from_path)
        .collect::<Result<Vec<_>, _>>()?;
    let entry = match entry {
        Some(entry) => entry,
        None => sources
            .first()
            .map(|source| source.name.clone())
            .ok_or_else(|| anyhow!("no module files given"))?,
    };

    let program = Arc::new(compile(&sources)?);
    let vm_config = VmConfig {
        stack_capacity: config.stack_capacity,
        ..VmConfig::default()
    };
    let stdout = vm_config.streams.stdout.clone();
    let mut interpreter = Interpreter::for_module(program.clone(), &entry, vm_config)?;

    if debug {
        let control = Arc::new(DebuggerControl::new(program, config.suspend_on_start));
        let server = DebugServer::bind(config.debug_addr.as_str(), control.clone())
            .await
            .with_context(|| format!("cannot bind debug server to {}", config.debug_addr))?;
        let addr = server.local_addr()?;
        eprintln!(
            "{} {}",
            "debugger listening on".dimmed(),
            addr.to_string().cyan().bold()
        );
        tokio::spawn(server.run());
        interpreter = interpreter.with_hook(control);
    }

    info!(entry = %entry, modules = sources.len(), "running");
    let runner = std::thread::Builder::new()
        .name("corvid-main".to_string())
        .spawn(move || interpreter.run(&args))?;
    let result = tokio::task::spawn_blocking(move || runner.join())
        .await?
        .map_err(|_| anyhow!("interpreter thread panicked"))?;

    stdout.flush()?;
    Ok(result?)
}
