// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Interactive debugger console.
//!
//! Reads commands with rustyline and forwards them to a debug server
//! through a [`DebugClient`].

use std::borrow::Cow;
use std::path::PathBuf;

use corvid_debug::{DebugClient, ProtocolError};
use owo_colors::OwoColorize;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{Config, Editor, Helper};

/// Console commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Help,
    Quit,
    Modules,
    Frame,
    Status,
    Wait,
    Break { function: String, index: usize },
    Clear { function: String, index: usize },
    Suspend,
    Continue,
    Step,
    Next,
    Finish,
    Line,
    Column,
}

impl ConsoleCommand {
    /// Parses one input line.
    pub fn parse(input: &str) -> Result<Self, String> {
        let mut words = input.split_whitespace();
        let Some(word) = words.next() else {
            return Err("empty command".to_string());
        };
        let rest: Vec<&str> = words.collect();

        let command = match word {
            "help" | "h" | "?" => ConsoleCommand::Help,
            "quit" | "exit" | "q" => ConsoleCommand::Quit,
            "modules" | "list" => ConsoleCommand::Modules,
            "frame" | "where" | "bt" => ConsoleCommand::Frame,
            "status" => ConsoleCommand::Status,
            "wait" => ConsoleCommand::Wait,
            "break" | "b" => {
                let (function, index) = breakpoint_args(word, &rest)?;
                return Ok(ConsoleCommand::Break { function, index });
            }
            "clear" => {
                let (function, index) = breakpoint_args(word, &rest)?;
                return Ok(ConsoleCommand::Clear { function, index });
            }
            "suspend" | "pause" => ConsoleCommand::Suspend,
            "continue" | "c" => ConsoleCommand::Continue,
            "step" | "s" => ConsoleCommand::Step,
            "next" | "n" => ConsoleCommand::Next,
            "finish" | "out" => ConsoleCommand::Finish,
            "line" => ConsoleCommand::Line,
            "column" => ConsoleCommand::Column,
            other => return Err(format!("unknown command '{}'", other)),
        };
        if !rest.is_empty() {
            return Err(format!("'{}' takes no arguments", word));
        }
        Ok(command)
    }

    /// Commands with descriptions for help and completion.
    pub fn all_commands() -> &'static [(&'static str, &'static str)] {
        &[
            ("help", "Show this help message"),
            ("quit", "Detach and exit (the program stays as it is)"),
            ("modules", "List modules, functions and breakpoints"),
            ("frame", "Show the suspended frame"),
            ("status", "Show whether the program is suspended"),
            ("wait", "Wait until the program suspends"),
            ("break <fn> <i>", "Set a breakpoint at instruction i"),
            ("clear <fn> <i>", "Clear a breakpoint"),
            ("suspend", "Suspend before the next instruction"),
            ("continue", "Resume execution"),
            ("step", "Execute one instruction"),
            ("next", "Step over calls"),
            ("finish", "Run until the current frame returns"),
            ("line", "Run until the source line changes"),
            ("column", "Run until the source position changes"),
        ]
    }

    fn resumes(&self) -> bool {
        matches!(
            self,
            ConsoleCommand::Continue
                | ConsoleCommand::Step
                | ConsoleCommand::Next
                | ConsoleCommand::Finish
                | ConsoleCommand::Line
                | ConsoleCommand::Column
        )
    }
}

fn breakpoint_args(word: &str, rest: &[&str]) -> Result<(String, usize), String> {
    match rest {
        [function, index] => {
            let index = index
                .parse()
                .map_err(|_| format!("invalid instruction index '{}'", index))?;
            Ok((function.to_string(), index))
        }
        _ => Err(format!("usage: {} <module::function> <index>", word)),
    }
}

/// Completion and hints over command names.
struct ConsoleHelper {
    words: Vec<&'static str>,
}

impl ConsoleHelper {
    fn new() -> Self {
        let words = ConsoleCommand::all_commands()
            .iter()
            .filter_map(|(usage, _)| usage.split_whitespace().next())
            .collect();
        Self { words }
    }
}

impl Completer for ConsoleHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let word = &line[..pos];
        if word.is_empty() || word.contains(char::is_whitespace) {
            return Ok((pos, vec![]));
        }
        let matches = self
            .words
            .iter()
            .filter(|w| w.starts_with(word))
            .map(|w| Pair {
                display: w.to_string(),
                replacement: w[word.len()..].to_string(),
            })
            .collect();
        Ok((pos, matches))
    }
}

impl Hinter for ConsoleHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>) -> Option<String> {
        if pos < line.len() || line.len() < 2 || line.contains(char::is_whitespace) {
            return None;
        }
        self.words
            .iter()
            .find(|w| w.starts_with(line) && w.len() > line.len())
            .map(|w| (&w[line.len()..]).dimmed().to_string())
    }
}

impl Highlighter for ConsoleHelper {
    fn highlight_hint<'h>(&self, hint: &'h str) -> Cow<'h, str> {
        Cow::Borrowed(hint)
    }
}

impl Validator for ConsoleHelper {}

impl Helper for ConsoleHelper {}

enum Flow {
    Continue,
    Exit,
}

/// The attached console.
pub struct Console {
    client: DebugClient,
    editor: Editor<ConsoleHelper, DefaultHistory>,
    history_path: PathBuf,
}

impl Console {
    /// Creates a console over a connected client.
    pub fn new(client: DebugClient, history_size: usize, history_path: PathBuf) -> rustyline::Result<Self> {
        let config = Config::builder()
            .history_ignore_dups(true)?
            .history_ignore_space(true)
            .max_history_size(history_size)?
            .auto_add_history(true)
            .build();

        let mut editor = Editor::with_config(config)?;
        editor.set_helper(Some(ConsoleHelper::new()));

        if let Some(parent) = history_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let _ = editor.load_history(&history_path);

        Ok(Self {
            client,
            editor,
            history_path,
        })
    }

    /// Runs the console until `quit` or end of input.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        let hello = self.client.hello().await?;
        println!(
            "{} {} (protocol {})",
            "attached to".dimmed(),
            hello.server.cyan().bold(),
            hello.protocol
        );
        println!("{} {} {}", "Type".dimmed(), "help".cyan(), "for commands".dimmed());

        loop {
            let prompt = format!("{} ", "corvid>".bright_green().bold());
            let line = tokio::task::block_in_place(|| self.editor.readline(&prompt));
            match line {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match ConsoleCommand::parse(line) {
                        Ok(command) => match self.execute(command).await {
                            Ok(Flow::Continue) => {}
                            Ok(Flow::Exit) => break,
                            Err(ProtocolError::Disconnected) => {
                                eprintln!("{}", "connection closed".red().bold());
                                break;
                            }
                            Err(e) => eprintln!("{}: {}", "Error".red().bold(), e),
                        },
                        Err(message) => eprintln!("{}: {}", "Error".red().bold(), message),
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("{}", "^C".dimmed());
                }
                Err(ReadlineError::Eof) => break,
                Err(e) => {
                    eprintln!("{}: {:?}", "Error".red().bold(), e);
                    break;
                }
            }
        }

        let _ = self.editor.save_history(&self.history_path);
        Ok(())
    }

    async fn execute(&self, command: ConsoleCommand) -> Result<Flow, ProtocolError> {
        let client = &self.client;
        let resumes = command.resumes();
        match command {
            ConsoleCommand::Help => print_help(),
            ConsoleCommand::Quit => return Ok(Flow::Exit),
            ConsoleCommand::Modules => {
                for module in client.modules().await? {
                    println!("{} {}", "module".white().bold(), module.name.cyan());
                    for ty in &module.types {
                        println!("  {} {} {}", "type".magenta(), ty.name, ty.fields.join(" ").dimmed());
                    }
                    for function in &module.functions {
                        println!(
                            "  {} {} {}",
                            "func".magenta(),
                            function.id.bold(),
                            format!("({} args, returns {})", function.n_args, function.has_return).dimmed()
                        );
                        for (i, op) in function.ops.iter().enumerate() {
                            let marker = if function.breakpoints.get(i).copied().unwrap_or(false) {
                                "*".red().bold().to_string()
                            } else {
                                " ".to_string()
                            };
                            println!("   {} {:>4}  {}", marker, i.yellow(), op);
                        }
                    }
                }
            }
            ConsoleCommand::Frame => print_frame(client).await?,
            ConsoleCommand::Status => {
                let state = if client.is_suspended().await? {
                    "suspended".yellow().to_string()
                } else {
                    "running".green().to_string()
                };
                println!("{}", state);
            }
            ConsoleCommand::Wait => {
                client.await_suspended(None).await?;
                print_frame(client).await?;
            }
            ConsoleCommand::Break { function, index } => {
                client.set_breakpoint(&function, index).await?;
                println!("{} {} @ {}", "breakpoint set".dimmed(), function, index);
            }
            ConsoleCommand::Clear { function, index } => {
                client.clear_breakpoint(&function, index).await?;
                println!("{} {} @ {}", "breakpoint cleared".dimmed(), function, index);
            }
            ConsoleCommand::Suspend => {
                client.suspend().await?;
                client.await_suspended(None).await?;
                print_frame(client).await?;
            }
            ConsoleCommand::Continue => client.resume().await?,
            ConsoleCommand::Step => client.step().await?,
            ConsoleCommand::Next => client.step_over().await?,
            ConsoleCommand::Finish => client.step_out().await?,
            ConsoleCommand::Line => client.step_past_line().await?,
            ConsoleCommand::Column => client.step_past_column().await?,
        }

        if resumes {
            // Report where the program stops next, or that it finished.
            match client.await_suspended(None).await {
                Ok(()) => print_frame(client).await?,
                Err(ProtocolError::Remote(message)) => println!("{}", message.dimmed()),
                Err(e) => return Err(e),
            }
        }
        Ok(Flow::Continue)
    }
}

async fn print_frame(client: &DebugClient) -> Result<(), ProtocolError> {
    let frame = client.current_frame().await?;
    println!(
        "{} {}",
        format!("[step {}]", frame.step_count).dimmed(),
        frame.dump
    );
    Ok(())
}

fn print_help() {
    println!();
    println!("{}", "Commands:".white().bold());
    for (usage, description) in ConsoleCommand::all_commands() {
        println!("  {:18} {}", usage.cyan(), description.dimmed());
    }
    println!();
}
