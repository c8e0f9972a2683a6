// Copyright 2025 dentsusoken
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use clap::{Parser, Subcommand};
use habitat::Habitat;
use habitat::commands::check::CheckCommand;
use habitat::commands::classify::ClassifyCommand;
use habitat::commands::edit::EditCommand;
use habitat::commands::explore::ExploreCommand;
use habitat::commands::list::ListCommand;
use habitat::commands::report::ReportCommand;
use habitat::config::new_habitat_config;
use habitat::error::{HabitatError, Result, format_error_with_color, get_exit_code};
use habitat::logging;
use std::io::IsTerminal;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "habitat")]
#[command(author, version, about = "Executable identity and environment introspection", long_about = None)]
struct Cli {
    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Print diagnostic traces (same as -vv)
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every check and print the results grouped by category
    Report {
        /// Executable to inspect (defaults to argv[0])
        #[arg(long)]
        path: Option<PathBuf>,

        /// Output results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Run a single check; exits 0 when true and 1 when false
    Check {
        /// Check name (see `habitat list`)
        name: String,

        /// Executable to inspect (defaults to argv[0])
        #[arg(long)]
        path: Option<PathBuf>,
    },

    /// List the registered checks
    #[command(visible_alias = "ls")]
    List,

    /// Print the format and packaging context of a file
    Classify {
        path: PathBuf,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Open a text file in the default editor
    Edit {
        file: PathBuf,

        /// Return immediately instead of waiting for the editor
        #[arg(long, conflicts_with = "wait")]
        background: bool,

        /// Wait for the editor to exit
        #[arg(long)]
        wait: bool,
    },

    /// Show a folder in the system file manager
    Explore {
        /// Folder or file (defaults to the current directory)
        path: Option<PathBuf>,
    },
}

fn setup_logger(cli: &Cli) {
    let verbose = if cli.debug { cli.verbose.max(2) } else { cli.verbose };
    logging::setup_logger(verbose);
}

fn exit_with_error(error: &HabitatError) -> ! {
    eprint!("{}", format_error_with_color(error, std::io::stderr().is_terminal()));
    std::process::exit(get_exit_code(error));
}

fn main() {
    let cli = Cli::parse();

    setup_logger(&cli);

    let config = match new_habitat_config() {
        Ok(config) => config,
        Err(e) => {
            exit_with_error(&e);
        }
    };
    let habitat = Habitat::new(config);

    let result: Result<i32> = (|| {
        match cli.command {
            Commands::Report { path, json } => {
                let command = ReportCommand::new(&habitat)?;
                command.execute(path.as_deref(), json)?;
            }
            Commands::Check { name, path } => {
                let command = CheckCommand::new(&habitat)?;
                let value = command.execute(&name, path.as_deref())?;
                return Ok(if value { 0 } else { 1 });
            }
            Commands::List => {
                let command = ListCommand::new()?;
                command.execute()?;
            }
            Commands::Classify { path, json } => {
                let command = ClassifyCommand::new(&habitat)?;
                command.execute(&path, json)?;
            }
            Commands::Edit {
                file,
                background,
                wait,
            } => {
                let mode = match (background, wait) {
                    (true, _) => Some(true),
                    (_, true) => Some(false),
                    _ => None,
                };
                let command = EditCommand::new(&habitat)?;
                command.execute(&file, mode)?;
            }
            Commands::Explore { path } => {
                let command = ExploreCommand::new(&habitat)?;
                command.execute(path.as_deref())?;
            }
        }
        Ok(0)
    })();

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            exit_with_error(&e);
        }
    }
}
