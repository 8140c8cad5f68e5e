//! animbatch CLI - Command-line interface for batch animation retargeting
//!
//! This binary retargets folders of animation clips onto one target skeleton and
//! exports them as GLB files, one per export group.

use clap::Parser;
use std::process::ExitCode;

use animbatch_cli::{commands, init_logging};

mod cli_args;

use cli_args::{Cli, Commands};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Run {
            config,
            report,
            json,
        } => commands::run::run(&config, report.as_deref(), json),
        Commands::Discover {
            root,
            extension,
            must_have,
            must_not_have,
            group_by,
            group_name,
            metadata,
            json,
        } => commands::discover::run(&commands::discover::DiscoverOptions {
            root,
            extension,
            must_have,
            must_not_have,
            group_by,
            group_name,
            metadata,
            json,
        }),
        Commands::Classify {
            names,
            preset,
            include,
            exclude,
            json,
        } => commands::classify::run(&names, &preset, &include, &exclude, json),
        Commands::Validate { config, json } => commands::validate::run(&config, json),
        Commands::Doctor { config } => commands::doctor::run(config.as_deref()),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {:#}", colored::Colorize::red("error"), e);
            ExitCode::from(1)
        }
    }
}
