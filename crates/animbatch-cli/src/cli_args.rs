//! CLI argument definitions for the animbatch command-line interface.
//!
//! All `#[derive(Parser)]` and `#[derive(Subcommand)]` types are defined here,
//! keeping `main.rs` focused on dispatch logic.

use clap::{ArgAction, Parser, Subcommand};

/// animbatch - Batch animation retargeting
#[derive(Parser)]
#[command(name = "animbatch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub(crate) struct Cli {
    /// Increase log verbosity (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Retarget every clip of a batch config and export the groups
    Run {
        /// Path to the batch config (JSON)
        #[arg(short, long)]
        config: String,

        /// Write the run report to this file
        #[arg(short, long)]
        report: Option<String>,

        /// Print the run report as JSON instead of colored text
        #[arg(long)]
        json: bool,
    },

    /// List the source files a run would pick up, grouped for export
    Discover {
        /// Directory to scan recursively
        #[arg(short, long)]
        root: String,

        /// Source file extension
        #[arg(short, long, default_value = "fbx")]
        extension: String,

        /// Only keep files whose name contains this text
        #[arg(long)]
        must_have: Option<String>,

        /// Skip files whose name contains this text
        #[arg(long)]
        must_not_have: Option<String>,

        /// How files are grouped into output files
        #[arg(long, default_value = "single", value_parser = ["single", "directory", "metadata"])]
        group_by: String,

        /// Group name for single mode, fallback group for metadata mode
        #[arg(long)]
        group_name: Option<String>,

        /// Metadata CSV with per-file group and loop overrides
        #[arg(short, long)]
        metadata: Option<String>,

        /// Output machine-readable JSON (no colored output)
        #[arg(long)]
        json: bool,
    },

    /// Show how clip names are classified as looping or not
    Classify {
        /// Clip names (file names or stems)
        #[arg(required = true)]
        names: Vec<String>,

        /// Keyword preset
        #[arg(long, default_value = "simple", value_parser = ["simple", "strict"])]
        preset: String,

        /// Replace the preset's inclusion keywords
        #[arg(long, num_args = 1..)]
        include: Vec<String>,

        /// Replace the preset's exclusion keywords
        #[arg(long, num_args = 1..)]
        exclude: Vec<String>,

        /// Output machine-readable JSON (no colored output)
        #[arg(long)]
        json: bool,
    },

    /// Validate a batch config without running it
    Validate {
        /// Path to the batch config (JSON)
        #[arg(short, long)]
        config: String,

        /// Output machine-readable JSON (no colored output)
        #[arg(long)]
        json: bool,
    },

    /// Check that a batch can run here (Blender, and the paths a config names)
    Doctor {
        /// Batch config whose source, target and export paths are checked
        #[arg(short, long)]
        config: Option<String>,
    },
}
