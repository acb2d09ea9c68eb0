//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueHint};

/// Hierarchical node registry: inspect and edit id-linked forests in scene documents
#[derive(Parser, Debug)]
#[command(name = "hierreg")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase log verbosity (-d info, -dd debug, -ddd trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub debug: u8,

    /// Scene document (default: scene_file from config)
    #[arg(short, long, global = true, value_hint = ValueHint::FilePath)]
    pub scene: Option<PathBuf>,

    /// Directory searched for a local .hierreg.toml (default: cwd)
    #[arg(short = 'C', long, global = true, value_hint = ValueHint::DirPath)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the forest, or the subtree below a node
    Tree {
        /// Root of the subtree to print
        id: Option<String>,

        /// Show sort keys next to node ids
        #[arg(short = 'k', long)]
        sort_keys: bool,
    },

    /// List root nodes in order
    Roots,

    /// List direct children in order
    Children { id: String },

    /// List all descendants, depth-first
    Descendants { id: String },

    /// Print the resolved parent
    Parent { id: String },

    /// List the parent chain, nearest first
    Ancestors { id: String },

    /// Print the topmost ancestor
    Top { id: String },

    /// Print the position among siblings
    Index { id: String },

    /// Move a node to a position among its siblings
    Move {
        id: String,

        /// Target position, values past the end place the node last
        index: usize,
    },

    /// Set or clear the parent of a node
    Reparent {
        id: String,

        /// New parent; omit to make the node a root
        parent: Option<String>,
    },

    /// Remove a node, moving its children up to its parent
    Remove {
        id: String,

        /// Remove the whole subtree instead of reparenting children
        #[arg(short, long)]
        recursive: bool,
    },

    /// Rename a node and rewire its children
    Rename { old: String, new: String },

    /// Clear parent references that do not resolve
    Prune,

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show effective configuration
    Show,

    /// Print a config template
    Template,

    /// Show config file locations
    Path,

    /// Write the template to the global config location
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}
