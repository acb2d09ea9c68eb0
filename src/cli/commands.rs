//! Command dispatch

use std::io;
use std::path::{Path, PathBuf};

use clap::CommandFactory;
use clap_complete::generate;
use itertools::Itertools;
use tracing::{debug, instrument};

use crate::application::TreeNodeConvert;
use crate::cli::args::{Cli, Commands, ConfigCommands};
use crate::cli::error::{CliError, CliResult};
use crate::cli::output;
use crate::config::{global_config_dir, global_config_path, local_config_path, Settings};
use crate::domain::{DomainError, Hierarchy, HierarchyNode, NodeId, Scene};
use crate::infrastructure::di::ServiceContainer;
use crate::infrastructure::InfraError;

pub fn execute_command(cli: &Cli) -> CliResult<()> {
    let Some(command) = &cli.command else {
        return Err(CliError::InvalidArgs(
            "no command given, see --help".to_string(),
        ));
    };

    if let Commands::Completion { shell } = command {
        let mut cmd = Cli::command();
        let name = cmd.get_name().to_string();
        generate(*shell, &mut cmd, name, &mut io::stdout());
        return Ok(());
    }

    let project_dir = match &cli.project_dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().map_err(|e| InfraError::io("current directory", e))?,
    };
    let settings = Settings::load(Some(project_dir.as_path()))?;
    let container = ServiceContainer::new(settings);

    match command {
        Commands::Config { command } => cmd_config(&container, &project_dir, command),
        Commands::Completion { .. } => Ok(()),
        _ => {
            let scene_path = container
                .hierarchy
                .resolve_scene_path(cli.scene.as_deref())?;
            debug!("scene: {}", scene_path.display());
            dispatch(&container, &scene_path, command)
        }
    }
}

fn dispatch(container: &ServiceContainer, scene: &Path, command: &Commands) -> CliResult<()> {
    match command {
        Commands::Tree { id, sort_keys } => {
            let show = *sort_keys || container.settings.show_sort_keys;
            cmd_tree(container, scene, id.as_deref(), show)
        }
        Commands::Roots => query(container, scene, |h| {
            print_nodes(&h.roots());
            Ok(())
        }),
        Commands::Children { id } => query(container, scene, |h| {
            require(h, id)?;
            print_nodes(&h.children(id));
            Ok(())
        }),
        Commands::Descendants { id } => query(container, scene, |h| {
            require(h, id)?;
            print_nodes(&h.descendants(id));
            Ok(())
        }),
        Commands::Parent { id } => query(container, scene, |h| {
            require(h, id)?;
            match h.parent(id) {
                Some(parent) => output::info(parent),
                None => output::warning(&format!("{id} is a root")),
            }
            Ok(())
        }),
        Commands::Ancestors { id } => query(container, scene, |h| {
            require(h, id)?;
            print_nodes(&h.ancestors(id));
            Ok(())
        }),
        Commands::Top { id } => query(container, scene, |h| {
            require(h, id)?;
            let top = h.top_parent(id).ok_or_else(|| not_found(id))?;
            output::info(top);
            Ok(())
        }),
        Commands::Index { id } => query(container, scene, |h| {
            require(h, id)?;
            let index = h.index_in_parent(id).ok_or_else(|| not_found(id))?;
            output::info(&index);
            Ok(())
        }),
        Commands::Move { id, index } => {
            let placed = container
                .hierarchy
                .edit(scene, |h| h.set_index_in_parent(id, *index))?;
            output::success(&format!("moved {id} to position {placed}"));
            Ok(())
        }
        Commands::Reparent { id, parent } => {
            container
                .hierarchy
                .edit(scene, |h| h.set_parent(id, parent.as_deref()))?;
            match parent {
                Some(parent) => output::success(&format!("{id} is now a child of {parent}")),
                None => output::success(&format!("{id} is now a root")),
            }
            Ok(())
        }
        Commands::Remove { id, recursive } => cmd_remove(container, scene, id, *recursive),
        Commands::Rename { old, new } => {
            let rewired = container
                .hierarchy
                .edit(scene, |h| h.rename_node(old, new))?;
            output::success(&format!("renamed {old} to {new}, {rewired} children rewired"));
            Ok(())
        }
        Commands::Prune => {
            let cleared = container
                .hierarchy
                .edit(scene, |h| Ok(h.prune_dangling_references()))?;
            if cleared.is_empty() {
                output::success("no dangling parent references");
            } else {
                output::header("Cleared dangling parent references:");
                for id in &cleared {
                    output::diff_remove(id);
                }
            }
            Ok(())
        }
        Commands::Config { .. } | Commands::Completion { .. } => Ok(()),
    }
}

/// Load the scene and run a read-only operation on it.
fn query<F>(container: &ServiceContainer, scene: &Path, f: F) -> CliResult<()>
where
    F: FnOnce(&Hierarchy<Scene>) -> Result<(), DomainError>,
{
    let hierarchy = container.hierarchy.load(scene)?;
    f(&hierarchy)?;
    Ok(())
}

#[instrument(level = "debug", skip(container))]
fn cmd_tree(
    container: &ServiceContainer,
    scene: &Path,
    id: Option<&str>,
    show_sort_keys: bool,
) -> CliResult<()> {
    let hierarchy = container.hierarchy.load(scene)?;
    match id {
        Some(id) => {
            let tree = hierarchy
                .to_tree_string(id, show_sort_keys)
                .ok_or_else(|| not_found(id))?;
            output::info(&tree);
        }
        None => {
            let forest = hierarchy.to_forest(show_sort_keys);
            if forest.is_empty() {
                output::warning("scene has no hierarchy nodes");
            }
            for tree in forest {
                output::info(&tree);
            }
            let unrooted = hierarchy.unrooted_ids();
            if !unrooted.is_empty() {
                output::warning(&format!(
                    "not shown, parent cycle: {}",
                    unrooted.iter().join(", ")
                ));
            }
        }
    }
    Ok(())
}

#[instrument(level = "debug", skip(container))]
fn cmd_remove(container: &ServiceContainer, scene: &Path, id: &str, recursive: bool) -> CliResult<()> {
    if recursive {
        let removed = container.hierarchy.edit(scene, |h| {
            let mut removed = h.remove_all_descendants(id)?;
            removed.push(h.remove_node(id)?);
            Ok(removed)
        })?;
        output::header(&format!("Removed {} nodes:", removed.len()));
        for node in &removed {
            output::diff_remove(node);
        }
    } else {
        let promoted = container.hierarchy.edit(scene, |h| {
            let children = h.child_ids(id).to_vec();
            h.remove_node(id)?;
            Ok(children)
        })?;
        output::success(&format!("removed {id}"));
        for child in &promoted {
            output::detail(&format!("{child} moved up"));
        }
    }
    Ok(())
}

#[instrument(level = "debug", skip(container))]
fn cmd_config(container: &ServiceContainer, project_dir: &Path, command: &ConfigCommands) -> CliResult<()> {
    match command {
        ConfigCommands::Show => {
            output::info(&container.settings.to_toml()?);
        }
        ConfigCommands::Template => {
            output::info(&Settings::template());
        }
        ConfigCommands::Path => {
            let global = global_config_path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(unavailable)".to_string());
            output::action("global", &global);
            output::action("local", &local_config_path(project_dir).display());
        }
        ConfigCommands::Init { force } => {
            let path = init_global_config(container, *force)?;
            output::success(&format!("wrote {}", path.display()));
        }
    }
    Ok(())
}

fn init_global_config(container: &ServiceContainer, force: bool) -> CliResult<PathBuf> {
    let (Some(dir), Some(path)) = (global_config_dir(), global_config_path()) else {
        return Err(CliError::Usage(
            "cannot determine config directory".to_string(),
        ));
    };
    if container.fs.exists(&path) && !force {
        return Err(CliError::Usage(format!(
            "{} exists, use --force to overwrite",
            path.display()
        )));
    }
    std::fs::create_dir_all(&dir).map_err(|e| InfraError::io(format!("create {}", dir.display()), e))?;
    container
        .fs
        .write_atomic(&path, &Settings::template())
        .map_err(|e| InfraError::io(format!("write {}", path.display()), e))?;
    Ok(path)
}

fn print_nodes(nodes: &[&HierarchyNode]) {
    for node in nodes {
        output::info(node);
    }
}

/// Node must exist and take part in the hierarchy.
fn require(hierarchy: &Hierarchy<Scene>, id: &str) -> Result<(), DomainError> {
    match hierarchy.node(id) {
        Some(_) => Ok(()),
        None if hierarchy.scene().contains(id) => {
            Err(DomainError::NotHierarchyNode(NodeId::from(id)))
        }
        None => Err(not_found(id)),
    }
}

fn not_found(id: &str) -> DomainError {
    DomainError::NodeNotFound(NodeId::from(id))
}
