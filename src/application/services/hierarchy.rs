//! Hierarchy service
//!
//! Loads a scene document into a [`Hierarchy`], runs one query or edit
//! against it and writes edits back.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::application::error_ext::IoResultExt;
use crate::application::scene_file::SceneDocument;
use crate::application::{ApplicationError, ApplicationResult};
use crate::config::Settings;
use crate::domain::{DomainResult, Hierarchy, Scene};
use crate::infrastructure::traits::FileSystem;

/// Service for working with scene files.
pub struct HierarchyService {
    fs: Arc<dyn FileSystem>,
    settings: Arc<Settings>,
}

impl HierarchyService {
    /// Create a new hierarchy service.
    pub fn new(fs: Arc<dyn FileSystem>, settings: Arc<Settings>) -> Self {
        Self { fs, settings }
    }

    /// Scene file to operate on: the explicit path, else the configured one.
    pub fn resolve_scene_path(&self, explicit: Option<&Path>) -> ApplicationResult<PathBuf> {
        explicit
            .map(Path::to_path_buf)
            .or_else(|| self.settings.scene_file.clone())
            .ok_or(ApplicationError::NoSceneFile)
    }

    /// Read and parse a scene document.
    #[instrument(level = "debug", skip(self))]
    pub fn load(&self, path: &Path) -> ApplicationResult<Hierarchy<Scene>> {
        let content = self.fs.read_to_string(path).with_path_context("read scene", path)?;
        let scene = SceneDocument::parse(&content, path)?.into_scene()?;
        debug!("loaded {} nodes from {}", scene.len(), path.display());
        Ok(Hierarchy::new(scene).with_sort_key_step(self.settings.sort_key_step))
    }

    /// Write the scene back, replacing the file atomically.
    #[instrument(level = "debug", skip(self, hierarchy))]
    pub fn save(&self, path: &Path, hierarchy: &Hierarchy<Scene>) -> ApplicationResult<()> {
        let content = SceneDocument::from_scene(hierarchy.scene()).to_toml()?;
        self.fs
            .write_atomic(path, &content)
            .with_path_context("write scene", path)?;
        info!("saved {} nodes to {}", hierarchy.scene().len(), path.display());
        Ok(())
    }

    /// Load, apply `edit`, save. Nothing is written when the edit fails.
    pub fn edit<T, F>(&self, path: &Path, edit: F) -> ApplicationResult<T>
    where
        F: FnOnce(&mut Hierarchy<Scene>) -> DomainResult<T>,
    {
        let mut hierarchy = self.load(path)?;
        let result = edit(&mut hierarchy)?;
        self.save(path, &hierarchy)?;
        Ok(result)
    }
}
