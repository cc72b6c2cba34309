//! The dependency-injected registry bundle shared by all tasks.
//!
//! Built once per host process and passed by `Arc` into every
//! [`crate::task::TaskLoop`]. Everything here is read-only after
//! construction except the terminal registry and edit coordinator, which
//! synchronize internally.

use std::path::Path;
use std::sync::Arc;

use taskloom_config::ModeRegistry;

use crate::catalog::ToolCatalog;
use crate::tools::{EditCoordinator, ExternalDeps, TerminalRegistry};
use crate::workspace::WorkspaceGuard;

pub struct Engine {
    pub(crate) catalog: Arc<ToolCatalog>,
    pub(crate) modes: Arc<ModeRegistry>,
    pub(crate) workspace: Arc<WorkspaceGuard>,
    pub(crate) deps: Arc<ExternalDeps>,
    pub(crate) terminals: Arc<TerminalRegistry>,
    pub(crate) edits: Arc<EditCoordinator>,
}

impl Engine {
    /// Engine with built-in catalog and modes and no collaborators.
    pub fn new(workspace_root: &Path) -> anyhow::Result<Self> {
        Ok(Self {
            catalog: Arc::new(ToolCatalog::builtin()),
            modes: Arc::new(ModeRegistry::builtin()),
            workspace: Arc::new(WorkspaceGuard::new(workspace_root)?),
            deps: Arc::new(ExternalDeps::default()),
            terminals: Arc::new(TerminalRegistry::new()),
            edits: Arc::new(EditCoordinator::new()),
        })
    }

    pub fn with_modes(mut self, modes: ModeRegistry) -> Self {
        self.modes = Arc::new(modes);
        self
    }

    pub fn with_deps(mut self, deps: ExternalDeps) -> Self {
        self.deps = Arc::new(deps);
        self
    }

    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    pub fn modes(&self) -> &ModeRegistry {
        &self.modes
    }

    pub fn workspace(&self) -> &WorkspaceGuard {
        &self.workspace
    }

    pub fn terminals(&self) -> &TerminalRegistry {
        &self.terminals
    }
}
