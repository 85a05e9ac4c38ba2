//! The resolved module graph handed over by a resolver.
//!
//! Modules live in an arena and refer to their dependencies by index, so a
//! graph may contain diamonds and, in principle, cycles without shared
//! ownership. Indices are assigned on first insertion and never change.

use crate::package::PackageMeta;
use crate::types::{CanonicalName, ModuleId};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Stable arena index of a module inside a [`ModuleGraph`].
pub type ModuleIndex = usize;

/// Lazily reads a module's source text.
pub trait SourceProvider: Send + Sync + fmt::Debug {
    fn read_source(&self) -> std::io::Result<String>;
}

/// Source text read from a file on first use.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SourceProvider for FileSource {
    fn read_source(&self) -> std::io::Result<String> {
        std::fs::read_to_string(&self.path)
    }
}

/// Source text held in memory.
#[derive(Debug, Clone)]
pub struct InlineSource {
    text: String,
}

impl InlineSource {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl SourceProvider for InlineSource {
    fn read_source(&self) -> std::io::Result<String> {
        Ok(self.text.clone())
    }
}

/// Whether a module carries packaging metadata.
#[derive(Debug, Clone, PartialEq)]
pub enum ModuleKind {
    Wrappable(PackageMeta),
    Opaque,
}

#[derive(Debug, Clone)]
pub struct Module {
    pub id: ModuleId,
    pub kind: ModuleKind,
    pub dependencies: Vec<ModuleIndex>,
    source: Arc<dyn SourceProvider>,
}

impl Module {
    pub fn new(id: impl Into<ModuleId>, kind: ModuleKind, source: impl SourceProvider + 'static) -> Self {
        Self {
            id: id.into(),
            kind,
            dependencies: Vec::new(),
            source: Arc::new(source),
        }
    }

    pub fn meta(&self) -> Option<&PackageMeta> {
        match &self.kind {
            ModuleKind::Wrappable(meta) => Some(meta),
            ModuleKind::Opaque => None,
        }
    }

    #[inline]
    pub fn is_wrappable(&self) -> bool {
        matches!(self.kind, ModuleKind::Wrappable(_))
    }

    pub fn read_source(&self) -> std::io::Result<String> {
        self.source.read_source()
    }

    pub fn source(&self) -> Arc<dyn SourceProvider> {
        Arc::clone(&self.source)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ModuleGraph {
    modules: Vec<Module>,
    by_id: HashMap<ModuleId, ModuleIndex>,
    roots: Vec<ModuleIndex>,
}

impl ModuleGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a module and return its index.
    ///
    /// A module whose id is already present is not inserted again; the index
    /// of the existing entry is returned.
    pub fn insert(&mut self, module: Module) -> ModuleIndex {
        if let Some(&idx) = self.by_id.get(&module.id) {
            return idx;
        }
        let idx = self.modules.len();
        self.by_id.insert(module.id.clone(), idx);
        self.modules.push(module);
        idx
    }

    /// Record that `from` depends on `to`. Out-of-range indices are ignored.
    pub fn add_dependency(&mut self, from: ModuleIndex, to: ModuleIndex) {
        if to >= self.modules.len() {
            return;
        }
        if let Some(module) = self.modules.get_mut(from) {
            module.dependencies.push(to);
        }
    }

    pub fn add_root(&mut self, idx: ModuleIndex) {
        if idx < self.modules.len() {
            self.roots.push(idx);
        }
    }

    #[inline]
    pub fn get(&self, idx: ModuleIndex) -> Option<&Module> {
        self.modules.get(idx)
    }

    pub fn index_of(&self, id: &str) -> Option<ModuleIndex> {
        self.by_id.get(&ModuleId::new(id)).copied()
    }

    #[inline]
    pub fn roots(&self) -> &[ModuleIndex] {
        &self.roots
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ModuleIndex, &Module)> {
        self.modules.iter().enumerate()
    }
}

/// One wrappable module scheduled for materialization, in walk order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WrapRecord {
    pub module: ModuleIndex,
    pub module_id: ModuleId,
    pub canonical_name: CanonicalName,
    pub file_name: String,
    pub output_dir: PathBuf,
    pub output_file: PathBuf,
}

impl WrapRecord {
    /// `<canonical name>/<file name>`, relative to the output root. This is
    /// the string the loader script and the cache manifest refer to.
    pub fn relative_path(&self) -> String {
        format!("{}/{}", self.canonical_name, self.file_name)
    }
}
