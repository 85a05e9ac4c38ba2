use crate::failure::{ModuleSummary, RequestFailure, ResolveError, ResolveFailure};
use pkx_schema::{
    parse_package_file, FileSource, Module, ModuleGraph, ModuleIndex, ModuleKind, PackageRequest,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Result of one resolution call.
///
/// Requests that resolved are roots of `graph`; the others are described in
/// `failure`. A caller may go on with the resolved roots.
#[derive(Debug, Default)]
pub struct Resolution {
    pub graph: ModuleGraph,
    pub failure: Option<ResolveFailure>,
}

impl Resolution {
    /// Fail if any request failed.
    pub fn into_result(self) -> Result<ModuleGraph, ResolveFailure> {
        match self.failure {
            Some(failure) if !failure.is_empty() => Err(failure),
            _ => Ok(self.graph),
        }
    }
}

/// Turns package requests into a module graph.
///
/// The call is the wrap's single wait point: it returns only once the whole
/// graph (or its failure tree) is known.
pub trait Resolver: Send + Sync {
    fn name(&self) -> &str;

    fn resolve(&self, requests: &[PackageRequest]) -> Resolution;
}

/// Serves an already-built graph, ignoring the requests.
#[derive(Debug, Clone, Default)]
pub struct GraphResolver {
    graph: ModuleGraph,
}

impl GraphResolver {
    pub fn new(graph: ModuleGraph) -> Self {
        Self { graph }
    }
}

impl Resolver for GraphResolver {
    fn name(&self) -> &'static str {
        "graph"
    }

    fn resolve(&self, _requests: &[PackageRequest]) -> Resolution {
        Resolution {
            graph: self.graph.clone(),
            failure: None,
        }
    }
}

/// Resolves packages from a local repository directory.
///
/// A request naming an explicit path (`./`, `../`, `/`) is taken relative to
/// the requesting package (or the project for root requests); any other
/// request is looked up as `<repository>/<package>`. Directories must contain
/// a `package.json`; plain files become opaque modules.
#[derive(Debug, Clone)]
pub struct RepositoryResolver {
    repository: PathBuf,
    project_root: PathBuf,
}

impl RepositoryResolver {
    pub fn new(repository: impl Into<PathBuf>, project_root: impl Into<PathBuf>) -> Self {
        Self {
            repository: repository.into(),
            project_root: project_root.into(),
        }
    }

    fn locate(&self, package: &str, base: &Path) -> PathBuf {
        if package.starts_with("./") || package.starts_with("../") || package.starts_with('/') {
            base.join(package)
        } else {
            self.repository.join(package)
        }
    }
}

impl Resolver for RepositoryResolver {
    fn name(&self) -> &'static str {
        "repository"
    }

    fn resolve(&self, requests: &[PackageRequest]) -> Resolution {
        info!(
            "resolving {} request(s) against {}",
            requests.len(),
            self.repository.display()
        );
        let mut session = Session {
            resolver: self,
            graph: ModuleGraph::new(),
            memo: HashMap::new(),
        };
        let mut failure = ResolveFailure::default();
        if !self.repository.is_dir() {
            failure.loader.push(format!(
                "package repository '{}' does not exist",
                self.repository.display()
            ));
        }

        for request in requests {
            match session.resolve(request, &self.project_root) {
                Ok(idx) => session.graph.add_root(idx),
                Err(f) => failure.requests.push(f),
            }
        }

        let failure = if failure.requests.is_empty() {
            None
        } else {
            Some(failure)
        };
        Resolution {
            graph: session.graph,
            failure,
        }
    }
}

struct Session<'a> {
    resolver: &'a RepositoryResolver,
    graph: ModuleGraph,
    /// Keyed by location. A module is recorded before its dependencies are
    /// resolved, so a cyclic repository terminates and yields a cyclic graph.
    memo: HashMap<PathBuf, Result<ModuleIndex, RequestFailure>>,
}

impl Session<'_> {
    fn resolve(&mut self, request: &PackageRequest, base: &Path) -> Result<ModuleIndex, RequestFailure> {
        let location = self.resolver.locate(&request.package, base);
        if let Some(done) = self.memo.get(&location) {
            return done.clone();
        }

        let fail = |errors: Vec<ResolveError>, module: Option<ModuleSummary>| RequestFailure {
            request: request.clone(),
            module,
            errors,
        };

        if location.is_file() {
            debug!("resolved '{}' as opaque module", request.package);
            let idx = self.graph.insert(Module::new(
                request.package.as_str(),
                ModuleKind::Opaque,
                FileSource::new(&location),
            ));
            self.memo.insert(location, Ok(idx));
            return Ok(idx);
        }

        if !location.is_dir() {
            let failure = fail(
                vec![ResolveError::failed(format!(
                    "package '{}' not found at {}",
                    request.package,
                    location.display()
                ))],
                None,
            );
            self.memo.insert(location, Err(failure.clone()));
            return Err(failure);
        }

        let meta = match parse_package_file(location.join("package.json")) {
            Ok(meta) => meta,
            Err(e) => {
                let failure = fail(
                    vec![ResolveError::failed(format!(
                        "could not load package metadata for '{}'",
                        request.package
                    ))
                    .caused_by(ResolveError::failed(e.to_string()))],
                    None,
                );
                self.memo.insert(location, Err(failure.clone()));
                return Err(failure);
            }
        };

        let main = location.join(&meta.main);
        let deps = meta.effective_dependencies().to_vec();
        let idx = self.graph.insert(Module::new(
            format!("{}/", meta.id),
            ModuleKind::Wrappable(meta.clone()),
            FileSource::new(&main),
        ));
        self.memo.insert(location.clone(), Ok(idx));
        debug!("resolved '{}' as module '{}/'", request.package, meta.id);

        let mut errors = Vec::new();
        if meta.main.trim().is_empty() || !main.is_file() {
            errors.push(ResolveError::failed(format!(
                "main entry '{}' of package '{}' not found",
                meta.main, meta.id
            )));
        }

        let mut dep_failures = Vec::new();
        for dep in &deps {
            let mut dep_request = dep.to_request();
            dep_request.raw |= request.raw;
            dep_request.wrap |= request.wrap;
            match self.resolve(&dep_request, &location) {
                Ok(d) => self.graph.add_dependency(idx, d),
                Err(f) => dep_failures.push(f),
            }
        }
        if !dep_failures.is_empty() {
            errors.push(ResolveError::Dependency {
                failure: ResolveFailure {
                    loader: Vec::new(),
                    requests: dep_failures,
                },
            });
        }

        if errors.is_empty() {
            return Ok(idx);
        }
        let failure = fail(errors, ModuleSummary::from_graph(&self.graph, idx));
        self.memo.insert(location, Err(failure.clone()));
        Err(failure)
    }
}
