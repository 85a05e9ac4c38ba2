use crate::archive::pack_project;
use crate::concurrency::shutdown_requested;
use crate::failure::{ModuleSummary, ResolveFailure};
use crate::resolver::{Resolution, Resolver};
use crate::walk::{walk, SkippedModule};
use crate::{git, CoreError};
use pkx_schema::{
    canonical_name, parse_package_file, rewrite_version, BumpKind, ModuleGraph, ModuleId,
    PackageRequest, Version,
};
use pkx_store::{
    generate_loader, merge_appcache_file, write_loader, MaterializeFailure, MaterializedModule,
    Materializer, MergeOutcome, OutputLayout, WrapJob,
};
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Orchestrates wrapping, inspection, and packaging for one project.
///
/// All artifacts land below the layout's output root; the project root is
/// where `package.json` and the `build/` directory live.
pub struct Engine {
    layout: OutputLayout,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrapOptions {
    /// Loader script file name, relative to the output root.
    pub loader: Option<String>,
    /// Cache manifest file name, relative to the output root.
    pub appcache: Option<String>,
    pub polyfill: bool,
    pub jobs: usize,
}

impl Default for WrapOptions {
    fn default() -> Self {
        Self {
            loader: None,
            appcache: None,
            polyfill: true,
            jobs: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AppCacheReport {
    pub path: String,
    #[serde(flatten)]
    pub outcome: MergeOutcome,
}

/// A written module that depends directly on a module that failed to write.
#[derive(Debug, Clone, Serialize)]
pub struct UnsatisfiedModule {
    pub module_id: ModuleId,
    pub failed_dependencies: Vec<ModuleId>,
}

/// Everything one wrap did.
#[derive(Debug, Default, Serialize)]
pub struct WrapReport {
    /// Relative paths of all wrappable modules, dependencies first.
    pub order: Vec<String>,
    pub written: Vec<MaterializedModule>,
    pub skipped: Vec<SkippedModule>,
    pub failed: Vec<MaterializeFailure>,
    /// Written modules left without some of their dependencies.
    pub unsatisfied: Vec<UnsatisfiedModule>,
    pub loader: Option<String>,
    pub appcache: Option<AppCacheReport>,
    /// Requests that did not resolve; the rest of the wrap went ahead without them.
    pub resolve_failure: Option<ResolveFailure>,
}

impl WrapReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.resolve_failure.is_none()
    }

    pub fn written_paths(&self) -> Vec<String> {
        self.written.iter().map(|m| m.relative_path.clone()).collect()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BuildOptions {
    pub bump: BumpKind,
    /// Move the git tag from the previous version to the new one.
    pub tag: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildResult {
    pub previous_version: String,
    pub version: String,
    pub archive: PathBuf,
    pub entries: Vec<String>,
    pub tagged: bool,
}

impl Engine {
    pub fn new(layout: OutputLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// Resolve `requests` and wrap whatever resolved.
    ///
    /// Fails outright only when nothing resolved at all; otherwise the
    /// unresolved requests are carried in the report.
    pub fn wrap(
        &self,
        resolver: &dyn Resolver,
        requests: &[PackageRequest],
        options: &WrapOptions,
    ) -> Result<WrapReport, CoreError> {
        info!(
            "resolving {} request(s) with the {} resolver",
            requests.len(),
            resolver.name()
        );
        let Resolution { graph, failure } = resolver.resolve(requests);
        let failure = failure.filter(|f| !f.is_empty());
        if graph.roots().is_empty() {
            if let Some(failure) = failure {
                return Err(CoreError::Resolve(failure));
            }
        }
        if let Some(f) = &failure {
            warn!("{f}; wrapping the rest");
        }

        let mut report = self.wrap_graph(&graph, options)?;
        report.resolve_failure = failure;
        Ok(report)
    }

    /// Walk, materialize, and write the loader and manifest for a resolved graph.
    pub fn wrap_graph(
        &self,
        graph: &ModuleGraph,
        options: &WrapOptions,
    ) -> Result<WrapReport, CoreError> {
        // Reject bad artifact names before any module is written.
        let loader_path = options
            .loader
            .as_deref()
            .map(|name| self.layout.artifact_path(name))
            .transpose()?;
        let appcache_path = options
            .appcache
            .as_deref()
            .map(|name| self.layout.artifact_path(name))
            .transpose()?;

        let outcome = walk(graph, &self.layout)?;
        let order: Vec<String> = outcome.records.iter().map(|r| r.relative_path()).collect();
        debug!("wrap order: {order:?}");

        let jobs: Vec<WrapJob> = outcome
            .records
            .into_iter()
            .filter_map(|record| {
                let source = graph.get(record.module)?.source();
                Some(WrapJob { record, source })
            })
            .collect();
        let materialized =
            Materializer::new().materialize_all(&jobs, options.jobs, shutdown_requested);
        let written: Vec<String> = materialized
            .written
            .iter()
            .map(|m| m.relative_path.clone())
            .collect();
        info!(
            "wrapped {} module(s), {} failed",
            written.len(),
            materialized.failed.len()
        );
        let unsatisfied = unsatisfied_modules(graph, &jobs, &materialized.failed);
        for module in &unsatisfied {
            warn!(
                "module '{}' was wrapped without its failed dependencies {:?}",
                module.module_id, module.failed_dependencies
            );
        }

        if let Some(path) = &loader_path {
            let script = generate_loader(&written, options.polyfill);
            write_loader(path, &script)?;
            info!("wrote loader {}", path.display());
        }

        let appcache = match &appcache_path {
            Some(path) => {
                let aux: Vec<String> = options.loader.iter().cloned().collect();
                let outcome = merge_appcache_file(path, &written, &aux)?;
                info!(
                    "merged {} new entries into {}",
                    outcome.added.len(),
                    path.display()
                );
                Some(AppCacheReport {
                    path: path.display().to_string(),
                    outcome,
                })
            }
            None => None,
        };

        Ok(WrapReport {
            order,
            written: materialized.written,
            skipped: outcome.skipped,
            failed: materialized.failed,
            unsatisfied,
            loader: loader_path.map(|p| p.display().to_string()),
            appcache,
            resolve_failure: None,
        })
    }

    /// Resolve `requests` and describe each requested module.
    pub fn info(
        &self,
        resolver: &dyn Resolver,
        requests: &[PackageRequest],
    ) -> Result<Vec<ModuleSummary>, CoreError> {
        let graph = resolver.resolve(requests).into_result()?;
        Ok(graph
            .roots()
            .iter()
            .filter_map(|&idx| ModuleSummary::from_graph(&graph, idx))
            .collect())
    }

    /// Bump the package version and pack the project into `build/<name>.pkx`.
    pub fn build(&self, options: BuildOptions) -> Result<BuildResult, CoreError> {
        let root = self.layout.project_root();
        let package_path = root.join("package.json");
        let meta = parse_package_file(&package_path)?;

        let previous: Version = match meta.version.as_deref() {
            Some(v) => v.parse()?,
            None => Version::new(0, 0, 0),
        };
        let version = previous.bump(options.bump);
        rewrite_version(&package_path, &version)?;
        info!("{}: {previous} -> {version}", meta.id);

        let build_dir = root.join("build");
        std::fs::create_dir_all(&build_dir)?;
        let archive = build_dir.join(format!("{}.pkx", canonical_name(&meta.id)));

        let mut excludes = vec!["build".to_owned(), "node_modules".to_owned()];
        excludes.extend(
            meta.effective_dependencies()
                .iter()
                .map(|dep| canonical_name(dep.package()).into_inner()),
        );
        let entries = pack_project(root, &archive, &excludes)?;
        info!("packed {} entries into {}", entries.len(), archive.display());

        let tagged = options.tag && git::retag(root, &previous.to_string(), &version.to_string());

        Ok(BuildResult {
            previous_version: previous.to_string(),
            version: version.to_string(),
            archive,
            entries,
            tagged,
        })
    }
}

fn unsatisfied_modules(
    graph: &ModuleGraph,
    jobs: &[WrapJob],
    failed: &[MaterializeFailure],
) -> Vec<UnsatisfiedModule> {
    let failed: HashSet<&ModuleId> = failed.iter().map(|f| &f.module_id).collect();
    if failed.is_empty() {
        return Vec::new();
    }
    jobs.iter()
        .filter(|job| !failed.contains(&job.record.module_id))
        .filter_map(|job| {
            let module = graph.get(job.record.module)?;
            let failed_dependencies: Vec<ModuleId> = module
                .dependencies
                .iter()
                .filter_map(|&dep| graph.get(dep))
                .map(|dep| dep.id.clone())
                .filter(|id| failed.contains(id))
                .collect();
            (!failed_dependencies.is_empty()).then(|| UnsatisfiedModule {
                module_id: job.record.module_id.clone(),
                failed_dependencies,
            })
        })
        .collect()
}
