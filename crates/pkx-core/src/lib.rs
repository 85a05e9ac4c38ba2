//! Core orchestration for pkx module wrapping.
//!
//! This crate ties the schema and store layers together: the `Resolver` seam
//! and its local `RepositoryResolver`, the dependency-first `walk` over a
//! resolved `ModuleGraph`, and the `Engine` that materializes modules, writes
//! the loader script, and merges the offline cache manifest. It also carries
//! the package `build` (version bump plus `.pkx` archive), project cloning and
//! git pre-commit hook management, configuration loading, and interrupt handling.

pub mod archive;
pub mod concurrency;
pub mod config;
pub mod engine;
pub mod failure;
pub mod git;
pub mod hooks;
pub mod resolver;
pub mod walk;

pub use archive::pack_project;
pub use concurrency::{install_signal_handler, shutdown_requested};
pub use config::PkxConfig;
pub use engine::{
    AppCacheReport, BuildOptions, BuildResult, Engine, UnsatisfiedModule, WrapOptions, WrapReport,
};
pub use failure::{ModuleSummary, RequestFailure, ResolveError, ResolveFailure};
pub use git::{clone_dir_name, clone_project};
pub use hooks::{install_hook, uninstall_hook, PRE_COMMIT_HOOK};
pub use resolver::{GraphResolver, RepositoryResolver, Resolution, Resolver};
pub use walk::{walk, walk_from, SkipReason, SkippedModule, WalkOutcome};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("package error: {0}")]
    Package(#[from] pkx_schema::PackageError),
    #[error("request error: {0}")]
    Request(#[from] pkx_schema::RequestError),
    #[error("version error: {0}")]
    Version(#[from] pkx_schema::VersionError),
    #[error("store error: {0}")]
    Store(#[from] pkx_store::StoreError),
    #[error("resolution failed: {0}")]
    Resolve(#[from] ResolveFailure),
    #[error("dependency cycle detected: {0}")]
    Cycle(String),
    #[error("archive error: {0}")]
    Archive(String),
    #[error("hook error: {0}")]
    Hook(String),
    #[error("git error: {0}")]
    Git(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
