//! Package metadata, requests, module identity, and the resolved module graph for pkx.
//!
//! This crate defines the schema layer: `package.json` parsing (`PackageMeta`),
//! package requests and request-argument parsing (`PackageRequest`), canonical
//! module naming (`canonical_name`), semantic version bumping (`Version`), and
//! the arena-backed `ModuleGraph` produced by a resolver and consumed by the
//! wrap pipeline as `WrapRecord`s.

pub mod graph;
pub mod identity;
pub mod package;
pub mod request;
pub mod types;
pub mod version;

pub use graph::{
    FileSource, InlineSource, Module, ModuleGraph, ModuleIndex, ModuleKind, SourceProvider,
    WrapRecord,
};
pub use identity::{canonical_name, entry_name, is_version_segment, EntryError};
pub use package::{
    parse_package_file, parse_package_str, rewrite_version, DependencySpec, PackageError,
    PackageMeta,
};
pub use request::{parse_request_argument, requests_for_wrap, PackageRequest, RequestError};
pub use types::{CanonicalName, ModuleId};
pub use version::{BumpKind, Version, VersionError};
