//! Dependency-first traversal of a resolved module graph.
//!
//! The walk is an explicit work list over arena indices. Every module is
//! emitted after all of its dependencies and at most once; opaque modules are
//! skipped but their dependencies are still walked. A dependency cycle is an
//! error, since no order could then put every dependency first.

use crate::CoreError;
use pkx_schema::{entry_name, ModuleGraph, ModuleId, ModuleIndex, ModuleKind, WrapRecord};
use pkx_store::OutputLayout;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    NoPackageMetadata,
    InvalidEntry { message: String },
    PathConflict { with: ModuleId },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoPackageMetadata => f.write_str("not a pkx module"),
            Self::InvalidEntry { message } => f.write_str(message),
            Self::PathConflict { with } => write!(f, "output path already taken by '{with}'"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedModule {
    pub module_id: ModuleId,
    pub reason: SkipReason,
}

#[derive(Debug, Default)]
pub struct WalkOutcome {
    pub records: Vec<WrapRecord>,
    pub skipped: Vec<SkippedModule>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnStack,
    Done,
}

/// Walk from the graph's own roots.
pub fn walk(graph: &ModuleGraph, layout: &OutputLayout) -> Result<WalkOutcome, CoreError> {
    walk_from(graph, graph.roots(), layout)
}

pub fn walk_from(
    graph: &ModuleGraph,
    roots: &[ModuleIndex],
    layout: &OutputLayout,
) -> Result<WalkOutcome, CoreError> {
    let mut marks = vec![Mark::Unvisited; graph.len()];
    let mut outcome = WalkOutcome::default();
    let mut taken: HashMap<String, ModuleId> = HashMap::new();
    // (module, index of the next dependency to visit)
    let mut stack: Vec<(ModuleIndex, usize)> = Vec::new();

    for &root in roots {
        if root >= graph.len() || marks[root] != Mark::Unvisited {
            continue;
        }
        marks[root] = Mark::OnStack;
        stack.push((root, 0));

        while let Some(&(idx, next)) = stack.last() {
            let deps = graph.get(idx).map_or(&[][..], |m| m.dependencies.as_slice());
            if let Some(&dep) = deps.get(next) {
                if let Some(top) = stack.last_mut() {
                    top.1 += 1;
                }
                match marks.get(dep).copied() {
                    Some(Mark::Unvisited) => {
                        marks[dep] = Mark::OnStack;
                        stack.push((dep, 0));
                    }
                    Some(Mark::OnStack) => return Err(cycle_error(graph, &stack, dep)),
                    Some(Mark::Done) | None => {}
                }
                continue;
            }

            stack.pop();
            marks[idx] = Mark::Done;
            emit(graph, idx, layout, &mut taken, &mut outcome);
        }
    }

    debug!(
        "walk produced {} record(s), skipped {}",
        outcome.records.len(),
        outcome.skipped.len()
    );
    Ok(outcome)
}

fn emit(
    graph: &ModuleGraph,
    idx: ModuleIndex,
    layout: &OutputLayout,
    taken: &mut HashMap<String, ModuleId>,
    outcome: &mut WalkOutcome,
) {
    let Some(module) = graph.get(idx) else {
        return;
    };
    let mut skip = |reason: SkipReason| {
        warn!("ignoring module '{}': {reason}", module.id);
        outcome.skipped.push(SkippedModule {
            module_id: module.id.clone(),
            reason,
        });
    };

    let meta = match &module.kind {
        ModuleKind::Wrappable(meta) => meta,
        ModuleKind::Opaque => return skip(SkipReason::NoPackageMetadata),
    };
    let (canonical, file_name) = match entry_name(&module.id, meta) {
        Ok(entry) => entry,
        Err(e) => {
            return skip(SkipReason::InvalidEntry {
                message: e.to_string(),
            })
        }
    };

    let record = WrapRecord {
        module: idx,
        module_id: module.id.clone(),
        output_dir: layout.module_dir(&canonical),
        output_file: layout.module_file(&canonical, &file_name),
        canonical_name: canonical,
        file_name,
    };
    let rel = record.relative_path();
    if let Some(owner) = taken.get(&rel) {
        return skip(SkipReason::PathConflict { with: owner.clone() });
    }
    taken.insert(rel, module.id.clone());
    outcome.records.push(record);
}

fn cycle_error(graph: &ModuleGraph, stack: &[(ModuleIndex, usize)], back_to: ModuleIndex) -> CoreError {
    let start = stack
        .iter()
        .position(|&(idx, _)| idx == back_to)
        .unwrap_or(0);
    let path: Vec<String> = stack[start..]
        .iter()
        .map(|&(idx, _)| idx)
        .chain(std::iter::once(back_to))
        .filter_map(|idx| graph.get(idx).map(|m| m.id.to_string()))
        .collect();
    CoreError::Cycle(path.join(" -> "))
}
