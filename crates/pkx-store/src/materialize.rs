use crate::layout::check_relative;
use crate::{fsync_dir, StoreError};
use pkx_schema::{ModuleId, SourceProvider, WrapRecord};
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// A record paired with the source it should be written from.
#[derive(Debug, Clone)]
pub struct WrapJob {
    pub record: WrapRecord,
    pub source: Arc<dyn SourceProvider>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MaterializedModule {
    pub module_id: ModuleId,
    pub relative_path: String,
    pub output_file: String,
    pub bytes: usize,
    /// blake3 of the written source.
    pub digest: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MaterializeFailure {
    pub module_id: ModuleId,
    pub relative_path: String,
    pub reason: String,
}

/// Outcome of a batch, in the order the jobs were given.
#[derive(Debug, Default, Serialize)]
pub struct MaterializeReport {
    pub written: Vec<MaterializedModule>,
    pub failed: Vec<MaterializeFailure>,
    /// Jobs dropped because their module identity was already written.
    pub duplicates: usize,
}

impl MaterializeReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

enum Outcome {
    Written(MaterializedModule),
    Failed(MaterializeFailure),
    Duplicate,
}

/// Writes module sources to their output files, at most once per module identity.
///
/// The claim ledger is shared by all workers of a batch; claiming an identity
/// is a single check-and-mark under one lock, so two jobs for the same module
/// can never both write.
#[derive(Debug, Default)]
pub struct Materializer {
    claimed: Mutex<HashSet<ModuleId>>,
}

impl Materializer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `id` as taken. Returns `false` if it was already claimed.
    pub fn claim(&self, id: &ModuleId) -> bool {
        match self.claimed.lock() {
            Ok(mut set) => set.insert(id.clone()),
            Err(poisoned) => poisoned.into_inner().insert(id.clone()),
        }
    }

    /// Write one module. Returns `Ok(None)` when the identity was already claimed.
    pub fn materialize(
        &self,
        record: &WrapRecord,
        source: &dyn SourceProvider,
    ) -> Result<Option<MaterializedModule>, StoreError> {
        if !self.claim(&record.module_id) {
            debug!("module '{}' already materialized", record.module_id);
            return Ok(None);
        }
        write_module(record, source).map(Some)
    }

    /// Write a batch of modules on up to `workers` threads.
    ///
    /// A failing module is recorded and the batch carries on. Once
    /// `should_stop` returns true no further module is started; the rest are
    /// reported as interrupted.
    pub fn materialize_all(
        &self,
        jobs: &[WrapJob],
        workers: usize,
        should_stop: impl Fn() -> bool + Sync,
    ) -> MaterializeReport {
        let workers = workers.clamp(1, jobs.len().max(1));
        let next = AtomicUsize::new(0);
        let outcomes: Mutex<Vec<(usize, Outcome)>> = Mutex::new(Vec::with_capacity(jobs.len()));

        std::thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| loop {
                    let i = next.fetch_add(1, Ordering::SeqCst);
                    let Some(job) = jobs.get(i) else {
                        break;
                    };
                    let outcome = if should_stop() {
                        Outcome::Failed(failure(&job.record, "interrupted".to_owned()))
                    } else {
                        match self.materialize(&job.record, job.source.as_ref()) {
                            Ok(Some(written)) => Outcome::Written(written),
                            Ok(None) => Outcome::Duplicate,
                            Err(e) => {
                                warn!("could not wrap module '{}': {e}", job.record.module_id);
                                Outcome::Failed(failure(&job.record, e.to_string()))
                            }
                        }
                    };
                    match outcomes.lock() {
                        Ok(mut out) => out.push((i, outcome)),
                        Err(poisoned) => poisoned.into_inner().push((i, outcome)),
                    }
                });
            }
        });

        let mut outcomes = match outcomes.into_inner() {
            Ok(v) => v,
            Err(poisoned) => poisoned.into_inner(),
        };
        outcomes.sort_by_key(|(i, _)| *i);

        let mut report = MaterializeReport::default();
        for (_, outcome) in outcomes {
            match outcome {
                Outcome::Written(m) => report.written.push(m),
                Outcome::Failed(f) => report.failed.push(f),
                Outcome::Duplicate => report.duplicates += 1,
            }
        }
        report
    }
}

fn failure(record: &WrapRecord, reason: String) -> MaterializeFailure {
    MaterializeFailure {
        module_id: record.module_id.clone(),
        relative_path: record.relative_path(),
        reason,
    }
}

fn write_module(record: &WrapRecord, source: &dyn SourceProvider) -> Result<MaterializedModule, StoreError> {
    let module_err = |path: &Path, source: std::io::Error| StoreError::ModuleIo {
        module: record.module_id.to_string(),
        path: path.display().to_string(),
        source,
    };

    check_relative(&record.file_name)?;
    let code = source
        .read_source()
        .map_err(|e| module_err(&record.output_file, e))?;

    let dir = record
        .output_file
        .parent()
        .unwrap_or(record.output_dir.as_path());
    fs::create_dir_all(dir).map_err(|e| module_err(dir, e))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| module_err(dir, e))?;
    tmp.write_all(code.as_bytes())
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| module_err(&record.output_file, e))?;
    tmp.persist(&record.output_file)
        .map_err(|e| module_err(&record.output_file, e.error))?;
    fsync_dir(dir).map_err(|e| module_err(dir, e))?;

    debug!(
        "wrote module '{}' to {}",
        record.module_id,
        record.output_file.display()
    );

    Ok(MaterializedModule {
        module_id: record.module_id.clone(),
        relative_path: record.relative_path(),
        output_file: record.output_file.display().to_string(),
        bytes: code.len(),
        digest: blake3::hash(code.as_bytes()).to_hex().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::OutputLayout;
    use pkx_schema::{CanonicalName, InlineSource};

    fn record(layout: &OutputLayout, id: &str, name: &str, file: &str) -> WrapRecord {
        WrapRecord {
            module: 0,
            module_id: ModuleId::new(id),
            canonical_name: CanonicalName::new(name),
            file_name: file.to_owned(),
            output_dir: layout.module_dir(name),
            output_file: layout.module_file(name, file),
        }
    }

    fn job(record: WrapRecord, code: &str) -> WrapJob {
        WrapJob {
            record,
            source: Arc::new(InlineSource::new(code)),
        }
    }

    #[test]
    fn materialize_writes_source() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new(dir.path());
        let rec = record(&layout, "acme.widgets.1.0.0/", "acme.widgets", "widgets.js");

        let written = Materializer::new()
            .materialize(&rec, &InlineSource::new("var w = 1;"))
            .unwrap()
            .unwrap();

        assert_eq!(written.relative_path, "acme.widgets/widgets.js");
        assert_eq!(written.bytes, 10);
        assert_eq!(fs::read_to_string(&rec.output_file).unwrap(), "var w = 1;");
    }

    #[test]
    fn materialize_overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new(dir.path());
        let rec = record(&layout, "a/", "a", "a.js");
        fs::create_dir_all(&rec.output_dir).unwrap();
        fs::write(&rec.output_file, "stale content that is longer").unwrap();

        Materializer::new()
            .materialize(&rec, &InlineSource::new("fresh"))
            .unwrap();

        assert_eq!(fs::read_to_string(&rec.output_file).unwrap(), "fresh");
    }

    #[test]
    fn materialize_creates_nested_submodule_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new(dir.path());
        let rec = record(&layout, "a.1/lib/extra.js", "a", "lib/extra.js");

        Materializer::new()
            .materialize(&rec, &InlineSource::new("x"))
            .unwrap();

        assert!(dir.path().join("a/lib/extra.js").is_file());
    }

    #[test]
    fn second_claim_of_same_identity_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new(dir.path());
        let rec = record(&layout, "a/", "a", "a.js");
        let m = Materializer::new();

        assert!(m.materialize(&rec, &InlineSource::new("1")).unwrap().is_some());
        assert!(m.materialize(&rec, &InlineSource::new("2")).unwrap().is_none());
        assert_eq!(fs::read_to_string(&rec.output_file).unwrap(), "1");
    }

    #[test]
    fn rejects_escaping_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new(dir.path());
        let rec = record(&layout, "a/", "a", "../evil.js");
        assert!(Materializer::new()
            .materialize(&rec, &InlineSource::new("x"))
            .is_err());
    }

    #[test]
    fn batch_continues_past_failures() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new(dir.path());
        // A regular file where a module directory should go makes that module fail.
        fs::write(dir.path().join("blocked"), "not a dir").unwrap();

        let jobs = vec![
            job(record(&layout, "first/", "first", "first.js"), "1"),
            job(record(&layout, "blocked/", "blocked", "blocked.js"), "2"),
            job(record(&layout, "third/", "third", "third.js"), "3"),
        ];
        let report = Materializer::new().materialize_all(&jobs, 2, || false);

        assert_eq!(report.written.len(), 2);
        assert_eq!(report.written[0].module_id, "first/");
        assert_eq!(report.written[1].module_id, "third/");
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].module_id, "blocked/");
        assert!(!report.is_complete());
    }

    #[test]
    fn batch_dedups_concurrent_identities() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new(dir.path());
        let jobs: Vec<WrapJob> = (0..16)
            .map(|_| job(record(&layout, "shared/", "shared", "shared.js"), "s"))
            .collect();

        let report = Materializer::new().materialize_all(&jobs, 8, || false);

        assert_eq!(report.written.len(), 1);
        assert_eq!(report.duplicates, 15);
    }

    #[test]
    fn stop_flag_interrupts_remaining_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new(dir.path());
        let jobs = vec![
            job(record(&layout, "a/", "a", "a.js"), "a"),
            job(record(&layout, "b/", "b", "b.js"), "b"),
        ];

        let report = Materializer::new().materialize_all(&jobs, 1, || true);

        assert!(report.written.is_empty());
        assert_eq!(report.failed.len(), 2);
        assert!(report.failed.iter().all(|f| f.reason == "interrupted"));
        assert!(!dir.path().join("a").exists());
    }

    #[test]
    fn rewriting_identical_source_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new(dir.path());
        let rec = record(&layout, "a/", "a", "a.js");

        let first = Materializer::new()
            .materialize(&rec, &InlineSource::new("same"))
            .unwrap()
            .unwrap();
        let second = Materializer::new()
            .materialize(&rec, &InlineSource::new("same"))
            .unwrap()
            .unwrap();

        assert_eq!(first.digest, second.digest);
    }
}
