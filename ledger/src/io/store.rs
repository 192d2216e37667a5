//! Durable run storage: one full record per run, keyed by `run_id`.
//!
//! [`FileStore`] keeps `<root>/runs/<run_id>.json` and replaces records with a
//! temp-file + rename so a crash leaves either the old or the new record.
//! [`MemoryStore`] keeps records in a map for tests and embedding.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, RwLock};

use anyhow::{Context, anyhow};
use jsonschema::{Validator, validator_for};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::core::ids::validate_run_id;
use crate::core::invariants::validate_run_invariants;
use crate::core::types::Run;
use crate::error::StoreError;

const RUN_RECORD_SCHEMA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../schemas/run_record/v1.schema.json"
));

/// Compiled once per process; `scan_for` and `list_runs` validate every file.
static RUN_RECORD_VALIDATOR: LazyLock<Result<Validator, String>> = LazyLock::new(|| {
    let schema: Value = serde_json::from_str(RUN_RECORD_SCHEMA)
        .map_err(|err| format!("parse run record schema: {err}"))?;
    validator_for(&schema).map_err(|err| format!("invalid run record schema: {err}"))
});

/// Storage contract consumed by the runtime.
///
/// `save` is a full-record overwrite and must be durable on return.
pub trait RunStore {
    fn load(&self, run_id: &str) -> Result<Run, StoreError>;
    fn save(&self, run: &Run) -> Result<(), StoreError>;
    /// All stored run ids, sorted ascending and deduplicated.
    fn list_runs(&self) -> Result<Vec<String>, StoreError>;

    fn exists(&self, run_id: &str) -> Result<bool, StoreError> {
        match self.load(run_id) {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }
}

impl<S: RunStore + ?Sized> RunStore for Box<S> {
    fn load(&self, run_id: &str) -> Result<Run, StoreError> {
        (**self).load(run_id)
    }

    fn save(&self, run: &Run) -> Result<(), StoreError> {
        (**self).save(run)
    }

    fn list_runs(&self) -> Result<Vec<String>, StoreError> {
        (**self).list_runs()
    }

    fn exists(&self, run_id: &str) -> Result<bool, StoreError> {
        (**self).exists(run_id)
    }
}

/// JSON-file store rooted at a caller-configured directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    runs_dir: PathBuf,
    fsync: bool,
}

impl FileStore {
    /// Store records under `<root>/runs/`.
    pub fn new(root: &Path) -> Self {
        Self {
            runs_dir: root.join("runs"),
            fsync: true,
        }
    }

    /// Skip `sync_all` calls. Only for throwaway stores.
    pub fn with_fsync(mut self, fsync: bool) -> Self {
        self.fsync = fsync;
        self
    }

    pub fn runs_dir(&self) -> &Path {
        &self.runs_dir
    }

    /// Path of the record for `run_id`.
    pub fn run_path(&self, run_id: &str) -> PathBuf {
        self.runs_dir.join(format!("{run_id}.json"))
    }

    fn checked_path(&self, run_id: &str) -> Result<PathBuf, StoreError> {
        validate_run_id(run_id).map_err(|err| StoreError::InvalidRunId {
            run_id: run_id.to_string(),
            reason: err.to_string(),
        })?;
        Ok(self.run_path(run_id))
    }

    /// Record files in the runs directory, sorted by name.
    fn record_files(&self) -> anyhow::Result<Vec<PathBuf>> {
        if !self.runs_dir.exists() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        let entries = fs::read_dir(&self.runs_dir)
            .with_context(|| format!("read runs dir {}", self.runs_dir.display()))?;
        for entry in entries {
            let entry =
                entry.with_context(|| format!("read entry in {}", self.runs_dir.display()))?;
            let path = entry.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Scan every record for a matching `run_id` when the file name does not
    /// match (renamed or copied records). Unreadable records are skipped.
    fn scan_for(&self, run_id: &str) -> Result<Run, StoreError> {
        for path in self.record_files()? {
            match read_run(&path) {
                Ok(run) if run.run_id == run_id => {
                    debug!(run_id, path = %path.display(), "found run by scan");
                    return Ok(run);
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(path = %path.display(), error = %format!("{err:#}"), "skipping unreadable run record");
                }
            }
        }
        Err(StoreError::NotFound {
            run_id: run_id.to_string(),
        })
    }
}

impl RunStore for FileStore {
    #[instrument(skip_all, fields(run_id = %run_id))]
    fn load(&self, run_id: &str) -> Result<Run, StoreError> {
        let path = self.checked_path(run_id)?;
        if !path.exists() {
            return self.scan_for(run_id);
        }
        let run = read_run(&path)?;
        if run.run_id != run_id {
            return Err(StoreError::Backend(anyhow!(
                "record {} holds run '{}'",
                path.display(),
                run.run_id
            )));
        }
        Ok(run)
    }

    #[instrument(skip_all, fields(run_id = %run.run_id, decisions = run.decisions.len()))]
    fn save(&self, run: &Run) -> Result<(), StoreError> {
        let path = self.checked_path(&run.run_id)?;
        let mut buf = serde_json::to_string_pretty(run)
            .with_context(|| format!("serialize run {}", run.run_id))?;
        buf.push('\n');
        write_atomic(&path, &buf, self.fsync)?;
        debug!(path = %path.display(), "run saved");
        Ok(())
    }

    /// Ids come from record contents, so renamed records list under their
    /// real `run_id`. Unreadable files list under their file stem and fail
    /// again on `load`.
    fn list_runs(&self) -> Result<Vec<String>, StoreError> {
        let mut ids = Vec::new();
        for path in self.record_files()? {
            match read_run(&path) {
                Ok(run) => ids.push(run.run_id),
                Err(_) => {
                    if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                        ids.push(stem.to_string());
                    }
                }
            }
        }
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    fn exists(&self, run_id: &str) -> Result<bool, StoreError> {
        Ok(self.checked_path(run_id)?.exists())
    }
}

/// Load a record from disk and validate it (schema + invariants).
pub fn read_run(path: &Path) -> anyhow::Result<Run> {
    debug!(path = %path.display(), "loading run record");
    let contents =
        fs::read_to_string(path).with_context(|| format!("read run {}", path.display()))?;
    let value: Value = serde_json::from_str(&contents)
        .with_context(|| format!("parse run {}", path.display()))?;
    validate_schema(&value).with_context(|| format!("validate run {}", path.display()))?;
    let run: Run = serde_json::from_value(value)
        .with_context(|| format!("deserialize run {}", path.display()))?;
    let errors = validate_run_invariants(&run);
    if !errors.is_empty() {
        return Err(anyhow!(
            "run invariants failed for {}: {}",
            path.display(),
            errors.join("; ")
        ));
    }
    Ok(run)
}

fn validate_schema(record: &Value) -> anyhow::Result<()> {
    let compiled = RUN_RECORD_VALIDATOR
        .as_ref()
        .map_err(|err| anyhow!("{err}"))?;
    if !compiled.is_valid(record) {
        let messages = compiled
            .iter_errors(record)
            .map(|err| err.to_string())
            .collect::<Vec<_>>();
        return Err(anyhow!(
            "run schema validation failed: {}",
            messages.join("; ")
        ));
    }
    Ok(())
}

/// Write `contents` to a sibling temp file, flush it to disk, then rename it
/// over `path`.
fn write_atomic(path: &Path, contents: &str, fsync: bool) -> anyhow::Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("run path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("json.tmp");
    {
        let mut file = File::create(&tmp_path)
            .with_context(|| format!("create temp run {}", tmp_path.display()))?;
        file.write_all(contents.as_bytes())
            .with_context(|| format!("write temp run {}", tmp_path.display()))?;
        if fsync {
            file.sync_all()
                .with_context(|| format!("sync temp run {}", tmp_path.display()))?;
        }
    }
    fs::rename(&tmp_path, path).with_context(|| format!("replace run {}", path.display()))?;
    if fsync {
        sync_dir(parent);
    }
    Ok(())
}

/// Persist the rename itself. Not every platform can open a directory for
/// syncing, so failures only log.
fn sync_dir(dir: &Path) {
    let result = File::open(dir).and_then(|handle| handle.sync_all());
    if let Err(err) = result {
        debug!(dir = %dir.display(), error = %err, "directory sync unavailable");
    }
}

/// In-memory store; records are cloned in and out.
#[derive(Debug, Default)]
pub struct MemoryStore {
    runs: RwLock<HashMap<String, Run>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RunStore for MemoryStore {
    fn load(&self, run_id: &str) -> Result<Run, StoreError> {
        let runs = self
            .runs
            .read()
            .map_err(|err| StoreError::Backend(anyhow!("memory store poisoned: {err}")))?;
        runs.get(run_id).cloned().ok_or_else(|| StoreError::NotFound {
            run_id: run_id.to_string(),
        })
    }

    fn save(&self, run: &Run) -> Result<(), StoreError> {
        let mut runs = self
            .runs
            .write()
            .map_err(|err| StoreError::Backend(anyhow!("memory store poisoned: {err}")))?;
        runs.insert(run.run_id.clone(), run.clone());
        Ok(())
    }

    fn list_runs(&self) -> Result<Vec<String>, StoreError> {
        let runs = self
            .runs
            .read()
            .map_err(|err| StoreError::Backend(anyhow!("memory store poisoned: {err}")))?;
        let mut ids: Vec<String> = runs.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{active_run, decision};
    use chrono::Utc;
    use serde_json::json;

    /// Verifies write → load preserves every field, including decisions.
    #[test]
    fn file_store_round_trips_run() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = FileStore::new(temp.path());

        let mut run = active_run("run-1");
        run.push_decision(decision(1, "a", true));
        run.push_decision(decision(2, "b", false));
        run.finalize(true, "done".to_string(), json!({"k": 1}), Utc::now());

        store.save(&run).expect("save");
        let loaded = store.load("run-1").expect("load");
        assert_eq!(loaded, run);
        assert!(store.run_path("run-1").is_file());
    }

    #[test]
    fn save_overwrites_and_leaves_no_temp_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = FileStore::new(temp.path());

        let mut run = active_run("run-1");
        store.save(&run).expect("first save");
        run.push_decision(decision(1, "a", true));
        store.save(&run).expect("second save");

        let loaded = store.load("run-1").expect("load");
        assert_eq!(loaded.decisions.len(), 1);
        assert!(!store.runs_dir().join("run-1.json.tmp").exists());
    }

    /// A temp file left by a crash mid-write must not shadow the committed record.
    #[test]
    fn stale_temp_file_is_ignored() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = FileStore::new(temp.path());
        store.save(&active_run("run-1")).expect("save");
        fs::write(store.runs_dir().join("run-1.json.tmp"), "{ torn").expect("write tmp");

        assert_eq!(store.list_runs().expect("list"), vec!["run-1"]);
        assert_eq!(store.load("run-1").expect("load").run_id, "run-1");
    }

    #[test]
    fn load_missing_run_is_not_found() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = FileStore::new(temp.path());

        let err = store.load("run-404").expect_err("missing run");
        assert!(matches!(err, StoreError::NotFound { run_id } if run_id == "run-404"));
        assert!(!store.exists("run-404").expect("exists"));
    }

    #[test]
    fn load_falls_back_to_scanning_renamed_records() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = FileStore::new(temp.path());
        store.save(&active_run("run-1")).expect("save");
        fs::rename(
            store.run_path("run-1"),
            store.runs_dir().join("run-1_backup.json"),
        )
        .expect("rename");
        fs::write(store.runs_dir().join("junk.json"), "not json").expect("write junk");

        let loaded = store.load("run-1").expect("load by scan");
        assert_eq!(loaded.run_id, "run-1");
    }

    #[test]
    fn list_runs_reports_ids_from_record_contents() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = FileStore::new(temp.path());
        store.save(&active_run("run-1")).expect("save 1");
        store.save(&active_run("run-2")).expect("save 2");
        fs::copy(
            store.run_path("run-2"),
            store.runs_dir().join("run-2_copy.json"),
        )
        .expect("copy");
        fs::rename(
            store.run_path("run-1"),
            store.runs_dir().join("run-1_backup.json"),
        )
        .expect("rename");

        assert_eq!(store.list_runs().expect("list"), vec!["run-1", "run-2"]);
    }

    #[test]
    fn non_finite_confidence_reads_back_as_absent() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = FileStore::new(temp.path());
        let mut run = active_run("run-1");
        let mut nan = decision(1, "a", true);
        nan.options[0] = nan.options[0].clone().with_confidence(f64::NAN);
        run.push_decision(nan);
        store.save(&run).expect("save");

        let loaded = store.load("run-1").expect("load");
        assert_eq!(loaded.decisions.len(), 1);
        assert_eq!(loaded.decisions[0].options[0].confidence, None);
    }

    #[test]
    fn schema_validator_is_compiled_once() {
        let first = RUN_RECORD_VALIDATOR.as_ref().expect("schema compiles");
        let second = RUN_RECORD_VALIDATOR.as_ref().expect("schema compiles");
        assert!(std::ptr::eq(first, second));
        assert!(validate_schema(&json!({"run_id": "x"})).is_err());
    }

    #[test]
    fn rejects_path_like_run_ids() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = FileStore::new(temp.path());

        let err = store.load("../etc/passwd").expect_err("invalid id");
        assert!(matches!(err, StoreError::InvalidRunId { .. }));
    }

    #[test]
    fn load_rejects_records_breaking_invariants() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = FileStore::new(temp.path());
        let mut run = active_run("run-1");
        run.push_decision(decision(1, "a", true));
        store.save(&run).expect("save");

        let path = store.run_path("run-1");
        let mut value: Value =
            serde_json::from_str(&fs::read_to_string(&path).expect("read")).expect("parse");
        value["decisions"][0]["decision_id"] = json!(0);
        fs::write(&path, serde_json::to_string(&value).expect("encode")).expect("write");

        let err = store.load("run-1").expect_err("invalid record");
        assert!(format!("{err:#}").contains("run-1"));
    }

    #[test]
    fn list_runs_is_sorted_and_empty_without_dir() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = FileStore::new(temp.path());
        assert!(store.list_runs().expect("list").is_empty());

        store.save(&active_run("run-b")).expect("save b");
        store.save(&active_run("run-a")).expect("save a");
        assert_eq!(store.list_runs().expect("list"), vec!["run-a", "run-b"]);
    }

    #[test]
    fn memory_store_round_trips() {
        let store = MemoryStore::new();
        assert!(!store.exists("run-1").expect("exists"));

        let run = active_run("run-1");
        store.save(&run).expect("save");
        assert_eq!(store.load("run-1").expect("load"), run);
        assert_eq!(store.list_runs().expect("list"), vec!["run-1"]);
    }
}
