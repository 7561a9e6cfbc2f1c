//! Per-applicant progress snapshots.
//!
//! A snapshot is a flat map from section key to JSON value, wrapped in an
//! envelope carrying a revision counter. Files are replaced atomically, and
//! decoding is lenient per key so that one damaged or renamed section never
//! costs the applicant the rest of their progress.

use crate::config::IntakeConfig;
use crate::error::{IntakeError, Result};
use crate::session::{ApplicantId, ApplicantSession, PersistableState};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub const FORMAT_VERSION: u32 = 1;

pub type Snapshot = BTreeMap<String, Value>;

const TRANSIENT_PREFIXES: [&str; 6] = [
    "editor_",
    "FormSubmitter:",
    "delete_",
    "guardar_",
    "eliminar_cultivo_",
    "_",
];
const TRANSIENT_SUBSTRINGS: [&str; 1] = ["Agregar"];

/// Keys naming widget identity rather than business data.
pub fn is_transient_key(key: &str) -> bool {
    TRANSIENT_PREFIXES.iter().any(|p| key.starts_with(p))
        || TRANSIENT_SUBSTRINGS.iter().any(|s| key.contains(s))
}

/// Drops transient keys, returning the kept snapshot and the dropped key names.
pub fn filter_snapshot(snapshot: Snapshot) -> (Snapshot, Vec<String>) {
    let mut dropped = Vec::new();
    let kept = snapshot
        .into_iter()
        .filter(|(key, _)| {
            if is_transient_key(key) {
                dropped.push(key.clone());
                false
            } else {
                true
            }
        })
        .collect();
    (kept, dropped)
}

/// Serializes the present sections of `state` into a filtered snapshot.
pub fn snapshot_of(state: &PersistableState) -> Result<Snapshot> {
    let value = serde_json::to_value(state)?;
    let snapshot: Snapshot = match value {
        Value::Object(map) => map.into_iter().collect(),
        other => {
            return Err(IntakeError::Export(format!(
                "state serialized to a non-object: {}",
                other
            )))
        }
    };
    let (kept, dropped) = filter_snapshot(snapshot);
    if !dropped.is_empty() {
        warn!("Refusing to persist transient key(s) {:?}", dropped);
    }
    Ok(kept)
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotEnvelope {
    format_version: u32,
    applicant_id: String,
    revision: u64,
    saved_at: DateTime<Utc>,
    state: Snapshot,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoredFormat {
    Envelope(SnapshotEnvelope),
    /// A bare key/value map, as written by older producers.
    Bare(Snapshot),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredSnapshot {
    pub revision: u64,
    pub saved_at: Option<DateTime<Utc>>,
    pub entries: Snapshot,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeReport {
    /// Sections copied in because the session did not have them.
    pub restored: Vec<String>,
    /// Sections present in both; the session's value was kept.
    pub kept_current: Vec<String>,
    pub skipped_transient: Vec<String>,
    pub ignored_unknown: Vec<String>,
    /// Sections whose stored value no longer decodes.
    pub undecodable: Vec<String>,
}

/// Decodes each key on its own; unknown and undecodable keys are reported, never fatal.
pub fn decode_snapshot(snapshot: &Snapshot, report: &mut MergeReport) -> PersistableState {
    let mut decoded = PersistableState::default();

    for (key, value) in snapshot {
        if is_transient_key(key) {
            report.skipped_transient.push(key.clone());
            continue;
        }

        let mut single = Map::new();
        single.insert(key.clone(), value.clone());

        match serde_json::from_value::<PersistableState>(Value::Object(single)) {
            Ok(section) => {
                if section.present_keys().is_empty() {
                    debug!("Ignoring snapshot key '{}'", key);
                    report.ignored_unknown.push(key.clone());
                } else {
                    decoded.fill_absent_from(section);
                }
            }
            Err(e) => {
                warn!("Skipping undecodable snapshot key '{}': {}", key, e);
                report.undecodable.push(key.clone());
            }
        }
    }

    decoded
}

/// Copies every stored section the session does not already have.
/// Running it again with the same snapshot changes nothing.
pub fn merge_into_session(loaded: &Snapshot, session: &mut ApplicantSession) -> MergeReport {
    let mut report = MergeReport::default();
    let decoded = decode_snapshot(loaded, &mut report);
    let candidates = decoded.present_keys();

    let restored: Vec<String> = session
        .state
        .fill_absent_from(decoded)
        .into_iter()
        .map(str::to_string)
        .collect();

    report.kept_current = candidates
        .into_iter()
        .filter(|key| !restored.contains(key))
        .collect();
    report.restored = restored;

    debug!(
        "Merged snapshot into {}: {} restored, {} kept",
        session.id(),
        report.restored.len(),
        report.kept_current.len()
    );
    report
}

#[derive(Debug, Clone)]
pub struct ProgressStore {
    dir: PathBuf,
    prefix: String,
}

impl ProgressStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            prefix: "progreso_".to_string(),
        }
    }

    pub fn from_config(config: &IntakeConfig) -> Self {
        Self {
            dir: config.store_dir.clone(),
            prefix: config.snapshot_prefix.clone(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, id: &ApplicantId) -> PathBuf {
        self.dir.join(format!("{}{}.json", self.prefix, id))
    }

    pub fn exists(&self, id: &ApplicantId) -> bool {
        self.path_for(id).is_file()
    }

    /// Returns `Ok(None)` if nothing was saved for `id` yet.
    pub fn load(&self, id: &ApplicantId) -> Result<Option<StoredSnapshot>> {
        let path = self.path_for(id);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let corrupt = |details: String| IntakeError::CorruptSnapshot {
            applicant_id: id.to_string(),
            details,
        };

        let stored = match serde_json::from_slice::<StoredFormat>(&bytes) {
            Ok(StoredFormat::Envelope(envelope)) => {
                if envelope.applicant_id != id.as_str() {
                    return Err(corrupt(format!(
                        "file belongs to applicant {}",
                        envelope.applicant_id
                    )));
                }
                if envelope.format_version > FORMAT_VERSION {
                    warn!(
                        "Snapshot for {} has newer format {}; reading what is understood",
                        id, envelope.format_version
                    );
                }
                StoredSnapshot {
                    revision: envelope.revision,
                    saved_at: Some(envelope.saved_at),
                    entries: envelope.state,
                }
            }
            Ok(StoredFormat::Bare(entries)) => StoredSnapshot {
                revision: 0,
                saved_at: None,
                entries,
            },
            Err(e) => return Err(corrupt(e.to_string())),
        };

        info!(
            "Loaded progress for {} (revision {}, {} key(s))",
            id,
            stored.revision,
            stored.entries.len()
        );
        Ok(Some(stored))
    }

    /// Like [`ProgressStore::load`], but any failure degrades to "no prior progress".
    pub fn load_or_fresh(&self, id: &ApplicantId) -> Option<StoredSnapshot> {
        match self.load(id) {
            Ok(stored) => stored,
            Err(e) => {
                warn!("Could not load progress, starting fresh: {}", e);
                None
            }
        }
    }

    /// Revision currently on disk; 0 when nothing is stored.
    pub fn revision(&self, id: &ApplicantId) -> Result<u64> {
        Ok(self.load(id)?.map(|s| s.revision).unwrap_or(0))
    }

    /// Replaces the stored snapshot. The last writer wins.
    pub fn save(&self, id: &ApplicantId, state: &PersistableState) -> Result<u64> {
        let current = match self.revision(id) {
            Ok(revision) => revision,
            Err(e) => {
                warn!("Overwriting unreadable snapshot for {}: {}", id, e);
                0
            }
        };
        self.write(id, state, current + 1)
    }

    /// Saves only if the stored revision is still `expected_revision`.
    pub fn save_if_unchanged(
        &self,
        id: &ApplicantId,
        state: &PersistableState,
        expected_revision: u64,
    ) -> Result<u64> {
        let found = self.revision(id)?;
        if found != expected_revision {
            return Err(IntakeError::StaleSnapshot {
                applicant_id: id.to_string(),
                expected: expected_revision,
                found,
            });
        }
        self.write(id, state, found + 1)
    }

    fn write(&self, id: &ApplicantId, state: &PersistableState, revision: u64) -> Result<u64> {
        let envelope = SnapshotEnvelope {
            format_version: FORMAT_VERSION,
            applicant_id: id.to_string(),
            revision,
            saved_at: Utc::now(),
            state: snapshot_of(state)?,
        };
        let bytes = serde_json::to_vec_pretty(&envelope)?;

        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(id);
        let tmp_path = path.with_extension("json.tmp");
        // Write to a sibling first so a failed write never truncates the real file.
        fs::write(&tmp_path, bytes)?;
        fs::rename(&tmp_path, &path)?;

        info!(
            "Saved progress for {} (revision {}, {} key(s))",
            id,
            revision,
            envelope.state.len()
        );
        Ok(revision)
    }

    /// Removes the snapshot. Deleting a missing snapshot is not an error.
    pub fn delete(&self, id: &ApplicantId) -> Result<()> {
        match fs::remove_file(self.path_for(id)) {
            Ok(()) => {
                info!("Deleted progress for {}", id);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Shareholder;
    use serde_json::json;
    use tempfile::TempDir;

    fn id() -> ApplicantId {
        ApplicantId::parse("30888888885").unwrap()
    }

    fn session_with_answer(key: &str, value: &str) -> ApplicantSession {
        let mut session = ApplicantSession::new(id());
        session.set_answer(key, value);
        session
    }

    #[test]
    fn test_transient_keys() {
        assert!(is_transient_key("delete_aval_0"));
        assert!(is_transient_key("FormSubmitter:form_avales-Agregar"));
        assert!(is_transient_key("editor_bancos"));
        assert!(is_transient_key("guardar_bancos_btn"));
        assert!(is_transient_key("eliminar_cultivo_Soja"));
        assert!(is_transient_key("_internal"));
        assert!(is_transient_key("Agregar Cultivo actual"));
        assert!(!is_transient_key("filiatorios"));
        assert!(!is_transient_key("df_campos"));
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = ProgressStore::new(dir.path());

        let mut session = session_with_answer("Razón Social", "Agro SA");
        session
            .state
            .filiatorios
            .get_or_init()
            .append(Shareholder::new("Ana", "20123456789", 60.0))
            .unwrap();

        assert_eq!(store.save(&id(), &session.state).unwrap(), 1);
        let stored = store.load(&id()).unwrap().unwrap();
        assert_eq!(stored.revision, 1);

        let mut report = MergeReport::default();
        let decoded = decode_snapshot(&stored.entries, &mut report);
        assert_eq!(decoded, session.state);
        assert!(report.undecodable.is_empty());
    }

    #[test]
    fn test_load_missing_is_none_and_delete_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = ProgressStore::new(dir.path().join("nested"));

        assert!(store.load(&id()).unwrap().is_none());
        assert_eq!(store.revision(&id()).unwrap(), 0);
        store.delete(&id()).unwrap();

        store.save(&id(), &PersistableState::default()).unwrap();
        assert!(store.exists(&id()));
        store.delete(&id()).unwrap();
        store.delete(&id()).unwrap();
        assert!(!store.exists(&id()));
    }

    #[test]
    fn test_corrupt_file_degrades_to_fresh() {
        let dir = TempDir::new().unwrap();
        let store = ProgressStore::new(dir.path());
        fs::write(store.path_for(&id()), b"{ not json").unwrap();

        assert!(matches!(
            store.load(&id()),
            Err(IntakeError::CorruptSnapshot { .. })
        ));
        assert!(store.load_or_fresh(&id()).is_none());

        // A save over a corrupt file still succeeds.
        assert_eq!(store.save(&id(), &PersistableState::default()).unwrap(), 1);
    }

    #[test]
    fn test_optimistic_save() {
        let dir = TempDir::new().unwrap();
        let store = ProgressStore::new(dir.path());
        let state = PersistableState::default();

        let first = store.save_if_unchanged(&id(), &state, 0).unwrap();
        assert_eq!(first, 1);
        store.save(&id(), &state).unwrap();

        let err = store.save_if_unchanged(&id(), &state, first).unwrap_err();
        assert!(matches!(
            err,
            IntakeError::StaleSnapshot {
                expected: 1,
                found: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_lenient_decoding() {
        let mut snapshot = Snapshot::new();
        snapshot.insert("respuestas".to_string(), json!({ "Razón Social": "Agro SA" }));
        snapshot.insert("filiatorios".to_string(), json!("not a list"));
        snapshot.insert("nombres_visibles_campanias".to_string(), json!({}));
        snapshot.insert("delete_filiatorio_0".to_string(), json!(true));

        let mut session = ApplicantSession::new(id());
        let report = merge_into_session(&snapshot, &mut session);

        assert_eq!(report.restored, vec!["respuestas".to_string()]);
        assert_eq!(report.undecodable, vec!["filiatorios".to_string()]);
        assert_eq!(
            report.ignored_unknown,
            vec!["nombres_visibles_campanias".to_string()]
        );
        assert_eq!(report.skipped_transient, vec!["delete_filiatorio_0".to_string()]);
        assert!(session.state.filiatorios.is_absent());
    }

    #[test]
    fn test_merge_is_idempotent_and_current_wins() {
        let stored = session_with_answer("Razón Social", "Vieja SA");
        let snapshot = snapshot_of(&stored.state).unwrap();

        let mut session = session_with_answer("Razón Social", "Nueva SA");
        merge_into_session(&snapshot, &mut session);
        let once = session.state.clone();
        let report = merge_into_session(&snapshot, &mut session);

        assert_eq!(session.state, once);
        assert!(report.restored.is_empty());
        assert_eq!(report.kept_current, vec!["respuestas".to_string()]);
        assert_eq!(
            session.answer("Razón Social").map(|a| a.to_string()),
            Some("Nueva SA".to_string())
        );
    }

    #[test]
    fn test_bare_legacy_map_loads() {
        let dir = TempDir::new().unwrap();
        let store = ProgressStore::new(dir.path());
        fs::write(
            store.path_for(&id()),
            serde_json::to_vec(&json!({ "respuestas": { "CUIT": "30888888885" } })).unwrap(),
        )
        .unwrap();

        let stored = store.load(&id()).unwrap().unwrap();
        assert_eq!(stored.revision, 0);
        assert!(stored.entries.contains_key("respuestas"));
    }
}
