//! Drives one applicant session through identify, restore, save, export and wipe.

use crate::config::IntakeConfig;
use crate::engine::{RollupEngine, SessionSummary};
use crate::error::{IntakeError, Result};
use crate::export::build_workbook;
use crate::progress::{merge_into_session, MergeReport, ProgressStore};
use crate::session::{ApplicantId, ApplicantSession};
use chrono::NaiveDate;
use log::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Unidentified,
    /// Id accepted, store not consulted yet.
    Identified,
    /// A stored snapshot is being merged in.
    Restoring,
    Active,
    /// Stored progress removed; the service drops back to `Unidentified`.
    Wiped,
}

#[derive(Debug, Clone)]
pub struct WorkbookDownload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

pub struct IntakeService {
    config: IntakeConfig,
    store: ProgressStore,
    phase: SessionPhase,
    session: Option<ApplicantSession>,
    /// Revision the in-memory session was last loaded from or saved as.
    revision: u64,
}

impl IntakeService {
    pub fn new(config: IntakeConfig) -> Result<Self> {
        config.validate()?;
        let store = ProgressStore::from_config(&config);
        Ok(Self {
            config,
            store,
            phase: SessionPhase::Unidentified,
            session: None,
            revision: 0,
        })
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn store(&self) -> &ProgressStore {
        &self.store
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn session(&self) -> Option<&ApplicantSession> {
        self.session.as_ref()
    }

    fn expect_phase(&self, expected: SessionPhase, action: &str) -> Result<()> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(IntakeError::InvalidTransition(format!(
                "cannot {} while {:?}",
                action, self.phase
            )))
        }
    }

    fn active(&self, action: &str) -> Result<&ApplicantSession> {
        self.expect_phase(SessionPhase::Active, action)?;
        self.session
            .as_ref()
            .ok_or_else(|| IntakeError::InvalidTransition(format!("cannot {} without a session", action)))
    }

    pub fn session_mut(&mut self) -> Result<&mut ApplicantSession> {
        self.expect_phase(SessionPhase::Active, "edit")?;
        self.session
            .as_mut()
            .ok_or_else(|| IntakeError::InvalidTransition("cannot edit without a session".to_string()))
    }

    /// Opens the session for `raw_id`, restoring stored progress if there is any.
    /// Returns the merge report when something was restored.
    pub fn identify(&mut self, raw_id: &str) -> Result<Option<MergeReport>> {
        self.expect_phase(SessionPhase::Unidentified, "identify")?;
        let id = ApplicantId::parse(raw_id)?;

        self.phase = SessionPhase::Identified;
        let mut session = ApplicantSession::new(id);
        let mut report = None;
        self.revision = 0;

        if let Some(stored) = self.store.load_or_fresh(session.id()) {
            self.phase = SessionPhase::Restoring;
            report = Some(merge_into_session(&stored.entries, &mut session));
            self.revision = stored.revision;
        }

        info!("Session for {} is active", session.id());
        self.session = Some(session);
        self.phase = SessionPhase::Active;
        Ok(report)
    }

    /// Writes the whole session; whatever was stored before is replaced.
    pub fn save(&mut self) -> Result<u64> {
        let session = self.active("save")?;
        let revision = self.store.save(session.id(), &session.state)?;
        self.revision = revision;
        Ok(revision)
    }

    /// Like [`IntakeService::save`], but fails with `StaleSnapshot` if another
    /// writer saved since this session was loaded or last saved.
    pub fn save_if_unchanged(&mut self) -> Result<u64> {
        let session = self.active("save")?;
        let revision = self
            .store
            .save_if_unchanged(session.id(), &session.state, self.revision)?;
        self.revision = revision;
        Ok(revision)
    }

    /// Re-runs the restore against the store. Sections already in the session are kept.
    pub fn resume(&mut self) -> Result<MergeReport> {
        self.expect_phase(SessionPhase::Active, "resume")?;
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| IntakeError::InvalidTransition("cannot resume without a session".to_string()))?;

        session.transient.download_confirmed = false;
        match self.store.load_or_fresh(session.id()) {
            Some(stored) => Ok(merge_into_session(&stored.entries, session)),
            None => Ok(MergeReport::default()),
        }
    }

    /// Deletes stored progress and forgets the session.
    pub fn wipe(&mut self) -> Result<()> {
        let session = self.active("wipe")?;
        self.store.delete(session.id())?;
        info!("Wiped progress for {}", session.id());

        self.phase = SessionPhase::Wiped;
        self.session = None;
        self.revision = 0;
        self.phase = SessionPhase::Unidentified;
        Ok(())
    }

    pub fn summary(&self, today: NaiveDate) -> Result<SessionSummary> {
        let session = self.active("summarize")?;
        Ok(RollupEngine::new(today).summarize(&session.state))
    }

    /// Builds the workbook and marks the download as confirmed.
    pub fn export(&mut self, today: NaiveDate) -> Result<WorkbookDownload> {
        let session = self.active("export")?;
        let bytes = build_workbook(session, today)?;
        let file_name = self.config.export_file_name(session.id().as_str());

        match self.session.as_mut() {
            Some(session) => session.transient.download_confirmed = true,
            None => warn!("Session closed while exporting {}", file_name),
        }
        Ok(WorkbookDownload { file_name, bytes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Shareholder;
    use tempfile::TempDir;

    fn service(dir: &TempDir) -> IntakeService {
        let config = IntakeConfig {
            store_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        IntakeService::new(config).unwrap()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 4, 18).unwrap()
    }

    #[test]
    fn test_phase_transitions() {
        let dir = TempDir::new().unwrap();
        let mut service = service(&dir);
        assert_eq!(service.phase(), SessionPhase::Unidentified);
        assert!(matches!(service.save(), Err(IntakeError::InvalidTransition(_))));
        assert!(matches!(
            service.identify("123"),
            Err(IntakeError::InvalidApplicantId(_))
        ));
        assert_eq!(service.phase(), SessionPhase::Unidentified);

        assert!(service.identify("30888888885").unwrap().is_none());
        assert_eq!(service.phase(), SessionPhase::Active);
        assert!(matches!(
            service.identify("30888888885"),
            Err(IntakeError::InvalidTransition(_))
        ));

        assert_eq!(service.save().unwrap(), 1);
        assert!(service.store().exists(service.session().unwrap().id()));

        service.wipe().unwrap();
        assert_eq!(service.phase(), SessionPhase::Unidentified);
        assert!(service.session().is_none());
        assert!(!dir.path().join("progreso_30888888885.json").exists());
    }

    #[test]
    fn test_identify_restores_saved_progress() {
        let dir = TempDir::new().unwrap();
        let mut first = service(&dir);
        first.identify("30888888885").unwrap();
        first
            .session_mut()
            .unwrap()
            .state
            .filiatorios
            .get_or_init()
            .append(Shareholder::new("Ana", "20111111112", 100.0))
            .unwrap();
        first.save().unwrap();

        let mut second = service(&dir);
        let report = second.identify("30888888885").unwrap().unwrap();
        assert_eq!(report.restored, vec!["filiatorios".to_string()]);
        assert_eq!(second.revision(), 1);

        let again = second.resume().unwrap();
        assert!(again.restored.is_empty());
        assert_eq!(again.kept_current, vec!["filiatorios".to_string()]);
    }

    #[test]
    fn test_conditional_save_detects_other_writer() {
        let dir = TempDir::new().unwrap();
        let mut tab_a = service(&dir);
        let mut tab_b = service(&dir);
        tab_a.identify("30888888885").unwrap();
        tab_b.identify("30888888885").unwrap();

        assert_eq!(tab_a.save_if_unchanged().unwrap(), 1);
        assert!(matches!(
            tab_b.save_if_unchanged(),
            Err(IntakeError::StaleSnapshot { expected: 0, found: 1, .. })
        ));
        assert_eq!(tab_b.save().unwrap(), 2);
    }

    #[test]
    fn test_export_names_file_and_confirms_download() {
        let dir = TempDir::new().unwrap();
        let mut service = service(&dir);
        service.identify("30888888885").unwrap();

        let download = service.export(today()).unwrap();
        assert_eq!(download.file_name, "formulario_30888888885.xlsx");
        assert!(!download.bytes.is_empty());
        assert!(service.session().unwrap().transient.download_confirmed);

        service.resume().unwrap();
        assert!(!service.session().unwrap().transient.download_confirmed);
    }
}
