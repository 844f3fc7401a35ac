use std::path::{Path, PathBuf};

use chrono::Utc;
use overlaykit_core::{ArtifactKind, InstalledVersionRecord, VersionDescriptor};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::artifact::{install_artifacts, ExtractedArtifacts};
use crate::backup::{new_attempt_id, BackupManager, BackupSnapshot};
use crate::cache::{extraction_dir, ArtifactCache};
use crate::extract::extract_zip;
use crate::fs_utils::remove_dir_if_exists;
use crate::progress::{run_in_background, ProgressSink};
use crate::transactions::{
    claim_active_install, clear_active_install, discard_staging, write_active_install,
    ActiveInstall, AttemptStatus, SnapshotRecord,
};
use crate::version_store::{record_for_install, VersionStore};
use crate::{InstallError, InstallLayout};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Idle,
    BackingUp,
    Extracting,
    Installing,
    Persisting,
    CleaningUp,
    Failed,
    RollingBack,
    Done,
}

impl PipelineStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::BackingUp => "backing_up",
            Self::Extracting => "extracting",
            Self::Installing => "installing",
            Self::Persisting => "persisting",
            Self::CleaningUp => "cleaning_up",
            Self::Failed => "failed",
            Self::RollingBack => "rolling_back",
            Self::Done => "done",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotResolution {
    Committed,
    /// At least one pre-existing directory was put back.
    RolledBack,
    /// Every snapshotted directory was absent beforehand; the attempt's
    /// output was deleted and nothing needed restoring.
    NothingToRestore,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub attempt_id: String,
    pub record: InstalledVersionRecord,
    pub installed_dir: PathBuf,
    pub stages: Vec<PipelineStage>,
    pub resolution: SnapshotResolution,
}

#[derive(Debug, Error)]
#[error("install failed at stage '{}'", .stage.as_str())]
pub struct InstallFailure {
    pub stage: PipelineStage,
    #[source]
    pub error: InstallError,
    pub stages: Vec<PipelineStage>,
    /// `None` when the attempt failed before any snapshot existed.
    pub resolution: Option<SnapshotResolution>,
    pub rollback_error: Option<InstallError>,
}

/// Installer state for one target project, passed explicitly to every
/// operation.
#[derive(Debug, Clone)]
pub struct InstallSession {
    pub(crate) layout: InstallLayout,
    pub(crate) store: VersionStore,
    pub(crate) record: InstalledVersionRecord,
}

type StageResult<T> = Result<T, (PipelineStage, InstallError)>;

fn at(stage: PipelineStage) -> impl FnOnce(InstallError) -> (PipelineStage, InstallError) {
    move |err| (stage, err)
}

struct StageTrace<'a> {
    stages: Vec<PipelineStage>,
    sink: &'a mut dyn ProgressSink,
}

impl StageTrace<'_> {
    fn enter(&mut self, stage: PipelineStage) {
        debug!(stage = stage.as_str(), "pipeline stage");
        self.stages.push(stage);
        self.sink.stage(stage);
    }
}

impl InstallSession {
    /// Loads the persisted record; a missing file means nothing installed.
    pub fn open(layout: InstallLayout) -> Result<Self, InstallError> {
        let store = VersionStore::new(layout.version_file());
        let record = store.load()?;
        Ok(Self {
            layout,
            store,
            record,
        })
    }

    pub fn layout(&self) -> &InstallLayout {
        &self.layout
    }

    pub fn store(&self) -> &VersionStore {
        &self.store
    }

    pub fn record(&self) -> &InstalledVersionRecord {
        &self.record
    }

    /// Cache location remembered from an earlier run, if any.
    pub fn recorded_cache_dir(&self) -> Option<PathBuf> {
        if self.record.cache_dir.is_empty() {
            return None;
        }
        Some(PathBuf::from(&self.record.cache_dir))
    }

    pub fn update_cache_dir(&mut self, cache_dir: &Path) -> Result<(), InstallError> {
        self.record = self.store.update_cache_dir(cache_dir)?;
        Ok(())
    }

    pub fn install(
        &mut self,
        descriptor: &VersionDescriptor,
        cache: &dyn ArtifactCache,
        progress: &mut dyn ProgressSink,
    ) -> Result<InstallReport, InstallFailure> {
        let mut trace = StageTrace {
            stages: Vec::new(),
            sink: progress,
        };
        trace.enter(PipelineStage::Idle);

        if let Err(err) = descriptor.validate() {
            return Err(fail_before_snapshot(
                trace,
                InstallError::InvalidRequest(format!("{err:#}")),
            ));
        }

        let attempt_id = new_attempt_id();
        let target = BackupManager::for_target(&self.layout);
        let overlay = BackupManager::for_overlay(&self.layout);
        let original = self.layout.original_backup_dir();
        let target_existed = target.dir().exists();
        let mut attempt = ActiveInstall {
            attempt_id: attempt_id.clone(),
            status: AttemptStatus::Applying,
            base_tag: descriptor.base.tag.clone(),
            overlay_tag: descriptor.overlay.tag.clone(),
            started_at_millis: Utc::now().timestamp_millis(),
            staging_dir: self.layout.staging_dir(&attempt_id),
            snapshots: vec![
                SnapshotRecord {
                    dir: target.dir().to_path_buf(),
                    backup_dir: target.plan(&self.layout, &attempt_id),
                    dir_existed: target_existed,
                    created_original: (target_existed && !original.exists())
                        .then_some(original),
                },
                SnapshotRecord {
                    dir: overlay.dir().to_path_buf(),
                    backup_dir: overlay.plan(&self.layout, &attempt_id),
                    dir_existed: overlay.dir().exists(),
                    created_original: None,
                },
            ],
            previous_record: Some(self.record.clone()),
        };
        if let Err(err) = claim_active_install(&self.layout, &attempt) {
            return Err(fail_before_snapshot(trace, err));
        }
        info!(
            attempt = %attempt_id,
            base = %descriptor.base.tag,
            overlay = %descriptor.overlay.tag,
            "install started"
        );

        let previous = self.record.clone();
        let mut snapshots = Vec::new();
        let applied = self.apply(
            &mut trace,
            descriptor,
            cache,
            &mut attempt,
            [&target, &overlay],
            &mut snapshots,
        );

        match applied {
            Ok((record, installed_dir)) => {
                trace.enter(PipelineStage::CleaningUp);
                let layout = &self.layout;
                let staging_dir = &attempt.staging_dir;
                run_in_background("cleanup", &mut *trace.sink, move || {
                    for snapshot in snapshots {
                        snapshot.commit();
                    }
                    let stale = layout.overlay_disabled_dir();
                    if let Err(err) = remove_dir_if_exists(&stale) {
                        warn!(
                            path = %stale.display(),
                            error = %err,
                            "failed to remove stale disabled overlay"
                        );
                    }
                    discard_staging(staging_dir);
                });
                if let Err(err) = clear_active_install(&self.layout) {
                    warn!(error = %err, "failed to clear install marker");
                }

                self.record = record.clone();
                trace.enter(PipelineStage::Done);
                info!(attempt = %attempt_id, "install committed");
                Ok(InstallReport {
                    attempt_id,
                    record,
                    installed_dir,
                    stages: trace.stages,
                    resolution: SnapshotResolution::Committed,
                })
            }
            Err((stage, err)) => {
                warn!(stage = stage.as_str(), error = %err, "install failed; rolling back");
                trace.enter(PipelineStage::Failed);
                trace.enter(PipelineStage::RollingBack);
                let resolution = if snapshots.iter().any(BackupSnapshot::is_taken) {
                    SnapshotResolution::RolledBack
                } else {
                    SnapshotResolution::NothingToRestore
                };
                let rollback_error =
                    run_in_background("rollback", &mut *trace.sink, move || {
                        rollback_all(snapshots)
                    });
                discard_staging(&attempt.staging_dir);
                match &rollback_error {
                    None => {
                        if let Err(err) = clear_active_install(&self.layout) {
                            warn!(error = %err, "failed to clear install marker");
                        }
                    }
                    Some(rollback_err) => error!(
                        attempt = %attempt_id,
                        error = %rollback_err,
                        "rollback incomplete; install marker kept for recovery"
                    ),
                }

                self.record = previous;
                trace.enter(PipelineStage::Done);
                Err(InstallFailure {
                    stage,
                    error: err,
                    stages: trace.stages,
                    resolution: Some(resolution),
                    rollback_error,
                })
            }
        }
    }

    fn apply(
        &self,
        trace: &mut StageTrace<'_>,
        descriptor: &VersionDescriptor,
        cache: &dyn ArtifactCache,
        attempt: &mut ActiveInstall,
        managers: [&BackupManager; 2],
        snapshots: &mut Vec<BackupSnapshot>,
    ) -> StageResult<(InstalledVersionRecord, PathBuf)> {
        trace.enter(PipelineStage::BackingUp);
        let planned = &attempt.snapshots;
        run_in_background("backup", &mut *trace.sink, || -> Result<(), InstallError> {
            for (manager, record) in managers.iter().zip(planned) {
                snapshots.push(manager.backup(&record.backup_dir)?);
            }
            Ok(())
        })
        .map_err(at(PipelineStage::BackingUp))?;

        trace.enter(PipelineStage::Extracting);
        let extracted = extract_artifacts(trace, descriptor, cache)
            .map_err(at(PipelineStage::Extracting))?;

        trace.enter(PipelineStage::Installing);
        let layout = &self.layout;
        let staging_dir = &attempt.staging_dir;
        let installed_dir = run_in_background("install", &mut *trace.sink, || {
            install_artifacts(layout, &extracted, staging_dir)
        })
        .map_err(at(PipelineStage::Installing))?;

        trace.enter(PipelineStage::Persisting);
        let record = record_for_install(descriptor, cache.cache_dir());
        let store = &self.store;
        run_in_background("persist", &mut *trace.sink, || store.save(&record))
            .map_err(at(PipelineStage::Persisting))?;

        attempt.status = AttemptStatus::Committing;
        if let Err(err) = write_active_install(&self.layout, attempt) {
            warn!(error = %err, "failed to mark install as committing");
        }

        Ok((record, installed_dir))
    }
}

fn extract_artifacts(
    trace: &mut StageTrace<'_>,
    descriptor: &VersionDescriptor,
    cache: &dyn ArtifactCache,
) -> Result<ExtractedArtifacts, InstallError> {
    let mut content_dirs = Vec::with_capacity(ArtifactKind::ALL.len());
    for kind in ArtifactKind::ALL {
        let archive = cache.archive_path(kind, descriptor)?;
        let dest = extraction_dir(&archive);
        remove_dir_if_exists(&dest)?;

        for tick in extract_zip(&archive, &dest) {
            let tick = tick?;
            trace.sink.tick(tick.completed, tick.total, kind.as_str());
        }
        debug!(kind = kind.as_str(), dest = %dest.display(), "archive extracted");

        content_dirs.push(dest.join(cache.inner_folder(kind, descriptor)?));
    }

    let overlay_dir = content_dirs.pop().unwrap_or_default();
    let base_dir = content_dirs.pop().unwrap_or_default();
    Ok(ExtractedArtifacts {
        base_dir,
        overlay_dir,
    })
}

/// Restores in reverse order of capture; returns the first failure.
fn rollback_all(snapshots: Vec<BackupSnapshot>) -> Option<InstallError> {
    let mut first_error = None;
    for snapshot in snapshots.into_iter().rev() {
        if let Err(err) = snapshot.rollback() {
            error!(error = %err, "failed to restore snapshot");
            first_error.get_or_insert(err);
        }
    }
    first_error
}

fn fail_before_snapshot(mut trace: StageTrace<'_>, error: InstallError) -> InstallFailure {
    warn!(error = %error, "install refused");
    trace.enter(PipelineStage::Failed);
    trace.enter(PipelineStage::Done);
    InstallFailure {
        stage: PipelineStage::Idle,
        error,
        stages: trace.stages,
        resolution: None,
        rollback_error: None,
    }
}
