mod artifact;
mod backup;
mod cache;
mod error;
mod extract;
mod fs_utils;
mod layout;
mod pipeline;
mod prepare;
mod progress;
mod toggle;
mod transactions;
mod uninstall;
mod version_store;

pub use artifact::{install_artifacts, ExtractedArtifacts};
pub use backup::{new_attempt_id, BackupManager, BackupSnapshot};
pub use cache::{extraction_dir, ArtifactCache, LocalArtifactCache};
pub use error::InstallError;
pub use extract::{extract_zip, ExtractProgress, ZipExtraction};
pub use fs_utils::remove_file_if_exists;
pub use layout::InstallLayout;
pub use pipeline::{
    InstallFailure, InstallReport, InstallSession, PipelineStage, SnapshotResolution,
};
pub use prepare::{check_installation, prepare_helper_root};
pub use progress::{NoProgress, ProgressSink};
pub use toggle::{disable, enable, overlay_state, rename_dir, OverlayState, RenameOutcome};
pub use transactions::{
    claim_active_install, clear_active_install, read_active_install,
    recover_interrupted_install, write_active_install, ActiveInstall, AttemptStatus,
    RecoveryOutcome, SnapshotRecord,
};
pub use uninstall::UninstallStatus;
pub use version_store::{record_for_install, VersionStore};
