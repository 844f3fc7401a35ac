use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use overlaykit_core::{ArtifactKind, OverlayConfig, VersionDescriptor, DEFAULT_CONFIG_FILE_NAME};
use overlaykit_installer::{
    check_installation, disable, enable, overlay_state, prepare_helper_root,
    read_active_install, recover_interrupted_install, InstallLayout, InstallSession,
    LocalArtifactCache, RecoveryOutcome, UninstallStatus,
};
use tracing::debug;

use crate::completion::write_completions_script;
use crate::render::{
    format_install_failure_lines, format_install_summary, format_status_lines, InstallProgress,
    TerminalRenderer,
};
use crate::{Cli, Commands};

pub(crate) fn run_cli(cli: Cli) -> Result<()> {
    let config_path = resolve_config_path(cli.config.as_deref());
    let renderer = TerminalRenderer::current();

    match cli.command {
        Commands::Prepare => {
            let (_, layout) = load_layout(&config_path)?;
            let seeded = prepare_helper_root(&layout).with_context(|| {
                format!(
                    "failed to prepare helper root: {}",
                    layout.helper_root().display()
                )
            })?;
            for path in &seeded {
                renderer.print_status("ok", &format!("seeded {}", path.display()));
            }
            renderer.print_status(
                "ok",
                &format!("helper root ready: {}", layout.helper_root().display()),
            );
        }
        Commands::Install {
            base,
            overlay,
            base_source,
            overlay_source,
        } => {
            let (config, layout) = load_layout(&config_path)?;
            let descriptor = VersionDescriptor::with_sources(
                base_source.unwrap_or_else(|| config.source_for(ArtifactKind::Base).to_string()),
                base,
                overlay_source
                    .unwrap_or_else(|| config.source_for(ArtifactKind::Overlay).to_string()),
                overlay,
            );
            let mut session = open_session(&layout)?;
            let cache = session_cache(&config, &session);

            let mut progress = InstallProgress::new(renderer);
            match session.install(&descriptor, &cache, &mut progress) {
                Ok(report) => {
                    drop(progress);
                    renderer.print_status("ok", &format_install_summary(&report));
                }
                Err(failure) => {
                    progress.abandon();
                    for (status, line) in format_install_failure_lines(&failure) {
                        renderer.print_status(status, &line);
                    }
                    return Err::<(), _>(anyhow::Error::new(failure)).with_context(|| {
                        format!(
                            "failed to install base={} overlay={}",
                            descriptor.base.tag, descriptor.overlay.tag
                        )
                    });
                }
            }
        }
        Commands::Status => {
            let (_, layout) = load_layout(&config_path)?;
            let session = open_session(&layout)?;
            let pending = read_active_install(&layout)?;
            renderer.print_section("overlaykit status");
            renderer.print_lines(&format_status_lines(
                session.record(),
                overlay_state(&layout, session.record()),
                pending.as_ref(),
            ));
        }
        Commands::Check => {
            let (_, layout) = load_layout(&config_path)?;
            check_installation(&layout).with_context(|| "installation check failed")?;
            renderer.print_status(
                "ok",
                &format!(
                    "overlay installed at {}",
                    layout.overlay_install_dir().display()
                ),
            );
        }
        Commands::Enable => {
            let (_, layout) = load_layout(&config_path)?;
            require_installed(&open_session(&layout)?)?;
            enable(&layout).with_context(|| "failed to enable overlay")?;
            renderer.print_status("ok", "overlay enabled");
        }
        Commands::Disable => {
            let (_, layout) = load_layout(&config_path)?;
            require_installed(&open_session(&layout)?)?;
            disable(&layout).with_context(|| "failed to disable overlay")?;
            renderer.print_status("ok", "overlay disabled");
        }
        Commands::Uninstall => {
            let (_, layout) = load_layout(&config_path)?;
            let mut session = open_session(&layout)?;
            match session
                .uninstall()
                .with_context(|| "failed to uninstall overlay")?
            {
                UninstallStatus::NotInstalled => {
                    renderer.print_status("warn", "overlay is not installed")
                }
                UninstallStatus::Uninstalled => renderer.print_status("ok", "overlay uninstalled"),
            }
        }
        Commands::RestoreOriginal => {
            let (_, layout) = load_layout(&config_path)?;
            let mut session = open_session(&layout)?;
            session
                .restore_original()
                .with_context(|| "failed to restore original target directory")?;
            renderer.print_status(
                "ok",
                &format!("restored {}", layout.target_dir().display()),
            );
        }
        Commands::Recover => {
            let (_, layout) = load_layout(&config_path)?;
            match recover_interrupted_install(&layout)? {
                RecoveryOutcome::Clean => renderer.print_status("ok", "no interrupted install"),
                RecoveryOutcome::RolledBack(attempt) => renderer.print_status(
                    "ok",
                    &format!("rolled back interrupted install {}", attempt.attempt_id),
                ),
                RecoveryOutcome::Completed(attempt) => renderer.print_status(
                    "ok",
                    &format!("completed interrupted install {}", attempt.attempt_id),
                ),
            }
        }
        Commands::SetCacheDir { path } => {
            let (_, layout) = load_layout(&config_path)?;
            let mut session = open_session(&layout)?;
            session.update_cache_dir(&path).with_context(|| {
                format!("failed to record cache dir: {}", path.display())
            })?;
            renderer.print_status("ok", &format!("cache dir set to {}", path.display()));
        }
        Commands::Completions { shell } => {
            let mut stdout = std::io::stdout();
            write_completions_script(shell, &mut stdout)?;
        }
    }

    Ok(())
}

pub(crate) fn resolve_config_path(requested: Option<&Path>) -> PathBuf {
    requested
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE_NAME))
}

fn load_layout(config_path: &Path) -> Result<(OverlayConfig, InstallLayout)> {
    let config = OverlayConfig::load(config_path)?;
    debug!(config = %config_path.display(), "config loaded");
    let layout = InstallLayout::from_config(&config);
    Ok((config, layout))
}

fn open_session(layout: &InstallLayout) -> Result<InstallSession> {
    InstallSession::open(layout.clone()).with_context(|| {
        format!(
            "failed to load version record: {}",
            layout.version_file().display()
        )
    })
}

/// Toggling only moves trees an install left behind; seeded helper content
/// must stay put.
pub(crate) fn require_installed(session: &InstallSession) -> Result<()> {
    if !session.record().is_installed() {
        bail!(
            "overlay is not installed (no tags in {})",
            session.store().path().display()
        );
    }
    Ok(())
}

/// Local cache rooted at the recorded location when one was saved, else at
/// the configured one.
pub(crate) fn session_cache(config: &OverlayConfig, session: &InstallSession) -> LocalArtifactCache {
    let mut cache = LocalArtifactCache::from_config(config, session.layout());
    if let Some(recorded) = session.recorded_cache_dir() {
        cache.set_cache_dir(recorded);
    }
    cache
}
