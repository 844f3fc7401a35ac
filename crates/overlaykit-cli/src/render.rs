use std::io::IsTerminal;
use std::time::{Duration, Instant};

use anstyle::{AnsiColor, Effects, Style};
use indicatif::{HumanCount, ProgressBar, ProgressStyle};
use overlaykit_core::InstalledVersionRecord;
use overlaykit_installer::{
    ActiveInstall, InstallFailure, InstallReport, OverlayState, PipelineStage, ProgressSink,
    SnapshotResolution,
};

pub(crate) const OUTPUT_ENV: &str = "OVERLAYKIT_OUTPUT";

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum OutputStyle {
    Plain,
    Rich,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum UiMode {
    Plain,
    Interactive,
}

#[derive(Copy, Clone, Debug)]
pub(crate) struct TerminalRenderer {
    style: OutputStyle,
    mode: UiMode,
}

struct TerminalProgress {
    style: OutputStyle,
    label: String,
    total: u64,
    current: u64,
    progress_bar: Option<ProgressBar>,
    started_at: Instant,
}

pub(crate) fn resolve_output_style(stdout_is_tty: bool, requested: Option<&str>) -> OutputStyle {
    match requested.map(|value| value.trim().to_ascii_lowercase()) {
        Some(value) if value == "plain" => OutputStyle::Plain,
        Some(value) if value == "rich" => OutputStyle::Rich,
        _ if stdout_is_tty => OutputStyle::Rich,
        _ => OutputStyle::Plain,
    }
}

pub(crate) fn current_output_style() -> OutputStyle {
    resolve_output_style(
        std::io::stdout().is_terminal(),
        std::env::var(OUTPUT_ENV).ok().as_deref(),
    )
}

impl TerminalRenderer {
    pub(crate) fn from_style(style: OutputStyle) -> Self {
        Self {
            style,
            mode: ui_mode_from_style(style),
        }
    }

    pub(crate) fn current() -> Self {
        Self::from_style(current_output_style())
    }

    pub(crate) fn print_status(self, status: &str, message: &str) {
        println!("{}", render_status_line(self.style, status, message));
    }

    pub(crate) fn print_section(self, title: &str) {
        if let Some(line) = render_section_header(self.mode, title) {
            println!();
            let rendered = match self.style {
                OutputStyle::Plain => line,
                OutputStyle::Rich => colorize(section_style(), &line),
            };
            println!("{rendered}");
        }
    }

    pub(crate) fn print_lines(self, lines: &[String]) {
        for line in lines {
            println!("{line}");
        }
    }

    fn start_progress(self, label: &str, total: u64) -> TerminalProgress {
        let progress_bar = if self.style == OutputStyle::Rich {
            let progress_bar = ProgressBar::new(total.max(1));
            if let Ok(style) = ProgressStyle::with_template(
                "{spinner:.cyan.bold} {msg:<8} [{bar:20.cyan/blue}] {pos:>4}/{len:4} {elapsed_precise}",
            ) {
                progress_bar.set_style(
                    style
                        .tick_chars(progress_tick_chars(label))
                        .progress_chars("=>-"),
                );
            }
            progress_bar.set_message(label.to_string());
            Some(progress_bar)
        } else {
            None
        };

        TerminalProgress {
            style: self.style,
            label: label.to_string(),
            total,
            current: 0,
            progress_bar,
            started_at: Instant::now(),
        }
    }
}

impl TerminalProgress {
    fn set(&mut self, current: u64, total: u64) {
        self.total = total;
        self.current = current.min(self.total);

        let Some(progress_bar) = &self.progress_bar else {
            return;
        };

        let safe_total = self.total.max(1);
        progress_bar.set_length(safe_total);
        progress_bar.set_position(self.current.min(safe_total));
    }

    fn pulse(&self) {
        if let Some(progress_bar) = &self.progress_bar {
            progress_bar.tick();
        }
    }

    fn finish_success(mut self) {
        let Some(progress_bar) = self.progress_bar.take() else {
            return;
        };

        progress_bar.finish_and_clear();
        if let Some(line) = render_progress_line(
            self.style,
            &self.label,
            self.current,
            self.total,
            Some(self.started_at.elapsed()),
        ) {
            println!("{line}");
        }
    }

    fn finish_abandon(mut self) {
        if let Some(progress_bar) = self.progress_bar.take() {
            progress_bar.finish_and_clear();
        }
    }
}

/// Terminal front for the install pipeline: one bar per extracted archive and
/// a status line per stage.
pub(crate) struct InstallProgress {
    renderer: TerminalRenderer,
    current: Option<TerminalProgress>,
}

impl InstallProgress {
    pub(crate) fn new(renderer: TerminalRenderer) -> Self {
        Self {
            renderer,
            current: None,
        }
    }

    fn finish_current(&mut self) {
        if let Some(progress) = self.current.take() {
            progress.finish_success();
        }
    }

    pub(crate) fn abandon(&mut self) {
        if let Some(progress) = self.current.take() {
            progress.finish_abandon();
        }
    }
}

impl ProgressSink for InstallProgress {
    fn tick(&mut self, completed: u64, total: u64, label: &str) {
        if self
            .current
            .as_ref()
            .is_some_and(|progress| progress.label != label)
        {
            self.finish_current();
        }
        let renderer = self.renderer;
        let progress = self
            .current
            .get_or_insert_with(|| renderer.start_progress(label, total));
        progress.set(completed, total);
    }

    fn stage(&mut self, stage: PipelineStage) {
        if stage == PipelineStage::Failed || stage == PipelineStage::RollingBack {
            self.abandon();
        } else {
            self.finish_current();
        }
        if let Some(message) = stage_message(stage) {
            self.renderer.print_status("step", message);
        }
    }

    fn waiting(&mut self, _label: &str) {
        if let Some(progress) = &self.current {
            progress.pulse();
        }
    }
}

impl Drop for InstallProgress {
    fn drop(&mut self) {
        self.abandon();
    }
}

fn stage_message(stage: PipelineStage) -> Option<&'static str> {
    match stage {
        PipelineStage::Idle | PipelineStage::Done | PipelineStage::Failed => None,
        PipelineStage::BackingUp => Some("backing up target directories"),
        PipelineStage::Extracting => Some("extracting archives"),
        PipelineStage::Installing => Some("installing base and overlay"),
        PipelineStage::Persisting => Some("saving version record"),
        PipelineStage::CleaningUp => Some("removing spent snapshots"),
        PipelineStage::RollingBack => Some("restoring previous installation"),
    }
}

pub(crate) fn render_status_line(style: OutputStyle, status: &str, message: &str) -> String {
    match style {
        OutputStyle::Plain => message.to_string(),
        OutputStyle::Rich => {
            let (badge, badge_style) = status_badge(status);
            format!("{} {message}", colorize(badge_style, badge))
        }
    }
}

fn status_badge(status: &str) -> (&'static str, Style) {
    match status {
        "ok" => ("[OK]", color(AnsiColor::BrightGreen)),
        "warn" => ("[WARN]", color(AnsiColor::BrightYellow)),
        "error" => ("[ERR]", color(AnsiColor::BrightRed)),
        _ => ("[..]", color(AnsiColor::BrightBlue)),
    }
}

pub(crate) fn format_install_summary(report: &InstallReport) -> String {
    format!(
        "installed base={} overlay={} at {}",
        report.record.base_tag,
        report.record.overlay_tag,
        report.installed_dir.display()
    )
}

pub(crate) fn format_install_failure_lines(failure: &InstallFailure) -> Vec<(&'static str, String)> {
    let mut lines = Vec::new();
    match (failure.resolution, &failure.rollback_error) {
        (None, _) => lines.push(("warn", "nothing was changed".to_string())),
        (Some(SnapshotResolution::RolledBack), None) => {
            lines.push(("warn", "previous installation restored".to_string()))
        }
        (Some(SnapshotResolution::NothingToRestore), None) => lines.push((
            "warn",
            "no previous installation existed; partial files removed".to_string(),
        )),
        (Some(_), Some(err)) => {
            lines.push(("error", format!("rollback incomplete: {err}")));
            lines.push((
                "warn",
                "run `overlaykit recover` once the cause is fixed".to_string(),
            ));
        }
        (Some(SnapshotResolution::Committed), None) => {}
    }
    if failure.error.is_locked() {
        lines.push((
            "warn",
            "close the editor or any process using the directory and retry".to_string(),
        ));
    }
    lines
}

pub(crate) fn format_status_lines(
    record: &InstalledVersionRecord,
    state: OverlayState,
    pending: Option<&ActiveInstall>,
) -> Vec<String> {
    let tag_or_none = |tag: &str| {
        if tag.is_empty() {
            "(none)".to_string()
        } else {
            tag.to_string()
        }
    };

    let mut lines = vec![
        format!("base: {}", tag_or_none(&record.base_tag)),
        format!("overlay: {}", tag_or_none(&record.overlay_tag)),
    ];
    if !record.install_time_text.is_empty() {
        lines.push(format!("installed at: {}", record.install_time_text));
    }
    if !record.cache_dir.is_empty() {
        lines.push(format!("cache dir: {}", record.cache_dir));
    }
    lines.push(format!("overlay state: {}", state.as_str()));
    if let Some(attempt) = pending {
        lines.push(format!(
            "pending install: attempt={} status={} (run `overlaykit recover`)",
            attempt.attempt_id,
            attempt.status.as_str()
        ));
    }
    lines
}

fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let millis = elapsed.subsec_millis();
    format!("{secs}.{millis:03}s")
}

fn progress_tick_chars(label: &str) -> &'static str {
    match label {
        "base" => ".oO@* ",
        "overlay" => "-=~* ",
        _ => "|/-\\ ",
    }
}

fn color(color: AnsiColor) -> Style {
    Style::new()
        .fg_color(Some(color.into()))
        .effects(Effects::BOLD)
}

fn section_style() -> Style {
    color(AnsiColor::BrightBlue)
}

fn progress_label_style() -> Style {
    color(AnsiColor::BrightCyan)
}

fn progress_bar_style() -> Style {
    Style::new().fg_color(Some(AnsiColor::BrightBlue.into()))
}

fn colorize(style: Style, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}

fn ui_mode_from_style(style: OutputStyle) -> UiMode {
    match style {
        OutputStyle::Plain => UiMode::Plain,
        OutputStyle::Rich => UiMode::Interactive,
    }
}

fn render_section_header(mode: UiMode, title: &str) -> Option<String> {
    match mode {
        UiMode::Plain => None,
        UiMode::Interactive => Some(format!("== {title} ==")),
    }
}

pub(crate) fn render_progress_line(
    style: OutputStyle,
    label: &str,
    current: u64,
    total: u64,
    elapsed: Option<Duration>,
) -> Option<String> {
    if style == OutputStyle::Plain {
        return None;
    }

    let width = 18_usize;
    let safe_total = total.max(1);
    let bounded_current = current.min(safe_total);
    let filled = ((bounded_current as usize) * width) / (safe_total as usize);
    let bar = format!(
        "{}{}",
        "=".repeat(filled),
        "-".repeat(width.saturating_sub(filled))
    );
    let percent = (bounded_current * 100) / safe_total;
    let counts = format!("{}/{}", HumanCount(current), HumanCount(total));
    let suffix = elapsed
        .map(|value| format!(" extracted in {}", format_elapsed(value)))
        .unwrap_or_default();

    Some(format!(
        "{} [{}] {:>3}% {}{}",
        colorize(progress_label_style(), label),
        colorize(progress_bar_style(), &bar),
        percent,
        counts,
        suffix
    ))
}
