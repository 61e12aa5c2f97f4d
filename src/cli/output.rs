//! CLI output formatting

use crate::{
    core::{JobOutcome, RunStatus, StepResult, StepState},
    execution::{ExecutionEvent, JobReport},
    persistence::RunSummary,
};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "- ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");
pub static PACKAGE: Emoji<'_, '_> = Emoji("📦 ", "* ");

/// Create a progress bar over job instances
pub fn create_progress_bar(total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    let bar_style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} jobs {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    progress.set_style(bar_style);
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Horizontal rule spanning the terminal width
pub fn separator() -> String {
    let width = term_size::dimensions_stdout()
        .map(|(w, _)| w)
        .unwrap_or(80);
    "─".repeat(width)
}

/// Format a step state for display
pub fn format_step_state(state: &StepState) -> String {
    match state {
        StepState::Succeeded { .. } => style("SUCCEEDED").green().to_string(),
        StepState::Failed { exit_code: Some(code), .. } => {
            style(format!("FAILED (exit {})", code)).red().to_string()
        }
        StepState::Failed { .. } => style("FAILED").red().to_string(),
        StepState::Skipped { .. } => style("SKIPPED").dim().to_string(),
    }
}

/// Indented step line for a job's breakdown
pub fn format_step_result(result: &StepResult) -> String {
    let mut line = format!("    {} {}", result.step_id, format_step_state(&result.state));
    match &result.state {
        StepState::Failed { error, .. } => line.push_str(&format!(": {}", style(error).dim())),
        StepState::Skipped { reason } => line.push_str(&format!(" ({})", reason)),
        StepState::Succeeded { .. } => {}
    }
    line
}

/// Format a run status for display
pub fn format_status(status: RunStatus) -> String {
    match status {
        RunStatus::Succeeded => style("SUCCEEDED").green().to_string(),
        RunStatus::Failed => style("FAILED").red().to_string(),
        RunStatus::NoJobs => style("NO JOBS").yellow().to_string(),
    }
}

/// Format a job outcome for display
pub fn format_outcome(outcome: JobOutcome) -> String {
    match outcome {
        JobOutcome::Success => style("success").green().to_string(),
        JobOutcome::Failed => style("failed").red().to_string(),
    }
}

/// One line per job for the end-of-run summary
pub fn format_job_report(job: &JobReport) -> String {
    let icon = if job.is_success() { CHECK } else { CROSS };
    let mut line = format!("{} {} - {}", icon, style(&job.name).bold(), format_outcome(job.outcome));

    if let Some(failure) = job.steps.first_failure() {
        line.push_str(&format!(" (at {})", style(&failure.step_id).red()));
    }
    for artifact in &job.artifacts {
        line.push_str(&format!("\n    {} {} -> {}", PACKAGE, artifact.name, style(&artifact.location).dim()));
    }
    line
}

/// Format run summary for display
pub fn format_run_summary(summary: &RunSummary) -> String {
    let status_icon = match summary.status {
        RunStatus::Succeeded => CHECK,
        RunStatus::Failed => CROSS,
        _ => INFO,
    };
    let trigger = summary
        .event
        .as_ref()
        .map(|e| e.to_string())
        .unwrap_or_else(|| "manual".to_string());

    format!(
        "{} {} - {} - {} ({}/{} jobs failed) - {}",
        status_icon,
        style(&summary.run_id.to_string()[..8]).dim(),
        style(&summary.workflow_name).bold(),
        format_status(summary.status),
        summary.failed_jobs,
        summary.total_jobs,
        style(trigger).cyan()
    )
}

/// Format an execution event for display
pub fn format_execution_event(event: &ExecutionEvent) -> String {
    match event {
        ExecutionEvent::RunStarted {
            run_id,
            workflow,
            total_jobs,
        } => format!(
            "{} Starting {} ({}) with {} jobs",
            ROCKET,
            style(workflow).bold(),
            style(&run_id.to_string()[..8]).dim(),
            style(total_jobs).cyan()
        ),
        ExecutionEvent::JobStarted { job } => {
            format!("{} {}", SPINNER, style(job).bold())
        }
        ExecutionEvent::StepStarted { job, step_id, name } => format!(
            "{} [{}] {} {}",
            SPINNER,
            style(job).dim(),
            style(step_id).cyan(),
            style(name).dim()
        ),
        ExecutionEvent::StepOutput { job, step_id, output } => format!(
            "{} Output from [{}] {}:\n{}",
            INFO,
            style(job).dim(),
            style(step_id).dim(),
            output
        ),
        ExecutionEvent::StepCompleted { job, step_id, .. } => {
            format!("{} [{}] {}", CHECK, style(job).dim(), style(step_id).green())
        }
        ExecutionEvent::StepFailed {
            job,
            step_id,
            error,
            ..
        } => format!(
            "{} [{}] {}: {}",
            CROSS,
            style(job).dim(),
            style(step_id).red(),
            style(error).dim()
        ),
        ExecutionEvent::StepSkipped { job, step_id, reason } => format!(
            "{} [{}] {} ({})",
            SKIP,
            style(job).dim(),
            style(step_id).dim(),
            reason
        ),
        ExecutionEvent::ArtifactCaptured { job, receipt } => format!(
            "{} [{}] artifact {} -> {}",
            PACKAGE,
            style(job).dim(),
            style(&receipt.name).cyan(),
            style(&receipt.location).dim()
        ),
        ExecutionEvent::JobCompleted { job, outcome } => {
            let icon = match outcome {
                JobOutcome::Success => CHECK,
                JobOutcome::Failed => CROSS,
            };
            format!("{} {} {}", icon, style(job).bold(), format_outcome(*outcome))
        }
        ExecutionEvent::RunCompleted { run_id, status } => {
            let status_str = match status {
                RunStatus::Succeeded => format!("{} completed", style("successfully").green()),
                RunStatus::Failed => style("failed").red().to_string(),
                RunStatus::NoJobs => style("had no jobs").yellow().to_string(),
                other => format!("{:?}", other),
            };
            format!(
                "{} Run ({}) {}",
                INFO,
                style(&run_id.to_string()[..8]).dim(),
                status_str
            )
        }
    }
}

/// Format step output with truncation
pub fn format_output(output: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = output.lines().collect();

    if lines.len() <= max_lines {
        output.to_string()
    } else {
        let truncated = lines[..max_lines].join("\n");
        format!(
            "{}\n{}... ({} more lines)",
            truncated,
            style("[truncated]").dim(),
            lines.len() - max_lines
        )
    }
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
