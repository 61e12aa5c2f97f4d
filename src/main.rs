use anyhow::{Context, Result};
use matrix_pipeline::cli::commands::{HistoryCommand, ListCommand, MatrixCommand, RunCommand, ValidateCommand};
use matrix_pipeline::cli::output::*;
use matrix_pipeline::cli::{Cli, Command};
use matrix_pipeline::core::config::WorkflowConfig;
use matrix_pipeline::core::RunStatus;
use matrix_pipeline::execution::{
    ExecutionEngine, ExecutionEvent, LocalArtifactStore, RunReport, SchedulingStrategy, ShellCommandRunner,
};
use matrix_pipeline::persistence::{create_summary, InMemoryPersistence, PersistenceBackend, RunSummary};
use std::sync::Arc;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    // Execute command
    match &cli.command {
        Command::Run(cmd) => run_workflow(cmd, &cli).await?,
        Command::Validate(cmd) => validate_workflow(cmd)?,
        Command::Matrix(cmd) => show_matrix(cmd)?,
        Command::List(cmd) => list_workflows(cmd).await?,
        Command::History(cmd) => show_history(cmd).await?,
    }

    Ok(())
}

#[cfg(feature = "sqlite")]
async fn open_history() -> Result<Arc<dyn PersistenceBackend>> {
    let store = matrix_pipeline::persistence::SqliteRunStore::with_default_path()
        .await
        .context("Failed to open run history")?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "sqlite"))]
async fn open_history() -> Result<Arc<dyn PersistenceBackend>> {
    tracing::warn!("Built without the sqlite feature; run history is not persisted");
    Ok(Arc::new(InMemoryPersistence::new()))
}

async fn run_workflow(cmd: &RunCommand, cli: &Cli) -> Result<()> {
    // Load workflow
    let config = WorkflowConfig::from_file(&cmd.file).context("Failed to load workflow")?;
    let mut workflow = config.to_workflow()?;

    println!("{} Loaded workflow: {}", INFO, style(&workflow.name).bold());

    for (key, value) in &cmd.env {
        workflow.env.insert(key.clone(), value.clone());
        println!(
            "{} Environment override: {} = {}",
            INFO,
            style(key).cyan(),
            style(value).dim()
        );
    }
    if let Some(max) = cmd.max_parallel {
        workflow.max_parallel = Some(max);
    }

    let event = cmd.trigger_event();
    if let Some(event) = &event {
        if !workflow.is_triggered_by(event) {
            println!(
                "{} {} is not triggered by {}",
                INFO,
                style(&workflow.name).bold(),
                style(event).cyan()
            );
            return Ok(());
        }
    }

    // Set up persistence
    let store: Arc<dyn PersistenceBackend> = if cmd.no_history {
        Arc::new(InMemoryPersistence::new())
    } else {
        open_history().await?
    };

    let settings = cmd.runner_settings();
    let artifacts = Arc::new(LocalArtifactStore::new(settings.artifacts_root.clone()));
    let strategy: SchedulingStrategy = cmd.strategy.into();

    // Create execution engine
    let mut engine = ExecutionEngine::new(Arc::new(ShellCommandRunner::new()), artifacts, settings, strategy);

    let total_jobs = workflow.expand().len();
    let progress = create_progress_bar(total_jobs);
    let bar = progress.clone();
    let stream = cli.stream;
    engine.add_event_handler(move |event| {
        match &event {
            ExecutionEvent::StepOutput { output, .. } => {
                if stream {
                    bar.println(format_output(output, 20));
                }
                return;
            }
            ExecutionEvent::JobCompleted { .. } => bar.inc(1),
            _ => {}
        }
        bar.println(format_execution_event(&event));
    });

    // Execute run
    println!();
    let report = engine.execute(&workflow, event).await;
    progress.finish_and_clear();

    print_report(&report);

    // Save to history
    if !cmd.no_history {
        let summary = create_summary(&report);
        store.save_run(&summary).await?;
        println!(
            "\n{} Run saved to history (ID: {})",
            INFO,
            style(&summary.run_id.to_string()[..8]).dim()
        );
    }

    // Print final status
    match report.status {
        RunStatus::NoJobs => {
            println!("\n{} {}: no jobs to run", WARN, style(&workflow.name).bold());
        }
        RunStatus::Failed => {
            println!(
                "\n{} {} {}",
                CROSS,
                style(&workflow.name).bold(),
                style("failed").red()
            );
            error!(
                "{} of {} jobs failed",
                report.failed_jobs().count(),
                report.jobs.len()
            );
            std::process::exit(1);
        }
        _ => {
            println!(
                "\n{} {} completed {}",
                CHECK,
                style(&workflow.name).bold(),
                style("successfully").green()
            );
        }
    }

    Ok(())
}

fn print_report(report: &RunReport) {
    if report.jobs.is_empty() {
        return;
    }
    println!("{}", style(separator()).dim());
    for job in &report.jobs {
        println!("{}", format_job_report(job));
        if !job.is_success() {
            for step in job.steps.iter() {
                println!("{}", format_step_result(step));
            }
        }
    }
    if let Ok(duration) = report
        .completed_at
        .signed_duration_since(report.started_at)
        .to_std()
    {
        println!("{} Duration: {}", INFO, style(format_duration(duration)).dim());
    }
}

fn validate_workflow(cmd: &ValidateCommand) -> Result<()> {
    println!("{} Validating workflow...", INFO);

    let result = WorkflowConfig::from_file(&cmd.file).and_then(|config| {
        let workflow = config.to_workflow()?;
        Ok((config, workflow))
    });

    match result {
        Ok((config, workflow)) => {
            println!("{} Workflow is valid!", CHECK);
            println!("  Name: {}", style(&workflow.name).bold());
            println!("  Axes: {}", style(workflow.matrix.axes.len()).cyan());
            println!("  Jobs: {}", style(workflow.expand().len()).cyan());
            println!("  Steps: {}", style(workflow.steps.len()).cyan());

            if cmd.json {
                let json = serde_json::to_string_pretty(&config)?;
                println!("\n{}", json);
            }
            Ok(())
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(format!("{:#}", e)).red());
            std::process::exit(1);
        }
    }
}

fn show_matrix(cmd: &MatrixCommand) -> Result<()> {
    let workflow = WorkflowConfig::from_file(&cmd.file)?.to_workflow()?;
    let jobs = workflow.expand();

    if cmd.json {
        let data: Vec<serde_json::Value> = jobs
            .iter()
            .map(|job| {
                let assignment: serde_json::Map<String, serde_json::Value> = job
                    .assignment
                    .iter()
                    .map(|(axis, value)| (axis.clone(), serde_json::Value::String(value.clone())))
                    .collect();
                serde_json::json!({
                    "index": job.index,
                    "name": workflow.job_name(job),
                    "matrix": assignment,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    if jobs.is_empty() {
        println!("{} {}: no jobs", WARN, style(&workflow.name).bold());
        return Ok(());
    }

    println!(
        "{} {} expands to {} of {} combinations:",
        INFO,
        style(&workflow.name).bold(),
        style(jobs.len()).cyan(),
        workflow.matrix.product_size()
    );
    for job in &jobs {
        println!("  {}", workflow.job_name(job));
    }

    Ok(())
}

async fn list_workflows(cmd: &ListCommand) -> Result<()> {
    let store = open_history().await?;
    let workflows = store.list_workflows().await?;

    if cmd.json {
        let mut json_data = Vec::new();
        for name in &workflows {
            let runs = store.list_runs(name).await?;
            json_data.push(serde_json::json!({
                "name": name,
                "run_count": runs.len(),
            }));
        }
        let data = serde_json::json!({ "workflows": json_data });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    if workflows.is_empty() {
        println!("{} No workflows found in history", INFO);
        return Ok(());
    }

    println!("{} Workflows in history:", INFO);

    for name in &workflows {
        if cmd.with_counts {
            let runs = store.list_runs(name).await?;
            let succeeded = runs.iter().filter(|r| r.status == RunStatus::Succeeded).count();
            let failed = runs.iter().filter(|r| r.status == RunStatus::Failed).count();
            println!(
                "  {} ({} runs: {} succeeded, {} failed)",
                style(name).bold(),
                style(runs.len()).cyan(),
                style(succeeded).green(),
                style(failed).red()
            );
        } else {
            println!("  {}", style(name).bold());
        }
    }

    Ok(())
}

async fn show_history(cmd: &HistoryCommand) -> Result<()> {
    let store = open_history().await?;

    // If specific run ID is requested
    if let Some(run_id) = &cmd.run_id {
        let run_id = uuid::Uuid::parse_str(run_id).context("Invalid run ID format")?;
        match store.load_run(run_id).await? {
            Some(summary) => print_run_details(&summary, cmd.verbose)?,
            None => println!("{} Run not found", WARN),
        }
        return Ok(());
    }

    // List runs for one workflow or all
    let mut runs = match &cmd.workflow {
        Some(name) => store.list_runs(name).await?,
        None => {
            let mut all = Vec::new();
            for name in store.list_workflows().await? {
                all.extend(store.list_runs(&name).await?);
            }
            all.sort_by(|a, b| b.started_at.cmp(&a.started_at));
            all
        }
    };
    runs.truncate(cmd.limit);

    if cmd.json {
        let data = serde_json::json!({ "runs": runs });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    if runs.is_empty() {
        println!("{} No runs found", INFO);
        return Ok(());
    }

    println!("{} Run history (showing latest {}):", INFO, cmd.limit);
    for summary in &runs {
        println!("  {}", format_run_summary(summary));
    }

    Ok(())
}

fn print_run_details(summary: &RunSummary, verbose: bool) -> Result<()> {
    println!("{} Run Details", INFO);
    println!("  ID: {}", style(summary.run_id).cyan());
    println!("  Workflow: {}", style(&summary.workflow_name).bold());
    if let Some(event) = &summary.event {
        println!("  Trigger: {}", style(event).cyan());
    }
    println!("  Status: {}", format_status(summary.status));
    println!("  Started: {}", style(summary.started_at.to_rfc3339()).dim());
    if let Some(completed) = summary.completed_at {
        println!("  Completed: {}", style(completed.to_rfc3339()).dim());
        if let Ok(duration) = completed.signed_duration_since(summary.started_at).to_std() {
            println!("  Duration: {}", style(format_duration(duration)).dim());
        }
    }
    println!(
        "  Jobs: {} ({} failed)",
        style(summary.total_jobs).cyan(),
        style(summary.failed_jobs).red()
    );
    for job in &summary.jobs {
        let icon = if job.failed_step.is_some() { CROSS } else { CHECK };
        match &job.failed_step {
            Some(step) => println!("    {} {} (at {})", icon, job.name, style(step).red()),
            None => println!("    {} {}", icon, job.name),
        }
    }

    if verbose {
        println!("\n  {}", style("Full details:").bold());
        let json = serde_json::to_string_pretty(summary)?;
        for line in json.lines() {
            println!("    {}", line);
        }
    }

    Ok(())
}
