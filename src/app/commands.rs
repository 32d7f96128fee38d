//! Subcommand handlers
//!
//! Each handler prints its result as JSON on stdout and returns the process
//! exit status.

use crate::app::cli::{
    Command, CommitRef, MaterializeArgs, MeasuresArgs, ReplayPlanArgs, ScanArgs,
};
use crate::app::error::{AppError, AppResult, EXIT_FAILURE};
use crate::app::pipeline::Pipeline;
use crate::core::shutdown::ShutdownCoordinator;
use crate::jobs::{JobStatus, NewScanJob, Project};
use crate::scanner::{component_key, DEFAULT_METRICS};
use serde::Serialize;

pub async fn execute(
    command: &Command,
    pipeline: &Pipeline,
    shutdown: &ShutdownCoordinator,
) -> AppResult<i32> {
    match command {
        Command::Scan(args) => scan(pipeline, args, shutdown).await,
        Command::Materialize(args) => materialize(pipeline, args).await,
        Command::Discard(args) => discard(pipeline, args).await,
        Command::ReplayPlan(args) => replay_plan(pipeline, args).await,
        Command::Measures(args) => measures(pipeline, args).await,
    }
}

fn print_json<T: Serialize>(value: &T) -> AppResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn scan(
    pipeline: &Pipeline,
    args: &ScanArgs,
    shutdown: &ShutdownCoordinator,
) -> AppResult<i32> {
    let config_override = match &args.config_override {
        Some(path) => Some(
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| AppError::Io {
                    path: path.clone(),
                    source,
                })?,
        ),
        None => None,
    };

    let mut project = Project::new(&args.commit.project_key, 1);
    project.repo_url = args.source.repo.clone();
    project.slug = args.source.slug.clone();
    let job = NewScanJob {
        project_key: args.commit.project_key.clone(),
        commit_sha: args.commit.commit.clone(),
        repo_url: args.source.repo.clone(),
        slug: args.source.slug.clone(),
        max_retries: args.max_retries.unwrap_or(0),
        config_override,
    };

    let job = pipeline.run_job(project, job, shutdown).await?;
    print_json(&job)?;
    if job.status == JobStatus::Success {
        Ok(0)
    } else {
        log::error!(
            "Scan of {} at {} ended {}: {}",
            job.project_key,
            job.commit_sha,
            job.status,
            job.last_error.as_deref().unwrap_or("no error recorded")
        );
        Ok(EXIT_FAILURE)
    }
}

#[derive(Serialize)]
struct MaterializeOutput {
    path: String,
    effective_sha: String,
    replayed: bool,
}

async fn materialize(pipeline: &Pipeline, args: &MaterializeArgs) -> AppResult<i32> {
    let materialized = pipeline
        .workspace()
        .materialize(
            &args.commit.project_key,
            &args.commit.commit,
            args.source.repo.as_deref(),
            args.source.slug.as_deref(),
        )
        .await?;
    print_json(&MaterializeOutput {
        path: materialized.path.to_string_lossy().into_owned(),
        effective_sha: materialized.effective_sha,
        replayed: materialized.replayed,
    })?;
    Ok(0)
}

async fn discard(pipeline: &Pipeline, args: &CommitRef) -> AppResult<i32> {
    pipeline
        .workspace()
        .discard(&args.project_key, &args.commit)
        .await?;
    log::info!("Discarded worktree for {} at {}", args.project_key, args.commit);
    Ok(0)
}

async fn replay_plan(pipeline: &Pipeline, args: &ReplayPlanArgs) -> AppResult<i32> {
    let workspace = pipeline.workspace();
    if let Some(repo) = &args.repo {
        workspace
            .ensure_mirror(&args.commit.project_key, repo)
            .await?;
    }
    let plan = workspace
        .plan_replay(&args.commit.project_key, &args.commit.commit, &args.slug)
        .await?;
    print_json(&plan)?;
    Ok(0)
}

async fn measures(pipeline: &Pipeline, args: &MeasuresArgs) -> AppResult<i32> {
    let metrics: Vec<String> = if args.metrics.is_empty() {
        DEFAULT_METRICS.iter().map(|metric| metric.to_string()).collect()
    } else {
        args.metrics.clone()
    };
    let component = component_key(&args.commit.project_key, &args.commit.commit);
    let measures = pipeline.target().fetch_measures(&component, &metrics).await?;
    if measures.is_empty() {
        log::warn!("No measures reported for {}", component);
    }
    print_json(&measures)?;
    Ok(0)
}
