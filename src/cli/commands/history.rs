use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use super::generate::{execute, RunOptions};
use super::FORMATS;
use crate::config::Config;
use crate::core::{Job, JobStatus, PainterError};
use crate::db::Database;

#[derive(Args)]
pub struct HistoryArgs {
    #[command(subcommand)]
    pub command: Option<HistoryCommand>,

    /// Maximum number of entries to show
    #[arg(short, long, default_value = "20")]
    pub limit: u32,

    /// Filter by status (queued, running, completed, failed, cancelled)
    #[arg(short, long)]
    pub status: Option<String>,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    pub format: String,
}

#[derive(Subcommand)]
pub enum HistoryCommand {
    /// Show detailed information about a generation
    Show {
        /// Job ID
        job_id: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Generate again with the same prompt and parameters
    Retry {
        /// Job ID
        job_id: String,

        /// Output directory for downloaded images (downloads even if output.auto_download is off)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Don't download images automatically
        #[arg(long)]
        no_download: bool,

        /// Output format (text, json, quiet)
        #[arg(short, long, default_value = "text", value_parser = FORMATS)]
        format: String,
    },

    /// Delete an entry from history
    Delete {
        /// Job ID
        job_id: String,
    },

    /// Clear all history
    Clear {
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
}

pub async fn run(args: HistoryArgs, config: &Config, db: &Database) -> Result<()> {
    match args.command {
        Some(HistoryCommand::Show { job_id, format }) => show_job(&job_id, &format, db),
        Some(HistoryCommand::Retry {
            job_id,
            output,
            no_download,
            format,
        }) => {
            let opts = RunOptions {
                format: &format,
                output,
                download: !no_download,
            };
            retry_job(&job_id, config, db, opts).await
        }
        Some(HistoryCommand::Delete { job_id }) => delete_job(&job_id, db),
        Some(HistoryCommand::Clear { force }) => clear_jobs(force, db),
        None => list_jobs(args.limit, args.status.as_deref(), &args.format, db),
    }
}

fn list_jobs(limit: u32, status: Option<&str>, format: &str, db: &Database) -> Result<()> {
    let jobs = db.list_jobs(limit, status)?;

    if jobs.is_empty() {
        if format == "json" {
            println!("[]");
        } else {
            println!("{}", "No generations yet.".dimmed());
        }
        return Ok(());
    }

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&jobs)?);
        return Ok(());
    }

    // Table header
    println!(
        "{:<12} {:<12} {:<14} {:<40} {}",
        "ID".bold(),
        "STATUS".bold(),
        "MODEL".bold(),
        "PROMPT".bold(),
        "CREATED".bold()
    );
    println!("{}", "-".repeat(96));

    for job in &jobs {
        let status_colored = match job.status_name() {
            "completed" => "completed".green().to_string(),
            "failed" => "failed".red().to_string(),
            "running" => "running".yellow().to_string(),
            "queued" => "queued".blue().to_string(),
            "cancelled" => "cancelled".dimmed().to_string(),
            s => s.to_string(),
        };

        let created = job.created_at.format("%Y-%m-%d %H:%M").to_string();

        println!(
            "{:<12} {:<12} {:<14} {:<40} {}",
            job.id,
            status_colored,
            crate::core::request::preview(job.request.model_id(), 14),
            job.prompt_preview(38),
            created.dimmed()
        );
    }

    let count = db.count_jobs()?;
    if status.is_none() && count > jobs.len() as i64 {
        println!();
        println!(
            "{}",
            format!("Showing {} of {} entries. Use --limit to see more.", jobs.len(), count).dimmed()
        );
    }

    Ok(())
}

fn show_job(job_id: &str, format: &str, db: &Database) -> Result<()> {
    let Some(job) = db.get_job(job_id)? else {
        if format == "json" {
            println!("null");
            return Ok(());
        }
        return Err(PainterError::JobNotFound(job_id.to_string()).into());
    };

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&job)?);
        return Ok(());
    }

    println!();
    println!("{}: {}", "Job ID".cyan().bold(), job.id);
    println!("{}: {}", "Status".cyan().bold(), job.status);
    println!("{}: {}", "Model".cyan().bold(), job.request.model_id());
    println!("{}: {}", "Created".cyan().bold(), job.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("{}: {}", "Updated".cyan().bold(), job.updated_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!();
    println!("{}:", "Prompt".cyan().bold());
    println!("  {}", job.request.prompt());
    if let Some(neg) = job.request.negative_prompt() {
        println!("{}:", "Negative Prompt".cyan().bold());
        println!("  {}", neg);
    }
    println!();
    println!("{}:", "Parameters".cyan().bold());
    println!("  Size: {}x{}", job.request.width(), job.request.height());
    println!("  Guidance Scale: {}", job.request.guidance_scale());
    println!("  Inference Steps: {}", job.request.inference_steps());
    println!("  Samples: {}", job.request.sample_count());

    if !job.images.is_empty() {
        println!();
        println!("{}:", "Images".cyan().bold());
        for img in &job.images {
            println!("  [{}] {}", img.index, img.url);
            if let Some(path) = &img.path {
                println!("      saved to {}", path);
            }
        }
    }

    if let Some(parent) = &job.parent_id {
        println!();
        println!("{}: {}", "Retry Of".cyan().bold(), parent);
    }

    Ok(())
}

async fn retry_job(job_id: &str, config: &Config, db: &Database, opts: RunOptions<'_>) -> Result<()> {
    let parent = db
        .get_job(job_id)?
        .ok_or_else(|| PainterError::JobNotFound(job_id.to_string()))?;

    if !parent.status.is_terminal() {
        tracing::warn!("Retrying job {} which never finished ({})", parent.id, parent.status);
    } else if parent.status == JobStatus::Completed && opts.format == "text" {
        println!("{}", format!("Note: {} already completed; generating again.", parent.id).dimmed());
    }

    let key = config.api_key().ok_or(PainterError::MissingApiKey)?;
    let request = parent.request.clone().with_api_key(key);
    let job = Job::retry_of(&parent, request);

    execute(job, config, db, opts).await
}

fn delete_job(job_id: &str, db: &Database) -> Result<()> {
    if db.delete_job(job_id)? {
        println!("{} Deleted: {}", "✓".green(), job_id);
        Ok(())
    } else {
        Err(PainterError::JobNotFound(job_id.to_string()).into())
    }
}

fn clear_jobs(force: bool, db: &Database) -> Result<()> {
    let count = db.count_jobs()?;

    if count == 0 {
        println!("{}", "No history to clear.".dimmed());
        return Ok(());
    }

    if !force {
        eprintln!(
            "{}: This will delete {} entries. Use --force to confirm.",
            "Warning".yellow().bold(),
            count
        );
        return Ok(());
    }

    let removed = db.clear()?;
    println!("{} Cleared {} entries", "✓".green(), removed);
    Ok(())
}
