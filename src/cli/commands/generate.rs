use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::FORMATS;
use crate::api::DiffusionClient;
use crate::config::{Config, DisplayMode};
use crate::core::{validate_prompt, Job};
use crate::db::Database;

#[derive(Args)]
pub struct GenerateArgs {
    /// The prompt describing the image to generate
    #[arg(required = true)]
    pub prompt: String,

    /// What the image should avoid (overrides defaults.negative_prompt)
    #[arg(short, long)]
    pub negative: Option<String>,

    /// Model id to use
    #[arg(short, long)]
    pub model: Option<String>,

    /// Output directory for downloaded images (downloads even if output.auto_download is off)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Don't download images automatically
    #[arg(long)]
    pub no_download: bool,

    /// Output format (text, json, quiet)
    #[arg(short, long, default_value = "text", value_parser = FORMATS)]
    pub format: String,
}

/// How a finished generation is reported
pub struct RunOptions<'a> {
    pub format: &'a str,
    pub output: Option<PathBuf>,
    pub download: bool,
}

impl RunOptions<'_> {
    /// `--no-download` always wins; an explicit `--output` overrides `auto_download`
    fn wants_download(&self, auto_download: bool) -> bool {
        self.download && (auto_download || self.output.is_some())
    }
}

pub async fn run(args: GenerateArgs, config: &Config, db: &Database) -> Result<()> {
    let prompt = validate_prompt(&args.prompt, &config.tui.placeholder)?;

    let mut request = config.request_for(prompt)?;
    if let Some(neg) = &args.negative {
        request = request.with_negative_prompt(neg);
    }
    if let Some(model) = &args.model {
        request = request.with_model(model);
    }

    let job = Job::new(request);
    let opts = RunOptions {
        format: &args.format,
        output: args.output,
        download: !args.no_download,
    };
    execute(job, config, db, opts).await
}

/// Run a recorded job through the client, then save and report its images
pub async fn execute(mut job: Job, config: &Config, db: &Database, opts: RunOptions<'_>) -> Result<()> {
    db.insert_job(&job)?;

    let client = DiffusionClient::from_config(&config.api)?;
    tracing::info!("Job {} -> {}", job.id, client.endpoint());

    // Show progress
    let pb = if opts.format == "text" {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.magenta} {msg}")
                .context("Invalid spinner template")?,
        );
        pb.set_message(format!("Generating image: {}...", job.prompt_preview(40)));
        pb.enable_steady_tick(Duration::from_millis(100));
        Some(pb)
    } else {
        None
    };

    job.set_running();
    db.update_job(&job)?;

    let result = client.generate(&job.request).await;
    job.apply_result(&result);
    db.update_job(&job)?;

    if let Err(e) = result.into_result() {
        if let Some(pb) = pb {
            pb.finish_with_message(format!("{} Generation failed", "✗".red()));
        }

        if opts.format == "json" {
            println!("{}", serde_json::to_string_pretty(&job)?);
        } else if opts.format != "quiet" {
            eprintln!("{}: {}", "Error".red().bold(), e);
            eprintln!(
                "{}",
                format!("Retry with: painter history retry {}", job.id).dimmed()
            );
        }
        return Err(e.into());
    }

    let download = opts.wants_download(config.output.auto_download);
    let output_dir = opts
        .output
        .unwrap_or_else(|| PathBuf::from(&config.output.directory));

    let paths = if download {
        if let Some(pb) = &pb {
            pb.set_message("Downloading image...");
        }
        let paths = download_all(&client, &mut job, &output_dir).await;
        db.update_job(&job)?;
        paths
    } else {
        Vec::new()
    };

    if let Some(pb) = &pb {
        pb.finish_with_message(format!(
            "{} Generated {} image(s){}",
            "✓".green(),
            job.images.len(),
            if paths.is_empty() { " (not downloaded)" } else { "" }
        ));
    }

    match opts.format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&job)?);
        }
        "quiet" => {
            if paths.is_empty() {
                for image in &job.images {
                    println!("{}", image.url);
                }
            } else {
                for path in &paths {
                    println!("{}", path.display());
                }
            }
        }
        _ => {
            println!();
            println!("{}: {}", "Job ID".cyan().bold(), job.id);
            println!("{}: {}", "Prompt".cyan().bold(), job.request.prompt());
            if let Some(neg) = job.request.negative_prompt() {
                println!("{}: {}", "Negative".cyan().bold(), neg);
            }
            println!("{}: {}", "Model".cyan().bold(), job.request.model_id());
            println!("{}: {}", "Status".cyan().bold(), "completed".green());
            println!();
            println!("{}:", "Image URLs".cyan().bold());
            for image in &job.images {
                println!("  {}", image.url);
            }
            if !paths.is_empty() {
                println!("{}:", "Saved".cyan().bold());
                for path in &paths {
                    println!("  {}", path.display());
                }
            }

            if config.output.display == DisplayMode::Terminal {
                if let Some(first_path) = paths.first() {
                    println!();
                    display_image_terminal(first_path);
                }
            }
        }
    }

    Ok(())
}

/// Save every returned image; failures are reported and skipped
async fn download_all(client: &DiffusionClient, job: &mut Job, output_dir: &Path) -> Vec<PathBuf> {
    let targets: Vec<(usize, String)> = job
        .images
        .iter()
        .map(|img| (img.index, img.url.clone()))
        .collect();

    let mut paths = Vec::new();
    for (index, url) in targets {
        let stem = format!("{}_{}", job.id, index);
        match client.download_image(&url, output_dir, &stem).await {
            Ok(path) => {
                job.set_image_path(index, path.to_string_lossy());
                paths.push(path);
            }
            Err(e) => {
                tracing::warn!("Failed to download {}: {:#}", url, e);
                eprintln!("{}: could not download {}: {}", "Warning".yellow().bold(), url, e);
            }
        }
    }
    paths
}

/// Display an image in the terminal using viuer
fn display_image_terminal(path: &Path) {
    let conf = viuer::Config {
        width: Some(60),
        height: Some(30),
        absolute_offset: false,
        ..Default::default()
    };

    if let Err(e) = viuer::print_from_file(path, &conf) {
        tracing::debug!("Failed to display image in terminal: {}", e);
    }
}
