use anyhow::{bail, Result};
use clap::{Args, Subcommand};
use colored::Colorize;

use crate::config::{Config, API_KEY_ENV};

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: Option<ConfigCommand>,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show all configuration values
    Show,

    /// Print one configuration value
    Get {
        /// Config key (e.g., api.endpoint, output.directory)
        key: String,
    },

    /// Change a configuration value and save it
    Set {
        /// Config key (e.g., api.key, api.model_id)
        key: String,
        /// New value
        value: String,
    },

    /// Print where the config file lives
    Path,

    /// Restore default settings
    Reset {
        /// Required, resetting discards every saved value
        #[arg(short, long)]
        force: bool,
    },
}

pub fn run(args: ConfigArgs, config: &mut Config) -> Result<()> {
    match args.command.unwrap_or(ConfigCommand::Show) {
        ConfigCommand::Show => show_config(config),
        ConfigCommand::Get { key } => get_config(&key, config),
        ConfigCommand::Set { key, value } => set_config(&key, &value, config),
        ConfigCommand::Path => {
            println!("{}", config.config_path.display());
            Ok(())
        }
        ConfigCommand::Reset { force } => reset_config(force, config),
    }
}

/// Value as shown to the user; blank strings read as unset
fn display_value(config: &Config, key: &str) -> String {
    match config.get(key) {
        Some(v) if !v.is_empty() => v,
        _ => "(not set)".dimmed().to_string(),
    }
}

fn show_config(config: &Config) -> Result<()> {
    println!("{}", "Configuration".cyan().bold());
    println!("{}", "=".repeat(50));

    let mut section = "";
    for key in Config::keys() {
        let Some((sect, name)) = key.split_once('.') else {
            continue;
        };
        if sect != section {
            section = sect;
            println!();
            println!("[{}]", sect.yellow());
        }
        println!("  {} = {}", name.bold(), display_value(config, key));
    }

    if config.env_key.is_some() {
        println!();
        println!("{}", format!("api.key is taken from ${}", API_KEY_ENV).dimmed());
    }
    println!();
    println!("{}", format!("Suggested models: {}", Config::models().join(", ")).dimmed());
    println!("{}", format!("Config file: {}", config.config_path.display()).dimmed());

    Ok(())
}

fn get_config(key: &str, config: &Config) -> Result<()> {
    if !Config::keys().contains(&key) {
        bail!(
            "Unknown config key '{}'. Available keys: {}",
            key,
            Config::keys().join(", ")
        );
    }
    println!("{}", display_value(config, key));
    Ok(())
}

fn set_config(key: &str, value: &str, config: &mut Config) -> Result<()> {
    config.set(key, value)?;
    config.save()?;

    let shown = if key == "api.key" { "****" } else { value };
    println!("{} {} = {}", "Saved".green(), key.cyan(), shown);

    if key == "api.model_id" && !Config::models().contains(&value.trim()) {
        println!(
            "{}",
            format!("Note: '{}' is not a suggested model id; the API decides if it exists", value.trim()).dimmed()
        );
    }
    Ok(())
}

fn reset_config(force: bool, config: &mut Config) -> Result<()> {
    if !force {
        bail!("Resetting discards all saved settings. Re-run with --force to confirm.");
    }

    let fresh = Config {
        config_path: config.config_path.clone(),
        env_key: config.env_key.clone(),
        ..Config::default()
    };
    *config = fresh;
    config.save()?;

    println!("{} Configuration reset to defaults", "Saved".green());
    if config.env_key.is_some() {
        println!("{}", format!("API key will still be read from ${}", API_KEY_ENV).dimmed());
    }
    Ok(())
}
