pub mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "painter",
    author = "Eduard Kanevskii",
    version,
    about = "AI Painter - Generate images from text with Stable Diffusion",
    long_about = r#"AI Painter - Generate images from text with Stable Diffusion

Type a prompt, get an image. Prompts are sent to the Stable Diffusion API
and the returned image is saved locally.
Run without arguments to launch the interactive TUI.

SETUP:
  Set your API key via environment variable or config:
    export STABLE_DIFFUSION_API_KEY=your-key-here
    painter config set api.key your-key-here

EXAMPLES:
  Generate an image:
    painter generate "a lighthouse on a cliff at dusk"
    painter g "portrait of a fox" --negative "blurry, text"
    painter generate "isometric city" --model sdxl --format json

  View history and retry failures:
    painter history
    painter history show ap_abc12345
    painter history retry ap_abc12345

  Manage configuration:
    painter config show
    painter config set api.model_id sdxl

  Launch interactive TUI:
    painter

OUTPUT FORMATS:
  --format text   Human-readable output (default)
  --format json   Machine-readable JSON
  --format quiet  Minimal output, just file paths or URLs"#,
    after_help = r#"CONFIGURATION:
  Config file: ~/.config/painter/config.toml (Linux)
  History: ~/.local/share/painter/history.db

  Images are generated at 512x512, guidance scale 8, 25 inference steps.

  Logging: set RUST_LOG=debug to see request and response bodies."#
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate a new image from a text prompt
    ///
    /// Sends the prompt to the Stable Diffusion API and saves the returned
    /// image to the configured output directory.
    #[command(
        alias = "g",
        after_help = r#"EXAMPLES:
  Basic generation:
    painter generate "a red apple on a wooden table"

  Steer away from artifacts:
    painter generate "studio portrait" --negative "extra fingers, watermark"

  Different model:
    painter generate "anime landscape" --model anything-v5

  JSON output:
    painter generate "abstract art" --format json

  Custom output directory:
    painter generate "logo design" --output ./logos"#
    )]
    Generate(commands::generate::GenerateArgs),

    /// View and manage generation history
    ///
    /// Every generation is recorded in a local SQLite database.
    /// A failed generation can be retried with the same parameters.
    #[command(
        alias = "h",
        after_help = r#"EXAMPLES:
  List recent generations:
    painter history
    painter history --limit 50

  Filter by status:
    painter history --status failed

  View details:
    painter history show ap_abc12345

  Retry with the same prompt:
    painter history retry ap_abc12345

  Delete an entry:
    painter history delete ap_abc12345

  Clear all history:
    painter history clear --force"#
    )]
    History(commands::history::HistoryArgs),

    /// View or modify configuration
    ///
    /// Changes are saved to the config file immediately.
    #[command(
        alias = "c",
        after_help = r#"EXAMPLES:
  Show all settings:
    painter config show

  Get a specific value:
    painter config get api.endpoint

  Set values:
    painter config set api.key YOUR_API_KEY
    painter config set api.model_id sdxl
    painter config set output.directory ~/Pictures/painter

  Show config file path:
    painter config path

  Reset to defaults:
    painter config reset --force

AVAILABLE SETTINGS:
  api.key                  - Stable Diffusion API key
  api.endpoint             - Generation endpoint URL
  api.model_id             - Model id sent with each request
  api.timeout_secs         - Whole-request timeout
  api.connect_timeout_secs - Connection timeout
  defaults.negative_prompt - Negative prompt used when none is given
  output.directory         - Where to save images
  output.auto_download     - Download images after generation (true/false)
  output.display           - Show image in terminal (terminal/none)
  tui.placeholder          - Placeholder text of the TUI prompt box"#
    )]
    Config(commands::config::ConfigArgs),
}
