//! Command-line interface.
//!
//! Credentials and destinations can come from flags or environment variables.
//!
//! ```sh
//! # Full weekly run
//! vlaamse_chroniqueur --google-access-token "$TOKEN"
//!
//! # Rebuild the document from a saved package
//! vlaamse_chroniqueur --package ./packages/2025-10-06.json --week-start 2025-10-06
//!
//! # Check the layout without touching Google
//! vlaamse_chroniqueur --package ./packages/2025-10-06.json --dry-run
//! ```

use chrono::NaiveDate;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Monday of the week to produce (defaults to the upcoming Monday)
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub week_start: Option<NaiveDate>,

    /// Path to the language model config.yaml (defaults to the awful_aj config dir)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Optional YAML file with pipeline settings
    #[arg(short, long)]
    pub settings: Option<String>,

    /// Build the document from a saved script package instead of generating one
    #[arg(short, long)]
    pub package: Option<String>,

    /// Directory to archive the script package JSON in
    #[arg(short, long)]
    pub json_output_dir: Option<String>,

    /// Assemble and log the document layout without calling Google
    #[arg(long)]
    pub dry_run: bool,

    /// OAuth access token with Docs and Drive scopes
    #[arg(long, env = "GOOGLE_ACCESS_TOKEN", hide_env_values = true)]
    pub google_access_token: Option<String>,

    /// Drive folder holding the weekly documents
    #[arg(long, env = "GOOGLE_DRIVE_FOLDER_ID")]
    pub drive_folder_id: Option<String>,

    /// Discord webhook for the summary message
    #[arg(long, env = "DISCORD_WEBHOOK_URL", hide_env_values = true)]
    pub discord_webhook_url: Option<String>,
}

impl Cli {
    /// Folder id, ignoring a blank value.
    pub fn folder_id(&self) -> Option<String> {
        self.drive_folder_id
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(str::to_string)
    }
}
