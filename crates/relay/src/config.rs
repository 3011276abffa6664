//! Relay configuration
//!
//! All settings live in one [`HeraldConfig`] value that is loaded once at
//! startup and handed to the pipeline. Sources, in order of priority:
//! 1. JSON file (`~/.config/herald/herald.json` or an explicit path)
//! 2. Environment overlays applied by [`HeraldConfig::apply_env`]
//!    (`GMAIL_*` credentials and `ALIAS_*` entries)
//!
//! Nothing in the library reads the environment on its own.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::alias::{AliasEntry, AliasTable};
use crate::body::DEFAULT_PLACEHOLDER;
use crate::bluesky::DEFAULT_SERVICE;
use crate::chunk::{Chunker, DEFAULT_MAX_CHUNK};

/// Config filename in the Herald config directory
pub const CONFIG_FILE: &str = "herald.json";

/// Database filename in the Herald data directory
pub const DATABASE_FILE: &str = "processed.db";

/// OAuth credentials for Gmail API access
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GmailCredentials {
    pub client_id: String,
    pub client_secret: String,
    /// Long-lived refresh token from a prior consent
    pub refresh_token: String,
}

impl std::fmt::Debug for GmailCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GmailCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// Google Cloud Console credential file format (installed app)
#[derive(Deserialize)]
struct GoogleCredentialFile {
    installed: Option<InstalledCredentials>,
    web: Option<InstalledCredentials>,
}

#[derive(Deserialize)]
struct InstalledCredentials {
    client_id: String,
    client_secret: String,
}

impl GmailCredentials {
    /// Parse client credentials from JSON (Google Cloud Console format)
    ///
    /// The console file carries no refresh token; it is left empty.
    pub fn from_google_json(json: &str) -> Result<Self> {
        let creds: GoogleCredentialFile =
            serde_json::from_str(json).context("Failed to parse credentials JSON")?;
        let installed = creds
            .installed
            .or(creds.web)
            .context("Credentials file missing 'installed' or 'web' section")?;

        Ok(Self {
            client_id: installed.client_id,
            client_secret: installed.client_secret,
            refresh_token: String::new(),
        })
    }

    /// Check that every field needed for a token refresh is present
    pub fn is_complete(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty() && !self.refresh_token.is_empty()
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeraldConfig {
    pub gmail: GmailCredentials,
    /// Optional Google Cloud Console credentials file for client id/secret
    pub google_credentials_file: Option<PathBuf>,
    pub aliases: Vec<AliasEntry>,
    /// Mailbox label to scan and remove on archive
    pub label: String,
    /// Maximum characters per post
    pub max_chunk: usize,
    /// Seconds to wait between posts of a thread
    pub post_delay_secs: u64,
    /// Replacement for the alias address in HTML bodies
    pub placeholder: String,
    /// Bluesky PDS entryway
    pub bluesky_service: String,
    /// Maximum messages examined per run
    pub max_messages: usize,
    /// Processed-message database; defaults to the Herald data directory
    pub database: Option<PathBuf>,
}

impl Default for HeraldConfig {
    fn default() -> Self {
        Self {
            gmail: GmailCredentials::default(),
            google_credentials_file: None,
            aliases: Vec::new(),
            label: "INBOX".to_string(),
            max_chunk: DEFAULT_MAX_CHUNK,
            post_delay_secs: 5,
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
            bluesky_service: DEFAULT_SERVICE.to_string(),
            max_messages: 100,
            database: None,
        }
    }
}

impl HeraldConfig {
    /// Load from `path`, or from the default config file when it exists
    ///
    /// With no path and no default file, returns defaults so that
    /// environment overlays alone can configure a run.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut cfg: Self = match path {
            Some(path) => config::load_json_file(path)?,
            None if config::config_exists(CONFIG_FILE) => config::load_json(CONFIG_FILE)?,
            None => Self::default(),
        };

        if let Some(file) = cfg.google_credentials_file.clone() {
            let json = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read credentials file: {}", file.display()))?;
            let google = GmailCredentials::from_google_json(&json)?;
            cfg.gmail.client_id = google.client_id;
            cfg.gmail.client_secret = google.client_secret;
        }

        Ok(cfg)
    }

    /// Parse a config from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse config JSON")
    }

    /// Overlay settings from `(name, value)` pairs such as `std::env::vars()`
    ///
    /// `GMAIL_CLIENT_ID`, `GMAIL_CLIENT_SECRET` and `GMAIL_REFRESH_TOKEN`
    /// replace the file values; `ALIAS_*` entries are appended after the file's
    /// aliases, so they win on conflicting addresses.
    pub fn apply_env<I, K, V>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let vars: Vec<(K, V)> = vars.into_iter().collect();

        for (key, value) in &vars {
            let value = value.as_ref().to_string();
            match key.as_ref() {
                "GMAIL_CLIENT_ID" => self.gmail.client_id = value,
                "GMAIL_CLIENT_SECRET" => self.gmail.client_secret = value,
                "GMAIL_REFRESH_TOKEN" => self.gmail.refresh_token = value,
                _ => {}
            }
        }

        self.aliases.extend(AliasEntry::from_vars(vars));
    }

    /// Check values that would otherwise fail mid-run
    pub fn validate(&self) -> Result<()> {
        self.chunker()?;
        if self.label.trim().is_empty() {
            anyhow::bail!("label must not be empty");
        }
        if self.max_messages == 0 {
            anyhow::bail!("max_messages must be at least 1");
        }
        Ok(())
    }

    pub fn chunker(&self) -> Result<Chunker> {
        Ok(Chunker::new(self.max_chunk)?)
    }

    pub fn post_delay(&self) -> Duration {
        Duration::from_secs(self.post_delay_secs)
    }

    pub fn alias_table(&self) -> AliasTable {
        AliasTable::from_entries(&self.aliases)
    }

    /// Database path, falling back to the Herald data directory
    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.database {
            Some(path) => Ok(path.clone()),
            None => config::data_path(DATABASE_FILE).context("Could not determine data directory"),
        }
    }

    /// A starter config with placeholder values, for `herald init`
    pub fn example() -> Self {
        Self {
            gmail: GmailCredentials {
                client_id: "your-client-id.apps.googleusercontent.com".to_string(),
                client_secret: "your-client-secret".to_string(),
                refresh_token: "your-refresh-token".to_string(),
            },
            aliases: vec![AliasEntry {
                address: "tips@example.org".to_string(),
                handle: "tips.bsky.social".to_string(),
                password: "app-password".to_string(),
            }],
            ..Self::default()
        }
    }
}
