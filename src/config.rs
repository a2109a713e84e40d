use std::fs;
use std::path::{Path, PathBuf};

use scraper::Selector;
use serde::Deserialize;
use tracing::warn;
use url::Url;

use crate::utils::error::{AppError, Result};

fn default_smtp_host() -> String {
    "smtp.gmail.com".to_string()
}

fn default_smtp_port() -> u16 {
    465
}

/// Sender-side mail credentials, loaded once at startup. The application
/// password may be given inline or through a separate password file.
#[derive(Debug, Clone, Deserialize)]
pub struct SenderConfig {
    pub address: String,
    pub app_password: Option<String>,
    pub password_file: Option<PathBuf>,
    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
}

impl SenderConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("cannot read sender file {}: {}", path.display(), e))
        })?;
        let config: SenderConfig = serde_json::from_str(&raw).map_err(|e| {
            AppError::Config(format!("malformed sender file {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.address.contains('@') {
            return Err(AppError::Config(format!(
                "sender address '{}' is not an email address",
                self.address
            )));
        }
        if self.app_password.is_none() && self.password_file.is_none() {
            return Err(AppError::Config(
                "sender config needs either app_password or password_file".to_string(),
            ));
        }
        if self.smtp_host.is_empty() {
            return Err(AppError::Config("smtp_host must not be empty".to_string()));
        }
        if self.smtp_port == 0 {
            return Err(AppError::Config(
                "smtp_port must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Inline password wins over the password file.
    pub fn resolve_password(&self) -> Result<String> {
        if let Some(password) = &self.app_password {
            return Ok(password.clone());
        }
        let path = self.password_file.as_ref().ok_or_else(|| {
            AppError::Config("sender config needs either app_password or password_file".to_string())
        })?;
        let raw = fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!(
                "cannot read password file {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(raw.trim().to_string())
    }
}

/// One tracked product: where to fetch it, how to find the price, and what
/// to call it in the summary. The URL doubles as the stable item key.
/// `compare_selector` optionally points at the un-discounted compare-at
/// price some shops show while an item is on sale.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ItemConfig {
    pub name: String,
    pub url: String,
    pub selector: String,
    #[serde(default)]
    pub compare_selector: Option<String>,
}

impl ItemConfig {
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(AppError::Config(format!(
                "item for {} has an empty display name",
                self.url
            )));
        }
        if Url::parse(&self.url).is_err() {
            return Err(AppError::Config(format!("invalid item URL: {}", self.url)));
        }
        if Selector::parse(&self.selector).is_err() {
            return Err(AppError::Config(format!(
                "invalid CSS selector '{}' for {}",
                self.selector, self.url
            )));
        }
        if let Some(compare_selector) = &self.compare_selector {
            if Selector::parse(compare_selector).is_err() {
                return Err(AppError::Config(format!(
                    "invalid compare-at CSS selector '{}' for {}",
                    compare_selector, self.url
                )));
            }
        }
        Ok(())
    }
}

/// One recipient and the items they are tracking.
#[derive(Debug, Clone, Deserialize)]
pub struct RecipientConfig {
    pub person: String,
    pub email: String,
    pub items: Vec<ItemConfig>,
}

impl RecipientConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!(
                "cannot read recipient file {}: {}",
                path.display(),
                e
            ))
        })?;
        let config: RecipientConfig = serde_json::from_str(&raw).map_err(|e| {
            AppError::Config(format!(
                "malformed recipient file {}: {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.email.contains('@') {
            return Err(AppError::Config(format!(
                "recipient address '{}' is not an email address",
                self.email
            )));
        }
        for item in &self.items {
            item.validate()?;
        }
        Ok(())
    }
}

/// Union of all items across the recipient files, deduplicated by URL.
/// Later files do not override earlier definitions for the same URL; a
/// diverging later definition is logged and ignored.
pub fn collect_items(recipients: &[RecipientConfig]) -> Vec<ItemConfig> {
    let mut items: Vec<ItemConfig> = Vec::new();
    for recipient in recipients {
        for item in &recipient.items {
            match items.iter().find(|known| known.url == item.url) {
                Some(known) => {
                    if known != item {
                        warn!(
                            url = %item.url,
                            person = %recipient.person,
                            "conflicting definitions for tracked URL, keeping the first"
                        );
                    }
                }
                None => items.push(item.clone()),
            }
        }
    }
    items
}
