//! AWS credential discovery
//!
//! Handles the two halves of finding usable credentials: enumerating named
//! profiles from ~/.aws/config and ~/.aws/credentials (excluding any whose
//! recorded session expiry has passed), and checking a candidate
//! configuration by asking STS who it belongs to.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// How a stored profile obtains its credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProfileKind {
    /// SSO/IAM Identity Center session.
    Sso,
    /// Static keys (or anything else resolvable from the ini files).
    Static,
}

impl ProfileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileKind::Sso => "SSO session",
            ProfileKind::Static => "static keys",
        }
    }
}

/// A named profile from the shared AWS config files.
#[derive(Debug, Clone, Serialize)]
pub struct CredentialProfile {
    pub name: String,
    pub kind: ProfileKind,
    /// Recorded session expiry, if the profile has one.
    pub expiry: Option<DateTime<Utc>>,
}

impl CredentialProfile {
    /// Whether the profile is still worth offering on the given day.
    ///
    /// The comparison is by calendar day, not by precise timestamp: a
    /// profile expiring later today is still offered.
    pub fn is_usable_on(&self, today: NaiveDate) -> bool {
        self.expiry.map_or(true, |expiry| expiry.date_naive() >= today)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProfileStoreError {
    #[error("could not read profiles from {path}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Profiles parsed from ~/.aws/config and ~/.aws/credentials.
#[derive(Debug, Default)]
pub struct ProfileStore {
    profiles: BTreeMap<String, CredentialProfile>,
}

impl ProfileStore {
    /// Load profiles from the shared AWS config files. Missing files are
    /// fine; unreadable ones are not.
    pub fn load() -> Result<Self, ProfileStoreError> {
        let aws_dir = dirs::home_dir()
            .map(|home| home.join(".aws"))
            .unwrap_or_else(|| PathBuf::from(".aws"));
        Self::from_files(&aws_dir.join("config"), &aws_dir.join("credentials"))
    }

    /// Load profiles from explicit file paths.
    pub fn from_files(config: &Path, credentials: &Path) -> Result<Self, ProfileStoreError> {
        let mut raw: BTreeMap<String, RawProfile> = BTreeMap::new();
        if credentials.exists() {
            parse_ini(credentials, false, &mut raw)?;
        }
        if config.exists() {
            parse_ini(config, true, &mut raw)?;
        }

        let profiles = raw
            .into_iter()
            .map(|(name, raw)| {
                let kind = if raw.has_sso {
                    ProfileKind::Sso
                } else {
                    ProfileKind::Static
                };
                let expiry = raw.expiry_raw.as_deref().and_then(parse_expiry);
                (
                    name.clone(),
                    CredentialProfile { name, kind, expiry },
                )
            })
            .collect();

        Ok(Self { profiles })
    }

    /// All profiles, sorted by name.
    pub fn profiles(&self) -> impl Iterator<Item = &CredentialProfile> {
        self.profiles.values()
    }

    /// Profiles still worth offering today, in name order. Expired profiles
    /// are announced as they are skipped.
    pub fn selectable(&self, today: NaiveDate) -> Vec<CredentialProfile> {
        self.profiles
            .values()
            .filter(|profile| {
                if profile.is_usable_on(today) {
                    true
                } else {
                    println!("{} has expired", profile.name);
                    false
                }
            })
            .cloned()
            .collect()
    }
}

#[derive(Debug, Default)]
struct RawProfile {
    has_sso: bool,
    expiry_raw: Option<String>,
}

/// Parse one ini-style file into the raw profile map. The config file
/// prefixes section names with "profile "; the credentials file does not.
fn parse_ini(
    path: &Path,
    strip_profile_prefix: bool,
    raw: &mut BTreeMap<String, RawProfile>,
) -> Result<(), ProfileStoreError> {
    let content = std::fs::read_to_string(path).map_err(|source| ProfileStoreError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;

    let mut current: Option<String> = None;
    for line in content.lines() {
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if line.starts_with('[') && line.ends_with(']') {
            let section = line[1..line.len() - 1].trim();
            current = if section == "default" {
                Some("default".to_string())
            } else if strip_profile_prefix {
                section.strip_prefix("profile ").map(|name| name.trim().to_string())
            } else if section.starts_with("sso-session ") {
                None
            } else {
                Some(section.to_string())
            };

            if let Some(name) = &current {
                raw.entry(name.clone()).or_default();
            }
            continue;
        }

        if let Some((key, value)) = line.split_once('=') {
            let key = key.trim();
            let value = value.trim();
            if let Some(name) = &current {
                if let Some(profile) = raw.get_mut(name) {
                    match key {
                        "sso_account_id" | "sso_session" | "sso_start_url" => {
                            profile.has_sso = true;
                        }
                        "aws_expiration" | "aws_expiry_token" => {
                            profile.expiry_raw = Some(value.to_string());
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    Ok(())
}

fn parse_expiry(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Some(parsed.and_utc());
    }
    tracing::debug!(value, "unparseable profile expiry, treating as unexpiring");
    None
}

/// Source of candidate credential configurations for the wizard.
///
/// The interactive flow only ever needs three operations; keeping them
/// behind a trait lets the wizard run headless against a scripted source.
#[async_trait]
pub trait CredentialSource {
    /// Load the ambient default credential chain and return it together
    /// with the account id it authenticates as.
    async fn ambient_identity(&self) -> Result<(SdkConfig, String)>;

    /// Load a named profile and return it together with its account id.
    async fn profile_identity(&self, profile: &str) -> Result<(SdkConfig, String)>;

    /// Named profiles currently worth offering.
    fn stored_profiles(&self) -> Result<Vec<CredentialProfile>>;
}

/// The real thing: shared config files plus STS.
pub struct AwsCredentialSource {
    region: Option<String>,
}

impl AwsCredentialSource {
    pub fn new(region: Option<String>) -> Self {
        Self { region }
    }

    fn loader(&self) -> aws_config::ConfigLoader {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &self.region {
            loader = loader.region(Region::new(region.clone()));
        }
        loader
    }
}

#[async_trait]
impl CredentialSource for AwsCredentialSource {
    async fn ambient_identity(&self) -> Result<(SdkConfig, String)> {
        let config = self.loader().load().await;
        let account = caller_account(&config).await?;
        Ok((config, account))
    }

    async fn profile_identity(&self, profile: &str) -> Result<(SdkConfig, String)> {
        let config = self.loader().profile_name(profile).load().await;
        let account = caller_account(&config).await?;
        Ok((config, account))
    }

    fn stored_profiles(&self) -> Result<Vec<CredentialProfile>> {
        let store = ProfileStore::load().context("could not get profiles from the shared config files")?;
        Ok(store.selectable(Local::now().date_naive()))
    }
}

/// Account id of whoever the configuration authenticates as.
async fn caller_account(config: &SdkConfig) -> Result<String> {
    let sts = aws_sdk_sts::Client::new(config);
    let identity = sts
        .get_caller_identity()
        .send()
        .await
        .context("STS GetCallerIdentity failed")?;
    identity
        .account()
        .map(str::to_string)
        .ok_or_else(|| anyhow!("STS GetCallerIdentity returned no account id"))
}
