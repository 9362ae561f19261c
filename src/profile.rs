//! Migration profile: the YAML-configured description of source/target
//! endpoints and migration policy (base spec §3, §6).

use crate::error::MigrationError;
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_chunk_size() -> usize {
    1000
}

fn default_true() -> bool {
    true
}

fn default_fallback_language() -> String {
    "mul".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WikibaseEndpoint {
    pub name: String,
    pub sparql_url: String,
    pub mediawiki_api_url: String,
    pub mediawiki_rest_url: String,
    #[serde(default)]
    pub website: Option<String>,
    pub item_prefix: String,
    #[serde(default)]
    pub quickstatement_url: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub bot_password: Option<String>,
    #[serde(default)]
    pub consumer_key: Option<String>,
    #[serde(default)]
    pub consumer_secret: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub requires_login: bool,
}

impl WikibaseEndpoint {
    /// Whether auth is configured but incomplete (base spec §7, `UserLoginRequired`).
    #[must_use]
    pub fn login_is_incomplete(&self) -> bool {
        if !self.requires_login {
            return false;
        }
        let has_bot_password = self.user.is_some() && self.bot_password.is_some();
        let has_oauth2 = self.consumer_key.is_some() && self.consumer_secret.is_some();
        let has_password = self.user.is_some() && self.password.is_some();
        !(has_bot_password || has_oauth2 || has_password)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MappingLocation {
    Source,
    Target,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingConfig {
    pub location_of_mapping: MappingLocation,
    pub item_mapping_query: String,
    pub property_mapping_query: String,
    #[serde(default)]
    pub languages: Option<Vec<String>>,
    #[serde(default)]
    pub sitelinks: Option<Vec<String>>,
    #[serde(default)]
    pub ignore_unknown_values: bool,
    #[serde(default)]
    pub ignore_no_values: bool,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl MappingConfig {
    /// Whether `lang` is permitted on the target entity; `None` means "all
    /// languages supported by the target" per base spec §6.
    #[must_use]
    pub fn language_allowed(&self, lang: &str, target_supported: &[String]) -> bool {
        match &self.languages {
            Some(list) => list.iter().any(|l| l == lang),
            None => target_supported.iter().any(|l| l == lang),
        }
    }

    #[must_use]
    pub fn sitelink_allowed(&self, site: &str) -> bool {
        self.sitelinks.as_ref().is_some_and(|list| list.iter().any(|s| s == site))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum BackReferenceType {
    Sitelink,
    Property,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackReference {
    #[serde(rename = "type")]
    pub kind: BackReferenceType,
    pub id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackReferenceConfig {
    #[serde(default)]
    pub item: Option<BackReference>,
    #[serde(default)]
    pub property: Option<BackReference>,
}

impl BackReferenceConfig {
    #[must_use]
    pub fn for_kind(&self, kind: crate::entity::EntityKind) -> Option<&BackReference> {
        match kind {
            crate::entity::EntityKind::Item => self.item.as_ref(),
            crate::entity::EntityKind::Property => self.property.as_ref(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeCastConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_fallback_language")]
    pub fallback_language: String,
}

impl Default for TypeCastConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            fallback_language: default_fallback_language(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationProfile {
    pub source: WikibaseEndpoint,
    pub target: WikibaseEndpoint,
    pub mapping: MappingConfig,
    #[serde(default)]
    pub back_reference: BackReferenceConfig,
    #[serde(default)]
    pub type_casts: TypeCastConfig,
}

impl MigrationProfile {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, MigrationError> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| MigrationError::InvalidProfile(format!("{}: {e}", path.as_ref().display())))?;
        Self::parse(&text)
    }

    pub fn parse(yaml: &str) -> Result<Self, MigrationError> {
        serde_yaml::from_str(yaml).map_err(|e| MigrationError::InvalidProfile(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), MigrationError> {
        if self.source.login_is_incomplete() {
            return Err(MigrationError::LoginRequired(self.source.name.clone()));
        }
        if self.target.login_is_incomplete() {
            return Err(MigrationError::LoginRequired(self.target.name.clone()));
        }
        if !self.mapping.item_mapping_query.contains("$values")
            || !self.mapping.property_mapping_query.contains("$values")
        {
            return Err(MigrationError::InvalidProfile(
                "mapping queries must contain a $values placeholder".to_string(),
            ));
        }
        Ok(())
    }

    /// The endpoint that hosts the mapping assertions (base spec §4.2).
    #[must_use]
    pub fn mapping_host(&self) -> &WikibaseEndpoint {
        match self.mapping.location_of_mapping {
            MappingLocation::Source => &self.source,
            MappingLocation::Target => &self.target,
        }
    }
}
