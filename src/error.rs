//! Error taxonomy for infrastructure-level failures (base spec §7).
//!
//! Per-entity failures (missing mapping, type mismatch, write failure) are
//! not modeled here — they are recorded as values on `TranslationResult`.
//! These variants are for failures that abort before any entity-level work
//! can be recovered from.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("unknown entity type for id '{0}'")]
    UnknownEntityType(String),

    #[error("login required for wikibase '{0}' but credentials are incomplete")]
    LoginRequired(String),

    #[error("invalid migration profile: {0}")]
    InvalidProfile(String),

    #[error("entity kind {0} does not support sitelinks, back-reference failed")]
    SitelinksUnsupported(String),

    #[error("lexeme translation is not supported")]
    LexemeUnsupported,
}
