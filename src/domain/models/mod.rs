//! Domain models for the redlining engine.

pub mod config;
pub mod document;
pub mod draft;
pub mod edit;

pub use config::{
    Config, DatabaseConfig, GuardrailConfig, LoggingConfig, MatcherConfig, ProviderConfig,
    ProviderKind, ProvidersConfig, StorageConfig,
};
pub use document::ContractDocument;
pub use draft::{
    CacheStatus, ChatMessage, ChatResponse, ComposeResponse, DraftSnapshot, HtmlSource, PatchGap,
    TokenUsage,
};
pub use edit::{
    normalize_edit, normalize_edit_set, suggestion_ids, ChangeType, Edit, RawEdit, RawSuggestion,
};
