//! Redliner - AI-assisted contract redlining engine
//!
//! Redliner takes a set of proposed textual edits to a contract and
//! produces a revised document that preserves the original's structure,
//! caching results so identical edit requests never re-invoke the
//! generative backend.
//!
//! # Architecture
//!
//! This crate follows Clean Architecture / Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Models, ports, and the error taxonomy
//! - **Services Layer** (`services`): The engine itself: fingerprinting,
//!   clause matching, structural patching, block diffing, orchestration
//! - **Application Layer** (`application`): The compose/chat coordinator
//! - **Infrastructure Layer** (`infrastructure`): Providers, SQLite,
//!   package storage, configuration
//! - **CLI Layer** (`cli`): Command-line interface

pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use application::DraftCoordinator;
pub use domain::errors::{DomainError, DomainResult};
pub use domain::models::{
    CacheStatus, ChatMessage, ChatResponse, ComposeResponse, Config, ContractDocument,
    DraftSnapshot, Edit, HtmlSource, PatchGap, RawEdit, RawSuggestion,
};
pub use domain::ports::{
    DocumentStore, GenerativeProvider, PackageStorage, ProviderError, SnapshotRepository,
};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{ClauseMatcher, Orchestrator, StructuralPatcher, StructuredDoc};
