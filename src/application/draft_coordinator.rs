//! Draft coordination: the compose state machine and the chat flow.
//!
//! A compose request runs RESOLVE_FINGERPRINT, CACHE_LOOKUP, then on a miss
//! GENERATE, PATCH_ATTEMPT, BLOCK_DIFF_ATTEMPT when nothing matched,
//! WRITE_CACHE, RESPOND. The only hard failure is a missing contract;
//! every other problem degrades toward the best artifact still available:
//! package patch, then in-memory markup patch, then the original document
//! with a note in the summary.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    normalize_edit_set, suggestion_ids, CacheStatus, ChatMessage, ChatResponse, ComposeResponse,
    ContractDocument, DraftSnapshot, Edit, HtmlSource, MatcherConfig, PatchGap, RawEdit,
    RawSuggestion,
};
use crate::domain::ports::{DocumentStore, PackageStorage, SnapshotRepository};
use crate::services::block_diff;
use crate::services::clause_matcher::ClauseMatcher;
use crate::services::fingerprint::draft_key;
use crate::services::markup::StructuredDoc;
use crate::services::orchestrator::{Orchestrator, RewriteOutcome};
use crate::services::package_bundle;
use crate::services::structural_patcher::StructuralPatcher;

/// Snapshot metadata keys.
const META_UNMATCHED: &str = "unmatched_edits";
const META_HTML_SOURCE: &str = "html_source";

/// Coordinates document stores, the snapshot cache, package storage, and
/// the generative orchestrator into the two boundary operations.
pub struct DraftCoordinator {
    documents: Arc<dyn DocumentStore>,
    snapshots: Arc<dyn SnapshotRepository>,
    packages: Arc<dyn PackageStorage>,
    orchestrator: Orchestrator,
    patcher: StructuralPatcher,
}

/// Internal result of a patch attempt, before response assembly.
struct PatchedDraft {
    html: Option<String>,
    plain_text: String,
    applied_changes: Vec<String>,
    unmatched: Vec<PatchGap>,
    matched_count: u32,
    html_source: HtmlSource,
    asset_ref: Option<String>,
}

impl DraftCoordinator {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        snapshots: Arc<dyn SnapshotRepository>,
        packages: Arc<dyn PackageStorage>,
        orchestrator: Orchestrator,
        matcher: &MatcherConfig,
    ) -> Self {
        Self {
            documents,
            snapshots,
            packages,
            orchestrator,
            patcher: StructuralPatcher::new(ClauseMatcher::from_config(matcher)),
        }
    }

    /// Produce a redlined draft for a contract from suggestion and edit
    /// payloads.
    pub async fn compose(
        &self,
        contract_id: &str,
        suggestions: &[RawSuggestion],
        agent_edits: &[RawEdit],
    ) -> DomainResult<ComposeResponse> {
        let document = self
            .documents
            .get(contract_id)
            .await?
            .ok_or_else(|| DomainError::ContractNotFound(contract_id.to_string()))?;

        let edits = normalize_edit_set(suggestions, agent_edits);
        let ids = suggestion_ids(suggestions);
        let key = draft_key(contract_id, &document.version_token(), &ids, &edits);
        debug!(contract_id, draft_key = %key, edits = edits.len(), "fingerprint resolved");

        match self.snapshots.get(contract_id, &key).await {
            Ok(Some(snapshot)) => {
                // A cached no-op must not shadow a request that carries
                // real edits.
                let bypass = snapshot.matched_count == 0 && !edits.is_empty();
                if bypass {
                    info!(contract_id, draft_key = %key, "bypassing empty-match snapshot");
                } else {
                    debug!(contract_id, draft_key = %key, "cache hit");
                    return Ok(cached_response(&document, snapshot, &key));
                }
            }
            Ok(None) => {}
            Err(err) => {
                warn!(contract_id, error = %err, "snapshot lookup failed, treating as miss");
            }
        }

        let rewrite = self.orchestrator.rewrite(&document, &edits).await;
        if rewrite.is_heuristic() {
            // Every backend failed: answer with the unchanged contract and
            // do not let the degraded result occupy the cache slot.
            return Ok(heuristic_response(&document, rewrite, &key));
        }

        let draft = self.patch_document(&document, &edits, &rewrite).await;

        let mut metadata: HashMap<String, serde_json::Value> = HashMap::new();
        if let Ok(gaps) = serde_json::to_value(&draft.unmatched) {
            metadata.insert(META_UNMATCHED.to_string(), gaps);
        }
        if let Ok(source) = serde_json::to_value(draft.html_source) {
            metadata.insert(META_HTML_SOURCE.to_string(), source);
        }

        let snapshot = DraftSnapshot {
            contract_id: contract_id.to_string(),
            draft_key: key.clone(),
            html: draft.html.clone(),
            plain_text: draft.plain_text.clone(),
            summary: rewrite.summary.clone(),
            applied_changes: draft.applied_changes.clone(),
            asset_ref: draft.asset_ref.clone(),
            provider: rewrite.provider.clone(),
            model: rewrite.model.clone(),
            matched_count: draft.matched_count,
            unmatched_count: draft.unmatched.len() as u32,
            metadata,
            created_at: Utc::now(),
        };
        if let Err(err) = self.snapshots.upsert(&snapshot).await {
            warn!(contract_id, error = %err, "snapshot write failed, responding anyway");
        }

        Ok(ComposeResponse {
            updated_contract: draft.plain_text,
            updated_html: draft.html,
            summary: rewrite.summary,
            applied_changes: draft.applied_changes,
            provider: rewrite.provider,
            model: rewrite.model,
            original_contract: document.plain_text,
            original_html: document.html,
            draft_id: key,
            asset_ref: draft.asset_ref,
            html_source: draft.html_source,
            cache_status: CacheStatus::Miss,
            unmatched_edits: draft.unmatched,
        })
    }

    /// Answer a chat turn about a contract.
    pub async fn chat(
        &self,
        contract_id: &str,
        messages: &[ChatMessage],
        context: Option<&str>,
    ) -> DomainResult<ChatResponse> {
        let document = self
            .documents
            .get(contract_id)
            .await?
            .ok_or_else(|| DomainError::ContractNotFound(contract_id.to_string()))?;
        Ok(self.orchestrator.chat(&document, messages, context).await)
    }

    /// Apply the edit set structurally, with the block-diff fallback and
    /// the package round-trip.
    async fn patch_document(
        &self,
        document: &ContractDocument,
        edits: &[Edit],
        rewrite: &RewriteOutcome,
    ) -> PatchedDraft {
        let package_bytes = match &document.package_ref {
            Some(package_ref) => match self.packages.download(package_ref).await {
                Ok(bytes) => Some(bytes),
                Err(err) => {
                    warn!(package_ref, error = %err, "package download failed, using in-memory markup");
                    None
                }
            },
            None => None,
        };

        let package_html = package_bytes
            .as_deref()
            .and_then(|bytes| match package_bundle::read_document_html(bytes) {
                Ok(html) => Some(html),
                Err(err) => {
                    warn!(error = %err, "package markup unreadable, using in-memory markup");
                    None
                }
            });

        let markup = package_html
            .or_else(|| document.html.clone())
            .unwrap_or_else(|| StructuredDoc::from_plain_text(&document.plain_text).serialize());

        let mut doc = StructuredDoc::parse(&markup);
        let patch = self.patcher.apply(&mut doc, edits);
        let matched_count = patch.matched_count();
        let mut applied_changes = patch.applied_changes.clone();
        let mut changed = matched_count > 0;

        if !changed && !rewrite.updated_contract.trim().is_empty() {
            debug!("no edits matched, attempting block-diff fallback");
            let outcome = block_diff::apply_rewrite(&mut doc, &rewrite.updated_contract);
            applied_changes.extend(outcome.applied_changes.clone());
            changed = outcome.changed();
        }

        if changed {
            let html = doc.serialize();
            let asset_ref = match package_bytes {
                Some(bytes) => self.upload_patched_package(document, &bytes, &html).await,
                None => None,
            };
            return PatchedDraft {
                plain_text: doc.to_plain_text(),
                html: Some(html),
                applied_changes,
                unmatched: patch.unmatched,
                matched_count,
                html_source: HtmlSource::Patched,
                asset_ref,
            };
        }

        if rewrite.updated_html.is_some() {
            // Nothing landed structurally; serve the generative rewrite
            // as-is rather than nothing.
            return PatchedDraft {
                html: rewrite.updated_html.clone(),
                plain_text: rewrite.updated_contract.clone(),
                applied_changes: rewrite.applied_changes.clone(),
                unmatched: patch.unmatched,
                matched_count: 0,
                html_source: HtmlSource::Llm,
                asset_ref: None,
            };
        }

        PatchedDraft {
            html: document.html.clone(),
            plain_text: document.plain_text.clone(),
            applied_changes: vec!["No edits could be applied; the original document is returned."
                .to_string()],
            unmatched: patch.unmatched,
            matched_count: 0,
            html_source: HtmlSource::Original,
            asset_ref: None,
        }
    }

    async fn upload_patched_package(
        &self,
        document: &ContractDocument,
        source_bytes: &[u8],
        html: &str,
    ) -> Option<String> {
        let patched = match package_bundle::write_document_html(source_bytes, html) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(error = %err, "package rebuild failed, skipping upload");
                return None;
            }
        };
        match self.packages.upload(&patched, &document.contract_id).await {
            Ok(asset_ref) => Some(asset_ref),
            Err(err) => {
                warn!(error = %err, "package upload failed, draft served without asset");
                None
            }
        }
    }
}

fn unmatched_from_metadata(snapshot: &DraftSnapshot) -> Vec<PatchGap> {
    snapshot
        .metadata
        .get(META_UNMATCHED)
        .and_then(|value| serde_json::from_value(value.clone()).ok())
        .unwrap_or_default()
}

fn cached_response(
    document: &ContractDocument,
    snapshot: DraftSnapshot,
    key: &str,
) -> ComposeResponse {
    let unmatched = unmatched_from_metadata(&snapshot);
    ComposeResponse {
        updated_contract: snapshot.plain_text,
        updated_html: snapshot.html,
        summary: snapshot.summary,
        applied_changes: snapshot.applied_changes,
        provider: snapshot.provider,
        model: snapshot.model,
        original_contract: document.plain_text.clone(),
        original_html: document.html.clone(),
        draft_id: key.to_string(),
        asset_ref: snapshot.asset_ref,
        html_source: HtmlSource::Cached,
        cache_status: CacheStatus::Hit,
        unmatched_edits: unmatched,
    }
}

fn heuristic_response(
    document: &ContractDocument,
    rewrite: RewriteOutcome,
    key: &str,
) -> ComposeResponse {
    ComposeResponse {
        updated_contract: document.plain_text.clone(),
        updated_html: document.html.clone(),
        summary: rewrite.summary,
        applied_changes: Vec::new(),
        provider: rewrite.provider,
        model: rewrite.model,
        original_contract: document.plain_text.clone(),
        original_html: document.html.clone(),
        draft_id: key.to_string(),
        asset_ref: None,
        html_source: HtmlSource::Original,
        cache_status: CacheStatus::Miss,
        unmatched_edits: Vec::new(),
    }
}
