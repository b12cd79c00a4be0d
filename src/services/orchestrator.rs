//! Generative backend orchestration.
//!
//! Owns everything between "we need a rewrite or a chat reply" and "we have
//! normalized text": prompt construction, the primary/secondary routing
//! decision, timeouts, strict-schema output parsing with graceful
//! degradation, and the pre-call guardrail for unanswerable chat messages.
//!
//! Fallback policy is deliberately narrow: one retry on the secondary
//! provider, only for rate-limit and quota failures, only when configured
//! and allowed. Every other provider error degrades to the heuristic
//! response instead of failing the request.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::domain::models::{
    normalize_edit, ChangeType, ChatMessage, ChatResponse, ContractDocument, Edit, GuardrailConfig,
    ProvidersConfig, RawEdit,
};
use crate::domain::ports::{
    CompletionRequest, GenerativeProvider, ProviderCompletion, ProviderError,
};
use crate::services::markup::{split_paragraphs, strip_tags, StructuredDoc};

/// Provider id reported when every configured backend failed and the
/// orchestrator answered from the document alone.
pub const HEURISTIC_PROVIDER: &str = "heuristic-fallback";

const REWRITE_MAX_TOKENS: u32 = 8192;
const CHAT_MAX_TOKENS: u32 = 2048;

/// Terms that mark a chat message as answerable even when it is short.
const CLAUSE_KEYWORDS: &[&str] = &[
    "clause",
    "section",
    "paragraph",
    "term",
    "confidential",
    "indemn",
    "liability",
    "terminat",
    "payment",
    "warrant",
    "governing",
    "notice",
    "assign",
    "dispute",
    "arbitrat",
    "renew",
    "breach",
    "damages",
];

/// Normalized result of a full-document rewrite call.
#[derive(Debug, Clone)]
pub struct RewriteOutcome {
    pub updated_html: Option<String>,
    pub updated_contract: String,
    pub summary: Option<String>,
    pub applied_changes: Vec<String>,
    pub provider: String,
    pub model: String,
}

impl RewriteOutcome {
    /// True when no provider answered and the outcome is the unchanged
    /// document with an explanation.
    pub fn is_heuristic(&self) -> bool {
        self.provider == HEURISTIC_PROVIDER
    }
}

/// Strict rewrite schema, with aliases for the shapes backends actually emit.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRewrite {
    #[serde(default, alias = "html")]
    updated_html: Option<String>,

    #[serde(default, alias = "updatedText", alias = "contract")]
    updated_contract: Option<String>,

    #[serde(default)]
    summary: Option<String>,

    #[serde(default, alias = "changes")]
    applied_changes: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawChatReply {
    #[serde(default, alias = "reply", alias = "content")]
    message: Option<String>,

    #[serde(default, alias = "edits", alias = "suggestions")]
    proposed_edits: Vec<RawEdit>,
}

/// Routes rewrite and chat requests across the configured providers.
pub struct Orchestrator {
    primary: Arc<dyn GenerativeProvider>,
    secondary: Option<Arc<dyn GenerativeProvider>>,
    allow_fallback: bool,
    rewrite_timeout: Duration,
    chat_timeout: Duration,
    guardrail: GuardrailConfig,
}

impl Orchestrator {
    pub fn new(
        primary: Arc<dyn GenerativeProvider>,
        secondary: Option<Arc<dyn GenerativeProvider>>,
        providers: &ProvidersConfig,
        guardrail: GuardrailConfig,
    ) -> Self {
        Self {
            primary,
            secondary,
            allow_fallback: providers.allow_fallback,
            rewrite_timeout: Duration::from_secs(providers.rewrite_timeout_secs),
            chat_timeout: Duration::from_secs(providers.chat_timeout_secs),
            guardrail,
        }
    }

    /// Ask for a full-document rewrite realizing the edit set.
    ///
    /// Never fails: total provider failure yields the heuristic outcome
    /// with the contract unchanged.
    pub async fn rewrite(&self, document: &ContractDocument, edits: &[Edit]) -> RewriteOutcome {
        let request = build_rewrite_request(document, edits);
        match self.complete_with_fallback(request, self.rewrite_timeout).await {
            Ok((completion, provider, model)) => {
                normalize_rewrite(&completion.content, document, provider, model)
            }
            Err(err) => {
                warn!(provider = err.provider(), error = %err, "rewrite failed on every provider");
                RewriteOutcome {
                    updated_html: document.html.clone(),
                    updated_contract: document.plain_text.clone(),
                    summary: Some(
                        "The automated rewrite service is currently unavailable. \
                         The contract is returned unchanged; the proposed edits were not applied."
                            .to_string(),
                    ),
                    applied_changes: Vec::new(),
                    provider: HEURISTIC_PROVIDER.to_string(),
                    model: "none".to_string(),
                }
            }
        }
    }

    /// Answer a chat turn about the contract.
    ///
    /// A short, digit-free, keyword-free message is intercepted before any
    /// provider call and answered with a clarification.
    pub async fn chat(
        &self,
        document: &ContractDocument,
        messages: &[ChatMessage],
        context: Option<&str>,
    ) -> ChatResponse {
        let latest = messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.as_str())
            .unwrap_or_default();

        if self.guardrail_triggers(latest, context) {
            debug!(len = latest.trim().len(), "guardrail intercepted chat message");
            return self.clarification_response(document);
        }

        let request = build_chat_request(document, messages, context);
        match self.complete_with_fallback(request, self.chat_timeout).await {
            Ok((completion, provider, model)) => {
                let (content, proposed) = normalize_chat_reply(&completion.content);
                ChatResponse {
                    message: ChatMessage::assistant(content),
                    proposed_edits: proposed,
                    provider,
                    model,
                    usage: completion.usage,
                }
            }
            Err(err) => {
                warn!(provider = err.provider(), error = %err, "chat failed on every provider");
                ChatResponse {
                    message: ChatMessage::assistant(
                        "The review assistant is currently unavailable. Please try again shortly.",
                    ),
                    proposed_edits: Vec::new(),
                    provider: HEURISTIC_PROVIDER.to_string(),
                    model: "none".to_string(),
                    usage: None,
                }
            }
        }
    }

    /// Primary call, then at most one secondary attempt for rate-limit or
    /// quota failures.
    async fn complete_with_fallback(
        &self,
        request: CompletionRequest,
        timeout: Duration,
    ) -> Result<(ProviderCompletion, String, String), ProviderError> {
        match call_provider(self.primary.as_ref(), request.clone(), timeout).await {
            Ok(completion) => Ok((
                completion,
                self.primary.provider_id().to_string(),
                self.primary.model().to_string(),
            )),
            Err(err) if err.is_fallback_eligible() && self.allow_fallback => {
                let Some(secondary) = &self.secondary else {
                    return Err(err);
                };
                warn!(
                    primary = self.primary.provider_id(),
                    secondary = secondary.provider_id(),
                    error = %err,
                    "primary provider throttled, retrying on secondary"
                );
                let completion = call_provider(secondary.as_ref(), request, timeout).await?;
                Ok((
                    completion,
                    secondary.provider_id().to_string(),
                    secondary.model().to_string(),
                ))
            }
            Err(err) => Err(err),
        }
    }

    fn guardrail_triggers(&self, message: &str, context: Option<&str>) -> bool {
        let trimmed = message.trim();
        if trimmed.chars().count() >= self.guardrail.min_message_len {
            return false;
        }
        if trimmed.chars().any(|c| c.is_ascii_digit()) {
            return false;
        }
        let lowered = trimmed.to_lowercase();
        if CLAUSE_KEYWORDS.iter().any(|kw| lowered.contains(kw)) {
            return false;
        }
        if let Some(ctx) = context {
            let has_context_term = ctx
                .split_whitespace()
                .filter(|w| w.len() >= 5)
                .any(|w| lowered.contains(&w.to_lowercase()));
            if has_context_term {
                return false;
            }
        }
        true
    }

    fn clarification_response(&self, document: &ContractDocument) -> ChatResponse {
        let suggestions = contextual_suggestions(document, self.guardrail.max_suggestions);
        let mut content = String::from(
            "Could you say more about what you would like to change? \
             For example, name a clause, quote the text to revise, or describe the outcome you want.",
        );
        if !suggestions.is_empty() {
            content.push_str("\n\nSome places to start:");
            for suggestion in &suggestions {
                content.push_str("\n- ");
                content.push_str(suggestion);
            }
        }
        ChatResponse {
            message: ChatMessage::assistant(content),
            proposed_edits: Vec::new(),
            provider: HEURISTIC_PROVIDER.to_string(),
            model: "none".to_string(),
            usage: None,
        }
    }
}

async fn call_provider(
    provider: &dyn GenerativeProvider,
    request: CompletionRequest,
    timeout: Duration,
) -> Result<ProviderCompletion, ProviderError> {
    match tokio::time::timeout(timeout, provider.complete(request)).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::Timeout {
            provider: provider.provider_id().to_string(),
            seconds: timeout.as_secs(),
        }),
    }
}

fn build_rewrite_request(document: &ContractDocument, edits: &[Edit]) -> CompletionRequest {
    let markup = document
        .html
        .clone()
        .unwrap_or_else(|| StructuredDoc::from_plain_text(&document.plain_text).serialize());

    let mut directives = String::new();
    for (index, edit) in edits.iter().enumerate() {
        directives.push_str(&format!("{}. [{}]", index + 1, edit.change_type.as_str()));
        if let Some(reference) = &edit.clause_reference {
            directives.push_str(&format!(" ({reference})"));
        }
        if let Some(original) = &edit.original_text {
            directives.push_str(&format!(" Replace: \"{original}\""));
        }
        if edit.change_type != ChangeType::Remove {
            directives.push_str(&format!(" With: \"{}\"", edit.suggested_text));
        }
        if let Some(rationale) = &edit.rationale {
            directives.push_str(&format!(" Rationale: {rationale}"));
        }
        directives.push('\n');
    }

    let system = "You are a contract redlining assistant. Apply the numbered directives to the \
                  contract, preserving its structure, headings, and numbering. Respond with a \
                  single JSON object and nothing else: {\"updatedHtml\": string, \
                  \"updatedContract\": string, \"summary\": string, \"appliedChanges\": \
                  [string]}. updatedContract is the full revised plain text; appliedChanges is \
                  one short sentence per directive actually applied.";

    let user = format!(
        "Contract markup:\n{markup}\n\nPlain-text reference:\n{}\n\nDirectives:\n{directives}",
        document.plain_text
    );

    CompletionRequest::single_turn(system, user, REWRITE_MAX_TOKENS)
}

fn build_chat_request(
    document: &ContractDocument,
    messages: &[ChatMessage],
    context: Option<&str>,
) -> CompletionRequest {
    let mut system = format!(
        "You are a contract review assistant discussing the following contract.\n\n\
         Contract text:\n{}\n\n\
         Respond with a single JSON object and nothing else: {{\"message\": string, \
         \"proposedEdits\": [{{\"id\": string, \"clauseReference\": string, \"changeType\": \
         \"modify\"|\"insert\"|\"remove\", \"originalText\": string, \"suggestedText\": string, \
         \"rationale\": string}}]}}. Quote originalText verbatim from the contract. Leave \
         proposedEdits empty when the user is only asking a question.",
        document.plain_text
    );
    if let Some(ctx) = context {
        system.push_str("\n\nAdditional context:\n");
        system.push_str(ctx);
    }

    CompletionRequest {
        system: Some(system),
        messages: messages.to_vec(),
        max_tokens: CHAT_MAX_TOKENS,
        temperature: Some(0.2),
    }
}

/// Parse a strict-JSON rewrite reply, tolerating code fences and degrading
/// to plain text when the schema does not hold.
fn normalize_rewrite(
    content: &str,
    document: &ContractDocument,
    provider: String,
    model: String,
) -> RewriteOutcome {
    if let Some(raw) = extract_json::<RawRewrite>(content) {
        let updated_contract = raw
            .updated_contract
            .filter(|t| !t.trim().is_empty())
            .or_else(|| raw.updated_html.as_deref().map(strip_tags))
            .unwrap_or_else(|| document.plain_text.clone());
        return RewriteOutcome {
            updated_html: raw.updated_html,
            updated_contract,
            summary: raw.summary,
            applied_changes: raw.applied_changes,
            provider,
            model,
        };
    }

    debug!("rewrite reply was not valid JSON, degrading to text");
    let body = strip_code_fence(content);
    if body.contains('<') && body.contains('>') {
        RewriteOutcome {
            updated_contract: strip_tags(body),
            updated_html: Some(body.to_string()),
            summary: None,
            applied_changes: Vec::new(),
            provider,
            model,
        }
    } else {
        RewriteOutcome {
            updated_html: None,
            updated_contract: body.to_string(),
            summary: None,
            applied_changes: Vec::new(),
            provider,
            model,
        }
    }
}

fn normalize_chat_reply(content: &str) -> (String, Vec<Edit>) {
    if let Some(raw) = extract_json::<RawChatReply>(content) {
        let proposed = raw
            .proposed_edits
            .iter()
            .filter_map(normalize_edit)
            .collect();
        let message = raw
            .message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| content.trim().to_string());
        return (message, proposed);
    }
    (strip_code_fence(content).to_string(), Vec::new())
}

/// Deserialize a JSON object out of a completion, tolerating surrounding
/// code fences and prose.
fn extract_json<T: serde::de::DeserializeOwned>(content: &str) -> Option<T> {
    let body = strip_code_fence(content);
    if let Ok(parsed) = serde_json::from_str(body) {
        return Some(parsed);
    }
    let start = body.find('{')?;
    let end = body.rfind('}')?;
    if start >= end {
        return None;
    }
    serde_json::from_str(&body[start..=end]).ok()
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

/// Starting points for a clarification reply, taken from blocks that look
/// like numbered headings.
fn contextual_suggestions(document: &ContractDocument, limit: usize) -> Vec<String> {
    let mut suggestions = Vec::new();
    for block in split_paragraphs(&document.plain_text) {
        let first_line = block.lines().next().unwrap_or_default().trim();
        if first_line.is_empty() || first_line.chars().count() > 80 {
            continue;
        }
        let lowered = first_line.to_lowercase();
        let numbered = first_line.chars().next().is_some_and(|c| c.is_ascii_digit());
        let keyword = CLAUSE_KEYWORDS.iter().any(|kw| lowered.contains(kw));
        if numbered || keyword {
            suggestions.push(format!("Review \"{first_line}\""));
            if suggestions.len() == limit {
                break;
            }
        }
    }
    suggestions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::TokenUsage;
    use chrono::Utc;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    struct FakeProvider {
        id: &'static str,
        model_name: &'static str,
        calls: AtomicUsize,
        script: Mutex<VecDeque<Result<ProviderCompletion, ProviderError>>>,
    }

    impl FakeProvider {
        fn scripted(
            id: &'static str,
            script: Vec<Result<ProviderCompletion, ProviderError>>,
        ) -> Arc<Self> {
            Arc::new(Self {
                id,
                model_name: "fake-model",
                calls: AtomicUsize::new(0),
                script: Mutex::new(script.into()),
            })
        }

        fn ok(id: &'static str, content: &str) -> Arc<Self> {
            Self::scripted(
                id,
                vec![Ok(ProviderCompletion {
                    content: content.to_string(),
                    usage: Some(TokenUsage {
                        input_tokens: 10,
                        output_tokens: 20,
                    }),
                })],
            )
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl GenerativeProvider for FakeProvider {
        fn provider_id(&self) -> &str {
            self.id
        }

        fn model(&self) -> &str {
            self.model_name
        }

        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<ProviderCompletion, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| panic!("{} called past its script", self.id))
        }
    }

    fn document() -> ContractDocument {
        ContractDocument {
            contract_id: "c1".to_string(),
            plain_text: "1. Definitions\n\nThe Receiving Party shall keep information \
                         confidential.\n\n2. Term\n\nThis agreement lasts one year."
                .to_string(),
            html: None,
            package_ref: None,
            updated_at: Utc::now(),
        }
    }

    fn orchestrator(
        primary: Arc<dyn GenerativeProvider>,
        secondary: Option<Arc<dyn GenerativeProvider>>,
    ) -> Orchestrator {
        Orchestrator::new(
            primary,
            secondary,
            &ProvidersConfig::default(),
            GuardrailConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_rewrite_parses_strict_json() {
        let reply = r#"{"updatedHtml": "<body><p>New text.</p></body>",
                        "updatedContract": "New text.",
                        "summary": "Replaced the clause.",
                        "appliedChanges": ["Replaced clause 1"]}"#;
        let primary = FakeProvider::ok("anthropic", reply);
        let orch = orchestrator(primary.clone(), None);

        let outcome = orch.rewrite(&document(), &[]).await;
        assert_eq!(outcome.updated_contract, "New text.");
        assert_eq!(outcome.summary.as_deref(), Some("Replaced the clause."));
        assert_eq!(outcome.applied_changes, vec!["Replaced clause 1"]);
        assert_eq!(outcome.provider, "anthropic");
        assert!(!outcome.is_heuristic());
    }

    #[tokio::test]
    async fn test_rewrite_tolerates_code_fence() {
        let reply = "```json\n{\"updatedContract\": \"Fenced text.\", \"summary\": \"s\"}\n```";
        let primary = FakeProvider::ok("anthropic", reply);
        let orch = orchestrator(primary, None);

        let outcome = orch.rewrite(&document(), &[]).await;
        assert_eq!(outcome.updated_contract, "Fenced text.");
    }

    #[tokio::test]
    async fn test_malformed_reply_degrades_to_text() {
        let primary = FakeProvider::ok("anthropic", "<body><p>Just markup, no JSON.</p></body>");
        let orch = orchestrator(primary, None);

        let outcome = orch.rewrite(&document(), &[]).await;
        assert_eq!(outcome.updated_contract, "Just markup, no JSON.");
        assert!(outcome.updated_html.is_some());
    }

    #[tokio::test]
    async fn test_rate_limit_falls_back_to_secondary() {
        let primary = FakeProvider::scripted(
            "anthropic",
            vec![Err(ProviderError::RateLimitExceeded {
                provider: "anthropic".to_string(),
            })],
        );
        let secondary = FakeProvider::ok("openai", r#"{"updatedContract": "From secondary."}"#);
        let orch = orchestrator(primary.clone(), Some(secondary.clone()));

        let outcome = orch.rewrite(&document(), &[]).await;
        assert_eq!(outcome.provider, "openai");
        assert_eq!(outcome.updated_contract, "From secondary.");
        assert_eq!(primary.call_count(), 1);
        assert_eq!(secondary.call_count(), 1);
    }

    #[tokio::test]
    async fn test_server_error_does_not_fall_back() {
        let primary = FakeProvider::scripted(
            "anthropic",
            vec![Err(ProviderError::ServerError {
                provider: "anthropic".to_string(),
                status: 500,
                message: "boom".to_string(),
            })],
        );
        let secondary = FakeProvider::ok("openai", r#"{"updatedContract": "unused"}"#);
        let orch = orchestrator(primary, Some(secondary.clone()));

        let outcome = orch.rewrite(&document(), &[]).await;
        assert!(outcome.is_heuristic());
        assert_eq!(outcome.updated_contract, document().plain_text);
        assert_eq!(secondary.call_count(), 0);
    }

    #[tokio::test]
    async fn test_fallback_disallowed_by_policy() {
        let primary = FakeProvider::scripted(
            "anthropic",
            vec![Err(ProviderError::QuotaExhausted {
                provider: "anthropic".to_string(),
            })],
        );
        let secondary = FakeProvider::ok("openai", r#"{"updatedContract": "unused"}"#);
        let providers = ProvidersConfig {
            allow_fallback: false,
            ..ProvidersConfig::default()
        };
        let orch = Orchestrator::new(
            primary,
            Some(secondary.clone()),
            &providers,
            GuardrailConfig::default(),
        );

        let outcome = orch.rewrite(&document(), &[]).await;
        assert!(outcome.is_heuristic());
        assert_eq!(secondary.call_count(), 0);
    }

    #[tokio::test]
    async fn test_guardrail_intercepts_help_without_provider_call() {
        let primary = FakeProvider::scripted("anthropic", vec![]);
        let orch = orchestrator(primary.clone(), None);

        let response = orch
            .chat(&document(), &[ChatMessage::user("help")], None)
            .await;
        assert!(response.proposed_edits.is_empty());
        assert_eq!(response.provider, HEURISTIC_PROVIDER);
        assert_eq!(primary.call_count(), 0);
        assert!(response.message.content.contains("Review \"1. Definitions\""));
    }

    #[tokio::test]
    async fn test_guardrail_passes_specific_messages() {
        let reply = r#"{"message": "Sure.", "proposedEdits": []}"#;
        let primary = FakeProvider::ok("anthropic", reply);
        let orch = orchestrator(primary.clone(), None);

        let response = orch
            .chat(
                &document(),
                &[ChatMessage::user("shorten the notice term")],
                None,
            )
            .await;
        assert_eq!(response.message.content, "Sure.");
        assert_eq!(primary.call_count(), 1);
    }

    #[tokio::test]
    async fn test_chat_reply_edits_are_normalized() {
        let reply = r#"{"message": "Proposed one change.",
                        "proposedEdits": [{"id": "e1",
                                           "clauseReference": "Section 2",
                                           "previousText": "one year",
                                           "updatedText": "two years"}]}"#;
        let primary = FakeProvider::ok("anthropic", reply);
        let orch = orchestrator(primary, None);

        let response = orch
            .chat(
                &document(),
                &[ChatMessage::user("extend the term of section 2 to two years")],
                None,
            )
            .await;
        assert_eq!(response.proposed_edits.len(), 1);
        let edit = &response.proposed_edits[0];
        assert_eq!(edit.change_type, ChangeType::Modify);
        assert_eq!(edit.original_text.as_deref(), Some("one year"));
        assert_eq!(edit.suggested_text, "two years");
    }

    #[test]
    fn test_rewrite_prompt_numbers_directives() {
        let edits = vec![
            Edit {
                id: "e1".to_string(),
                clause_reference: Some("Section 1".to_string()),
                change_type: ChangeType::Modify,
                original_text: Some("old".to_string()),
                suggested_text: "new".to_string(),
                rationale: Some("clarity".to_string()),
                severity: None,
            },
            Edit {
                id: "e2".to_string(),
                clause_reference: None,
                change_type: ChangeType::Remove,
                original_text: Some("gone".to_string()),
                suggested_text: String::new(),
                rationale: None,
                severity: None,
            },
        ];
        let request = build_rewrite_request(&document(), &edits);
        let user = &request.messages[0].content;
        assert!(user.contains("1. [modify] (Section 1) Replace: \"old\" With: \"new\""));
        assert!(user.contains("2. [remove] Replace: \"gone\""));
        assert!(!user.contains("2. [remove] Replace: \"gone\" With"));
    }
}
