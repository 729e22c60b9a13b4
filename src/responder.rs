//! Guardrailed answering.
//!
//! [`Responder::answer`] runs, in order: rule match (short-circuit), the
//! knowledge check, retrieval, context assembly, and one chat completion.
//! Retrieval and generation failures are logged and absorbed; callers only
//! ever see an [`Answer`].

use std::sync::Arc;

use tracing::{debug, info, warn};

use knowledge_core::context::{build_context_block, build_system_prompt, render_rules};
use knowledge_core::models::{KnowledgeRule, ScoredChunk};
use knowledge_core::rules::match_rule;
use knowledge_core::store::Store;
use knowledge_core::KnowledgeError;

use crate::config::{Config, GenerationConfig, RetrievalConfig};
use crate::provider::{ChatParams, ModelProvider};

/// Outcome of answering one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    /// A rule fired; its response is returned verbatim.
    Matched(String),
    /// The model answered from the assembled context.
    Generated(String),
    /// The tenant has nothing relevant to answer from.
    NoKnowledge,
    /// The chat call failed or returned nothing.
    GenerationFailed,
}

impl Answer {
    /// The answer text, or `None` when the caller should use its own fallback.
    pub fn into_option(self) -> Option<String> {
        match self {
            Answer::Matched(text) | Answer::Generated(text) => Some(text),
            Answer::NoKnowledge | Answer::GenerationFailed => None,
        }
    }
}

pub struct Responder {
    store: Arc<dyn Store>,
    provider: Arc<dyn ModelProvider>,
    retrieval: RetrievalConfig,
    generation: GenerationConfig,
}

impl Responder {
    pub fn new(store: Arc<dyn Store>, provider: Arc<dyn ModelProvider>, config: &Config) -> Self {
        Self {
            store,
            provider,
            retrieval: config.retrieval.clone(),
            generation: config.generation.clone(),
        }
    }

    pub async fn answer(&self, tenant_id: &str, message: &str, bot_name: &str) -> Answer {
        let rules = self.load_rules(tenant_id).await;

        if let Some(rule) = match_rule(&rules, message) {
            debug!(tenant_id, rule_id = %rule.id, "rule matched");
            return Answer::Matched(rule.response.clone());
        }

        let chunk_count = match self.store.count_searchable_chunks(tenant_id).await {
            Ok(n) => n,
            Err(e) => {
                warn!(tenant_id, error = %e, "chunk count failed; answering without documents");
                0
            }
        };

        if chunk_count == 0 && rules.is_empty() {
            return Answer::NoKnowledge;
        }

        let context = if chunk_count > 0 {
            match self.retrieve(tenant_id, message).await {
                Ok(results) => build_context_block(&results, self.retrieval.min_similarity),
                Err(e) => {
                    warn!(tenant_id, error = %e, "retrieval failed; continuing without document context");
                    String::new()
                }
            }
        } else {
            String::new()
        };
        let rules_block = render_rules(&rules);

        if context.is_empty() && rules_block.is_empty() {
            debug!(tenant_id, "no chunk cleared the similarity floor");
            return Answer::NoKnowledge;
        }

        let system = build_system_prompt(
            bot_name,
            &context,
            &rules_block,
            &self.generation.fallback_message,
        );

        match self
            .provider
            .chat_complete(&system, message, ChatParams::from(&self.generation))
            .await
        {
            Ok(text) if !text.trim().is_empty() => {
                info!(tenant_id, has_context = !context.is_empty(), "answer generated");
                Answer::Generated(text.trim().to_string())
            }
            Ok(_) => {
                warn!(tenant_id, "chat model returned an empty completion");
                Answer::GenerationFailed
            }
            Err(e) => {
                warn!(tenant_id, error = %e, "generation failed");
                Answer::GenerationFailed
            }
        }
    }

    async fn load_rules(&self, tenant_id: &str) -> Vec<KnowledgeRule> {
        match self.store.list_rules(tenant_id).await {
            Ok(rules) => rules,
            Err(e) => {
                warn!(tenant_id, error = %e, "failed to load rules");
                Vec::new()
            }
        }
    }

    async fn retrieve(&self, tenant_id: &str, message: &str) -> Result<Vec<ScoredChunk>, KnowledgeError> {
        let query_vec = self
            .provider
            .embed_one(message)
            .await
            .map_err(|e| KnowledgeError::Retrieval(e.to_string()))?;

        self.store
            .vector_search(tenant_id, &query_vec, self.retrieval.top_k)
            .await
            .map_err(|e| KnowledgeError::Retrieval(format!("{:#}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::StubProvider;
    use knowledge_core::chunk::build_chunks;
    use knowledge_core::models::{Document, FileType};
    use knowledge_core::store::memory::InMemoryStore;

    async fn seed_chunk(store: &InMemoryStore, tenant: &str, text: &str, vector: Vec<f32>) {
        let doc = Document::new_processing(tenant, "kb.pdf", FileType::Pdf, 1);
        store.insert_document(&doc).await.unwrap();
        let chunks = build_chunks(tenant, &doc.id, &[text.to_string()], vec![vector]);
        store.complete_document(&doc.id, &chunks).await.unwrap();
    }

    fn responder(store: Arc<InMemoryStore>, provider: Arc<StubProvider>) -> Responder {
        Responder::new(store, provider, &Config::with_db_path("unused.sqlite"))
    }

    #[tokio::test]
    async fn rule_match_short_circuits_provider() {
        let store = Arc::new(InMemoryStore::new());
        store
            .insert_rule(&KnowledgeRule::new("t1", "hours", "We open 9-5.", true))
            .await
            .unwrap();
        seed_chunk(&store, "t1", "irrelevant", vec![1.0, 0.0]).await;
        let provider = Arc::new(StubProvider::new(vec![1.0, 0.0]));

        let answer = responder(store, provider.clone())
            .answer("t1", "  Hours ", "Shop Bot")
            .await;
        assert_eq!(answer, Answer::Matched("We open 9-5.".to_string()));
        assert_eq!(provider.embed_calls(), 0);
        assert_eq!(provider.chat_calls(), 0);
    }

    #[tokio::test]
    async fn empty_tenant_has_no_knowledge() {
        let provider = Arc::new(StubProvider::new(vec![1.0]));
        let answer = responder(Arc::new(InMemoryStore::new()), provider.clone())
            .answer("t1", "what do you sell?", "Bot")
            .await;
        assert_eq!(answer, Answer::NoKnowledge);
        assert!(answer.into_option().is_none());
        assert_eq!(provider.embed_calls(), 0);
    }

    #[tokio::test]
    async fn weak_matches_are_not_knowledge() {
        let store = Arc::new(InMemoryStore::new());
        seed_chunk(&store, "t1", "Our warehouse is in Leeds.", vec![1.0, 0.0]).await;
        // cos = 0.25 against [1, 0]
        let provider = Arc::new(StubProvider::new(vec![0.25, 0.968_245_8]));

        let answer = responder(store, provider.clone())
            .answer("t1", "do you sell shoes?", "Bot")
            .await;
        assert_eq!(answer, Answer::NoKnowledge);
        assert_eq!(provider.embed_calls(), 1);
        assert_eq!(provider.chat_calls(), 0);
    }

    #[tokio::test]
    async fn relevant_chunks_reach_the_prompt() {
        let store = Arc::new(InMemoryStore::new());
        seed_chunk(&store, "t1", "Delivery takes 3 days.", vec![1.0, 0.0]).await;
        seed_chunk(&store, "t2", "Other tenant secret.", vec![1.0, 0.0]).await;
        let provider = Arc::new(
            StubProvider::new(vec![1.0, 0.0]).with_reply(Some("  Delivery takes 3 days.  ")),
        );

        let answer = responder(store, provider.clone())
            .answer("t1", "How long is delivery?", "Parcel Pal")
            .await;
        assert_eq!(answer, Answer::Generated("Delivery takes 3 days.".to_string()));

        let system = provider.last_system().unwrap();
        assert!(system.contains("[Source 1]: Delivery takes 3 days."));
        assert!(!system.contains("Other tenant secret."));
        assert!(system.contains("Parcel Pal"));
        assert!(system.contains("No custom Q&A responses configured."));
        assert!(system.contains(knowledge_core::context::DEFAULT_FALLBACK_MESSAGE));
        assert_eq!(provider.last_user().as_deref(), Some("How long is delivery?"));
    }

    #[tokio::test]
    async fn rules_alone_are_enough_to_generate() {
        let store = Arc::new(InMemoryStore::new());
        store
            .insert_rule(&KnowledgeRule::new("t1", "refund policy", "30 days, no questions.", false))
            .await
            .unwrap();
        let provider = Arc::new(StubProvider::new(vec![1.0]).with_reply(Some("30 days.")));

        let answer = responder(store, provider.clone())
            .answer("t1", "can I get my money back?", "Bot")
            .await;
        assert_eq!(answer, Answer::Generated("30 days.".to_string()));
        assert_eq!(provider.embed_calls(), 0);

        let system = provider.last_system().unwrap();
        assert!(system.contains("Q: refund policy\nA: 30 days, no questions."));
        assert!(system.contains("No document context available."));
    }

    #[tokio::test]
    async fn retrieval_failure_falls_back_to_rules() {
        let store = Arc::new(InMemoryStore::new());
        seed_chunk(&store, "t1", "Some fact.", vec![1.0, 0.0]).await;
        store
            .insert_rule(&KnowledgeRule::new("t1", "parking", "Behind the shop.", false))
            .await
            .unwrap();
        let provider = Arc::new(
            StubProvider::failing_embeddings("timeout").with_reply(Some("Ask about parking!")),
        );

        let answer = responder(store, provider.clone())
            .answer("t1", "anything else?", "Bot")
            .await;
        assert_eq!(answer, Answer::Generated("Ask about parking!".to_string()));
        let system = provider.last_system().unwrap();
        assert!(system.contains("No document context available."));
    }

    #[tokio::test]
    async fn retrieval_failure_without_rules_has_no_knowledge() {
        let store = Arc::new(InMemoryStore::new());
        seed_chunk(&store, "t1", "Some fact.", vec![1.0, 0.0]).await;
        let provider = Arc::new(StubProvider::failing_embeddings("timeout"));

        let answer = responder(store, provider.clone()).answer("t1", "hello?", "Bot").await;
        assert_eq!(answer, Answer::NoKnowledge);
        assert_eq!(provider.chat_calls(), 0);
    }

    #[tokio::test]
    async fn generation_failure_is_reported_not_raised() {
        let store = Arc::new(InMemoryStore::new());
        seed_chunk(&store, "t1", "Open on Sundays.", vec![1.0, 0.0]).await;
        let provider = Arc::new(StubProvider::new(vec![1.0, 0.0]).with_reply(None));

        let answer = responder(store, provider).answer("t1", "Sunday?", "Bot").await;
        assert_eq!(answer, Answer::GenerationFailed);
        assert!(answer.into_option().is_none());
    }
}
