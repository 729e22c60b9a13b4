//! Context assembly and the guardrail instruction.
//!
//! Turns retrieved chunks and the tenant's rules into the single system
//! instruction sent to the chat model. Nothing here talks to a provider;
//! the responder in the app crate owns the call.

use crate::models::{KnowledgeRule, ScoredChunk};

/// Sentence the model must use verbatim when the context has no answer.
pub const DEFAULT_FALLBACK_MESSAGE: &str = "I'm sorry, I don't have information about that in my knowledge base. Is there something else I can help you with?";

/// Default relevance floor; results at or below it are discarded.
pub const DEFAULT_MIN_SIMILARITY: f64 = 0.3;

const NO_DOCUMENT_CONTEXT: &str = "No document context available.";
const NO_CUSTOM_RESPONSES: &str = "No custom Q&A responses configured.";

/// Concatenate the retrieved chunks that clear `min_similarity`.
///
/// `results` must be in descending-similarity order. Surviving chunks are
/// labeled `[Source 1]`, `[Source 2]`, ... in that order and separated by a
/// blank line. Returns an empty string when nothing survives.
pub fn build_context_block(results: &[ScoredChunk], min_similarity: f64) -> String {
    results
        .iter()
        .filter(|r| r.similarity > min_similarity)
        .enumerate()
        .map(|(i, r)| format!("[Source {}]: {}", i + 1, r.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Render every rule as a `Q:`/`A:` pair, matched or not.
pub fn render_rules(rules: &[KnowledgeRule]) -> String {
    rules
        .iter()
        .map(|r| format!("Q: {}\nA: {}", r.trigger, r.response))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build the guardrail system instruction.
///
/// Empty `context` or `rules_block` are replaced with explicit placeholders
/// so the model can tell "nothing supplied" apart from a formatting glitch.
pub fn build_system_prompt(
    bot_name: &str,
    context: &str,
    rules_block: &str,
    fallback_message: &str,
) -> String {
    let identity = if bot_name.trim().is_empty() {
        "a friendly and helpful AI assistant".to_string()
    } else {
        format!("{}, a friendly and helpful AI assistant", bot_name.trim())
    };
    let context = if context.is_empty() {
        NO_DOCUMENT_CONTEXT
    } else {
        context
    };
    let rules_block = if rules_block.is_empty() {
        NO_CUSTOM_RESPONSES
    } else {
        rules_block
    };

    format!(
        r#"You are {identity} representing a specific business or website.
Please follow these guidelines carefully:
1. Only answer questions using the information provided in the context below. Do not rely on outside knowledge (except for basic greetings and polite conversation).
2. If the answer is not available in the context, respond with:
"{fallback_message}"
3. Never guess, assume, or create information that is not clearly stated in the context.
4. Keep your tone warm, conversational, and professional, like a helpful staff member assisting a customer.
5. If the user greets you (e.g., "hi", "hello"), respond politely and ask how you can assist them.
6. Keep responses clear, concise, and relevant. Avoid unnecessary details.
7. If a question can only be partially answered using the context, provide the available information and politely mention that you don't have further details.
8. Prioritize accuracy over completeness. It's better to say you don't know than to provide incorrect information.
---
CONTEXT FROM KNOWLEDGE BASE:
{context}
---
CUSTOM Q&A RESPONSES (these take priority if matched exactly):
{rules_block}
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(text: &str, similarity: f64) -> ScoredChunk {
        ScoredChunk {
            chunk_id: format!("c-{}", text),
            document_id: "d1".to_string(),
            chunk_index: 0,
            text: text.to_string(),
            similarity,
        }
    }

    #[test]
    fn context_block_drops_results_at_or_below_floor() {
        let results = vec![scored("alpha", 0.9), scored("beta", 0.3), scored("gamma", 0.25)];
        let block = build_context_block(&results, 0.3);
        assert_eq!(block, "[Source 1]: alpha");
    }

    #[test]
    fn context_block_numbers_survivors_in_order() {
        let results = vec![scored("alpha", 0.9), scored("beta", 0.8), scored("gamma", 0.31)];
        let block = build_context_block(&results, 0.3);
        assert_eq!(
            block,
            "[Source 1]: alpha\n\n[Source 2]: beta\n\n[Source 3]: gamma"
        );
    }

    #[test]
    fn context_block_empty_when_nothing_relevant() {
        assert_eq!(build_context_block(&[scored("x", 0.25)], 0.3), "");
        assert_eq!(build_context_block(&[], 0.3), "");
    }

    #[test]
    fn rules_render_as_qa_pairs() {
        let rules = vec![
            KnowledgeRule::new("t", "hours", "9 to 5", true),
            KnowledgeRule::new("t", "parking", "Free in the back", false),
        ];
        assert_eq!(
            render_rules(&rules),
            "Q: hours\nA: 9 to 5\nQ: parking\nA: Free in the back"
        );
    }

    #[test]
    fn prompt_contains_guardrails_and_placeholders() {
        let prompt = build_system_prompt("Acme Bot", "", "", DEFAULT_FALLBACK_MESSAGE);
        assert!(prompt.starts_with("You are Acme Bot, a friendly"));
        assert!(prompt.contains(DEFAULT_FALLBACK_MESSAGE));
        assert!(prompt.contains(NO_DOCUMENT_CONTEXT));
        assert!(prompt.contains(NO_CUSTOM_RESPONSES));
        assert!(prompt.contains("Never guess"));
    }

    #[test]
    fn prompt_embeds_context_and_rules() {
        let prompt = build_system_prompt(
            "",
            "[Source 1]: We ship worldwide.",
            "Q: hours\nA: 9 to 5",
            "Sorry, no idea.",
        );
        assert!(prompt.starts_with("You are a friendly and helpful AI assistant"));
        assert!(prompt.contains("[Source 1]: We ship worldwide."));
        assert!(prompt.contains("Q: hours\nA: 9 to 5"));
        assert!(prompt.contains("\"Sorry, no idea.\""));
        assert!(!prompt.contains(NO_DOCUMENT_CONTEXT));
    }
}
