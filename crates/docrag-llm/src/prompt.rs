use docrag_core::types::ContextRecord;

const INSTRUCTIONS: &str = "You are an AI assistant for a construction marketplace.\n\
You must answer ONLY using the information in the provided document chunks.\n\
If the answer is not present in the context, say you don't know based on the documents.\n\
Do not invent policies, facts, or numbers not supported by the context.\n\
Provide a clear, concise answer without suggesting follow-up questions.\n";

pub const SYSTEM_MESSAGE: &str = "You are a helpful, grounded assistant.";

/// Grounding instructions, numbered context blocks in retrieval order, then the question.
pub fn build_rag_prompt(question: &str, contexts: &[ContextRecord]) -> String {
    let context_text = if contexts.is_empty() {
        "No context retrieved.".to_string()
    } else {
        contexts
            .iter()
            .enumerate()
            .map(|(i, c)| format!("[Chunk {} | source={} | score={:.3}]\n{}", i + 1, c.source, c.score, c.text))
            .collect::<Vec<_>>()
            .join("\n\n")
    };
    format!("{INSTRUCTIONS}\n\nContext:\n{context_text}\n\nQuestion: {question}\n\nAnswer:")
}
