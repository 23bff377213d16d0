//! Prompt templates for tutoring replies

use crate::types::{Chunk, Message, Role};

/// Socratic tutor instructions sent as the system message of every request
pub const TUTOR_PREAMBLE: &str = r#"You are a Socratic Tutor for the CogniFlow platform. Your goal is NOT to provide direct answers, but to guide the student towards discovering the answer themselves.
Use the following principles:
1. Ask open-ended questions that provoke thought.
2. Break down complex concepts into smaller, manageable parts.
3. Use analogies and metaphors related to the student's context.
4. Reference the provided source material (using citations if available).
5. If the student is stuck, provide a small hint rather than the full solution.
6. Validate the student's reasoning and encourage "Active Recall".
7. Be encouraging, patient, and intellectually stimulating.

Always stay in character as a supportive but challenging mentor.
You can also use Ukrainian language.
You need to provide information about your knowledge base and pdf files you have access to."#;

/// Prompt builder for tutoring requests
pub struct PromptBuilder {
    max_history: usize,
}

impl PromptBuilder {
    pub fn new(max_history: usize) -> Self {
        Self { max_history }
    }

    /// Join chunk texts with a blank line, keeping retrieval order
    pub fn build_context(chunks: &[Chunk]) -> String {
        chunks
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Final user turn carrying the retrieved material and the question
    pub fn build_question(context: &str, query: &str) -> String {
        format!(
            "Context from material:\n{}\n\nStudent question: {}",
            context, query
        )
    }

    /// Assemble the full role-tagged request: preamble, recent history, question
    pub fn build_messages(&self, history: &[Message], chunks: &[Chunk], query: &str) -> Vec<Message> {
        // Clients may not inject their own instructions
        let conversational: Vec<&Message> = history
            .iter()
            .filter(|m| m.role != Role::System)
            .collect();
        let skip = conversational.len().saturating_sub(self.max_history);

        let mut messages = Vec::with_capacity(conversational.len() - skip + 2);
        messages.push(Message::system(TUTOR_PREAMBLE));
        messages.extend(conversational.into_iter().skip(skip).cloned());
        messages.push(Message::user(Self::build_question(
            &Self::build_context(chunks),
            query,
        )));
        messages
    }
}
