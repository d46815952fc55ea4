use crate::context::AssembledContext;

/// External generation model: `(question, context) → answer text`.
#[async_trait::async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate(&self, question: &str, context: &AssembledContext) -> anyhow::Result<String>;
}

/// Grounded-answer prompt for generators that take a single text prompt.
pub fn render_prompt(question: &str, context: &AssembledContext) -> String {
    format!(
        "You are a precise document assistant. Answer the question using ONLY the document content below.\n\
         \n\
         QUESTION: {question}\n\
         \n\
         DOCUMENT CONTENT:\n\
         {}\n\
         \n\
         INSTRUCTIONS:\n\
         - Answer the exact question asked, citing sources as [Source N]\n\
         - Preserve lists, code blocks and tables as they appear\n\
         - If the answer is not in the documents, say that the documents do not contain it\n\
         \n\
         ANSWER:",
        context.text
    )
}
