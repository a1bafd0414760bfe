//! Prompts for LLM-based keyword extraction.
//!
//! The image search is only as good as the first keyword it gets, so the
//! prompt asks for the single most picturable noun phrase first.

/// System prompt for extracting image-search keywords from one sentence.
pub const KEYWORD_SYSTEM_PROMPT: &str = r#"You extract search keywords from a sentence of a short documentary script.

Rules:
1. Return between 1 and 5 keywords or short noun phrases taken from the sentence.
2. Put first the keyword that would find the most relevant PHOTOGRAPH for the sentence
   (a place, person, object or event — never an abstract idea).
3. Keep the language of the sentence. Do not translate.
4. Output ONLY the keywords, one per line.
5. Do NOT number them, add bullets, quotes, explanations or a trailing period."#;

/// Build the user message carrying the sentence.
pub fn keyword_request(sentence: &str) -> String {
    format!("Sentence:\n\"\"\"{}\"\"\"", sentence.trim())
}
