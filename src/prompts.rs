//! Prompts sent to the hosted model.
//!
//! Kept in one place so tests can inspect them without a live endpoint.
//! [`EXTRACTION_PROMPT`] can be overridden per session through
//! [`crate::config::ExtractorConfig::extraction_prompt`]; the verification
//! prompt cannot, since [`crate::verify`] depends on its reply shape.

/// Instruction placed first in every extraction request.
pub const EXTRACTION_PROMPT: &str = r#"You are given study material: page images or text extracted from a document, worksheet, or spreadsheet.

Extract the following:
1. PASSAGE: if the material contains a reading-comprehension passage, copy it verbatim. Otherwise use an empty string.
2. QUESTIONS: every question in the material, in the order they appear. Keep numbering out of the question text.
3. ANSWERS: the answer to each question if the material provides one (answer key, filled-in blank, marked choice). If no answer is given, omit the "answer" field.

For multiple-choice questions, include the options in the question text.

Respond with ONLY a JSON object in exactly this shape, with no commentary and no code fences:
{"passage": "...", "qna": [{"question": "...", "answer": "..."}]}"#;

/// Build the semantic-equivalence prompt for one question.
///
/// The reply is expected to be a JSON object `{"equivalent": bool,
/// "explanation": string}`; [`crate::verify`] also accepts a leading yes/no.
pub fn verification_prompt(question: &str, expected: &str, given: &str) -> String {
    format!(
        r#"Decide whether a student's answer is correct.

Question: """{question}"""
Reference answer: """{expected}"""
Student answer: """{given}"""

The student's answer is correct if it means the same thing as the reference answer, even when the wording, spelling, capitalisation, or level of detail differs. It is incorrect if it contradicts the reference or answers something else.

Respond with ONLY a JSON object: {{"equivalent": true or false, "explanation": "one short sentence"}}"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extraction_prompt_names_reply_keys() {
        assert!(EXTRACTION_PROMPT.contains("\"passage\""));
        assert!(EXTRACTION_PROMPT.contains("\"qna\""));
        assert!(EXTRACTION_PROMPT.contains("\"answer\""));
    }

    #[test]
    fn verification_prompt_embeds_all_three_texts() {
        let p = verification_prompt("Capital of France?", "Paris", "paris, france");
        assert!(p.contains("Capital of France?"));
        assert!(p.contains("Reference answer: \"\"\"Paris\"\"\""));
        assert!(p.contains("paris, france"));
        assert!(p.contains("{\"equivalent\""));
    }
}
