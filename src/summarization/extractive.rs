use super::{SummarizationClient, SummarizationClientError, SummarizationRequest};
use async_trait::async_trait;

/// Deterministic in-process summarizer that keeps the leading sentences of its input.
///
/// Whole sentences are taken until `min_words` is reached; the summary never exceeds
/// `max_words`, cutting the last sentence at a word boundary when it would overflow.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExtractiveSummarizer;

impl ExtractiveSummarizer {
    /// Construct a new extractive summarizer.
    pub const fn new() -> Self {
        Self
    }

    fn summarize(text: &str, min_words: usize, max_words: usize) -> String {
        let mut taken = Vec::new();
        for word in text.split_whitespace() {
            if taken.len() == max_words {
                break;
            }
            taken.push(word);
            if taken.len() >= min_words && ends_sentence(word) {
                break;
            }
        }
        taken.join(" ")
    }
}

fn ends_sentence(word: &str) -> bool {
    word.trim_end_matches(['"', '\'', ')', ']'])
        .ends_with(['.', '!', '?'])
}

#[async_trait]
impl SummarizationClient for ExtractiveSummarizer {
    async fn generate_summary(
        &self,
        request: SummarizationRequest,
    ) -> Result<String, SummarizationClientError> {
        if request.text.trim().is_empty() {
            return Err(SummarizationClientError::InvalidInput(
                "cannot summarize empty text".into(),
            ));
        }
        if request.max_words == 0 {
            return Err(SummarizationClientError::InvalidInput(
                "max_words must be greater than zero".into(),
            ));
        }
        Ok(Self::summarize(
            &request.text,
            request.min_words,
            request.max_words,
        ))
    }
}
