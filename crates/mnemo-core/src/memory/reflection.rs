//! Reflection over recent episodic memories and fact extraction from raw logs.

use chrono::{Duration, Utc};
use mnemo_state::{Category, Memory};
use serde::Serialize;
use tracing::{debug, instrument};

use super::service::MemoryService;
use crate::error::Result;
use crate::generation::TextGenerator;

const SYNTHESIS_PROMPT: &str = "\
Review the above memories and suggest 1-3 Semantic Facts that:
  - Capture the essential knowledge
  - Eliminate redundant detail
  - Maintain high information density

For each suggested fact, provide:
  1. Title (short, descriptive)
  2. Content (concise, definitive statement)
  3. Related memory IDs (for traceability)";

/// Recent episodic memories and the prompt for consolidating them
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reflection {
    pub hours: u32,
    pub memories: Vec<Memory>,
    pub prompt: String,
}

impl Reflection {
    pub fn is_empty(&self) -> bool {
        self.memories.is_empty()
    }
}

fn extraction_prompt(raw: &str) -> String {
    format!(
        "Extract technical decisions, architecture patterns, and user preferences from the following log.\n\
         Format each as a concise fact. Ignore greetings and meta-talk.\n\
         Provide each fact on a new line starting with \"- \".\n\n\
         Log Content:\n---\n{raw}\n---\nFacts:"
    )
}

/// Lines of `response` starting with `- `, prefix stripped.
pub fn parse_facts(response: &str) -> Vec<String> {
    response
        .lines()
        .map(str::trim)
        .filter_map(|line| line.strip_prefix("- "))
        .map(str::to_string)
        .collect()
}

/// Ask `generator` to turn a raw log into standalone facts.
#[instrument(skip_all, fields(raw_len = raw.len()))]
pub async fn extract_facts(generator: &dyn TextGenerator, raw: &str) -> Result<Vec<String>> {
    let response = generator.generate(&extraction_prompt(raw)).await?;
    let facts = parse_facts(&response);
    debug!(facts = facts.len(), "extracted facts");
    Ok(facts)
}

impl MemoryService {
    /// Episodic memories created in the last `hours`, newest first.
    #[instrument(skip(self))]
    pub async fn reflect(&self, hours: u32, limit: usize) -> Result<Reflection> {
        let since = Utc::now() - Duration::hours(i64::from(hours));
        let memories = self
            .catchup(limit, Some(Category::Episodic), Some(since))
            .await?;
        Ok(Reflection {
            hours,
            memories,
            prompt: SYNTHESIS_PROMPT.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use async_trait::async_trait;

    struct Canned(&'static str);

    #[async_trait]
    impl TextGenerator for Canned {
        async fn generate(&self, prompt: &str) -> std::result::Result<String, ProviderError> {
            assert!(prompt.contains("Log Content:"));
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn test_parse_facts_keeps_dash_lines_only() {
        let facts = parse_facts("Sure!\n- Uses tokio\n  - Prefers thiserror  \n-no space\n* bullet");
        assert_eq!(facts, vec!["Uses tokio", "Prefers thiserror"]);
    }

    #[tokio::test]
    async fn test_extract_facts_through_generator() {
        let facts = extract_facts(&Canned("- A\n- B\nthanks"), "raw log").await.unwrap();
        assert_eq!(facts, vec!["A", "B"]);
    }
}
