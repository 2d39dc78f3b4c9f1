//! Query Intent Analyzer
//! Classifies a raw query by its literal `::marker::` prefix and rewrites it
//! into the prompt actually sent to the model.

use std::fmt;
use tracing::{debug, warn};

use crate::services::conversation::ContextBuilder;
use crate::services::lexicon_service::LexicalReference;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    /// Define a term, preferably from the dictionary
    /// Example: "::explain::morpheme"
    Explain,

    /// Tailored example for the student's major
    /// Example: "::eg::cosine similarity"
    Exemplify,

    /// Pick out field terms the student may not know
    /// Example: "::detect::We estimate the parameters."
    Detect,

    /// Rewrite a sentence in plainer English
    /// Example: "::simplify::The alignment is ergative."
    Simplify,

    /// Free-form question, answered with conversation history
    Open,
}

impl Intent {
    const PREFIXES: [(&'static str, Intent); 5] = [
        ("::explain::", Intent::Explain),
        ("::simplify::", Intent::Simplify),
        ("::detect::", Intent::Detect),
        ("::eg::", Intent::Exemplify),
        ("::exemplify::", Intent::Exemplify),
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Explain => "explain",
            Intent::Exemplify => "exemplify",
            Intent::Detect => "detect",
            Intent::Simplify => "simplify",
            Intent::Open => "open",
        }
    }

    /// Only open questions are answered against the history window.
    pub fn uses_history(&self) -> bool {
        matches!(self, Intent::Open)
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of the rewriter for one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewrittenQuery {
    pub intent: Intent,
    /// Short description persisted to history instead of `prompt`
    pub help_text: String,
    /// Full text sent to the model
    pub prompt: String,
}

pub struct QueryAnalyzer;

impl QueryAnalyzer {
    /// Split a raw query into its intent and the text after the marker.
    pub fn classify(raw: &str) -> (Intent, &str) {
        for (prefix, intent) in Intent::PREFIXES {
            if let Some(rest) = raw.strip_prefix(prefix) {
                debug!("Detected {} intent", intent);
                return (intent, rest);
            }
        }
        (Intent::Open, raw)
    }

    /// Classify `raw` and build help text and prompt. No state is kept between calls.
    pub async fn rewrite(
        raw: &str,
        major: &str,
        lexicon: &dyn LexicalReference,
    ) -> RewrittenQuery {
        let (intent, query) = Self::classify(raw);

        let (help_text, prompt) = match intent {
            Intent::Explain => (
                format!("explain the meaning of {}", query),
                Self::explain_prompt(query, lexicon).await,
            ),
            Intent::Exemplify => (
                format!("provide an example to {}", query),
                ContextBuilder::exemplify(query, major),
            ),
            Intent::Detect => (
                format!("detect ambiguous and confusing text for my major in {}", query),
                ContextBuilder::detect(query),
            ),
            Intent::Simplify => (
                format!("simplify {}", query),
                ContextBuilder::simplify(query),
            ),
            Intent::Open => (query.to_string(), query.to_string()),
        };

        RewrittenQuery { intent, help_text, prompt }
    }

    async fn explain_prompt(term: &str, lexicon: &dyn LexicalReference) -> String {
        let entries = match lexicon.lookup(term).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Lexical lookup for '{}' failed, using few-shot template: {}", term, e);
                Vec::new()
            }
        };

        match ContextBuilder::format_definitions(&entries) {
            Some(definitions) => ContextBuilder::explain_with_definitions(term, &definitions),
            None => ContextBuilder::explain_few_shot(term),
        }
    }
}
