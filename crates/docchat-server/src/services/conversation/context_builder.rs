use crate::services::lexicon_service::LexicalEntry;

/// Prompt text for the dialog: the per-conversation system message and the
/// fixed few-shot templates used by the query rewriter.
pub struct ContextBuilder;

impl ContextBuilder {
    /// System message for a conversation. Fixed for the conversation's lifetime.
    pub fn system_prompt(major: &str) -> String {
        format!(
            "You are a computational linguistics expert and native English speaker. \
             Assist Master's students majored in {major}, \
             non-native with at least C1 English proficiency, \
             by providing clear and straightforward answers \
             to their course-related questions."
        )
    }

    /// `Definition {i}: ...` lines from the first entry, or `None` if nothing
    /// usable remains after trimming.
    pub fn format_definitions(entries: &[LexicalEntry]) -> Option<String> {
        let entry = entries.first()?;

        let lines: Vec<String> = entry
            .definitions
            .iter()
            .map(|d| d.text.join(" ").split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|text| !text.is_empty())
            .enumerate()
            .map(|(i, text)| format!("Definition {}: {}", i + 1, text))
            .collect();

        if lines.is_empty() {
            None
        } else {
            Some(lines.join("\n"))
        }
    }

    pub fn explain_with_definitions(term: &str, definitions: &str) -> String {
        format!(
            "Here is the definition of {term} from wiktionary:\n\
             {definitions}\n\
             Very shortly summarize them, then select the one relevant to computational linguistics, \
             and rephrase it to be easily understood by the student.\n\
             Start with:\n\
             Some definitions from wiktionary are: ..."
        )
    }

    pub fn explain_few_shot(term: &str) -> String {
        format!(
            "Input:\n\
             Define \"morpheme\".\n\
             Output:\n\
             A morpheme is the smallest meaningful unit in a language.\n\
             \n\
             Input:\n\
             Define \"syntax\".\n\
             Output:\n\
             Syntax refers to the rules that govern sentence structure in a language.\n\
             \n\
             Input:\n\
             Define \"semantic analysis\".\n\
             Output:\n\
             Semantic analysis involves understanding the meaning of text.\n\
             \n\
             Input:\n\
             Define \"{term}\".\n\
             Output:"
        )
    }

    pub fn exemplify(query: &str, major: &str) -> String {
        format!(
            "Input: vector space model, Major: Literature and Critical Theory\n\
             Example: Imagine analyzing 'Jane Eyre' and 'Moby Dick'. Using a vector space model, \
             each novel can be represented by a vector where each dimension corresponds to a unique word, \
             enabling a comparison of thematic elements based on word.\n\
             \n\
             Input: syntactic tree, Major: Computer Science\n\
             Example: Imagine analyzing a complex algorithm's pseudo-code. A syntactic tree can illustrate \
             the hierarchical structure, with main functions as roots and sub-functions as branches, \
             elucidating the code's execution order and dependencies.\n\
             \n\
             Input: cosine similarity, Major: General Linguistics\n\
             Example: Imagine comparing two sentences: \"I love apples\" and \"Apples are loved by me\". \
             Despite the difference in structure, their meaning is similar. Cosine similarity would measure \
             this closeness by considering the sentences as vectors of words and calculating the cosine of \
             the angle between them, indicating how similar the sentences are in content.\n\
             \n\
             Input: {query}, Major: {major}\n\
             Exemplify:"
        )
    }

    pub fn detect(query: &str) -> String {
        format!(
            "Input: 'We would need a very, very large number of training examples to estimate that many parameters.'\n\
             CL Terms: training examples, estimate, parameters. \
             Would you like further clarification on any of the identified terms?\n\
             \n\
             Input: 'Consider a formal version of the English language modeled as a set of strings of words. \
             Is this language a regular language?'\n\
             CL Terms: language model, regular language. \
             Would you like further clarification on any of the identified terms?\n\
             \n\
             Input: 'Freeze the representation models and use them as feature extractors, \
             or fine-tune the representation models on downstream tasks.'\n\
             CL Terms: freeze, representation models, feature extractors, fine-tune. \
             Would you like further clarification on any of the identified terms?\n\
             \n\
             Input: {query}\n\
             CL Terms:"
        )
    }

    /// Plain task description; exemplars tended to over-simplify terminology.
    pub fn simplify(query: &str) -> String {
        format!(
            "Simplify sentences by preserving terminology, simplifying sentence structures, \
             and using basic vocabulary. The goal is to ensure technical accuracy and improved \
             accessibility for non-native speakers.\n\
             Input: {query}\n\
             Simplified Version:"
        )
    }
}
