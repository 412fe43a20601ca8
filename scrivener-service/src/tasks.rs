//! Analysis task definitions.
//!
//! Each task bundles the job bookkeeping name, the response field it fills,
//! the sampling temperature, and the prompt it builds over extracted
//! document text. Keeping these in one place means adding a task type is a
//! single-enum change rather than a hunt through handlers.

use serde::{Deserialize, Serialize};

/// Attribute keys an obligations answer must carry per extracted obligation.
const OBLIGATION_KEYS: &[&str] = &[
    "Obligation Summary",
    "Obligation Type",
    "Obligation Start Date",
    "Obligation End Date",
    "Obligation Recurrence",
    "Obligation Recurrence Frequency",
    "Obligation Associated Risk Factor",
];

/// Attribute keys a risks answer must carry per identified risk.
const RISK_KEYS: &[&str] = &["Risk Summary", "Risk Category", "Risk Severity"];

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnalysisTask {
    Summary { min_words: u32, max_words: u32 },
    Obligations,
    Risks,
}

impl AnalysisTask {
    /// Display name recorded on the job row.
    pub fn job_name(&self) -> &'static str {
        match self {
            Self::Summary { .. } => "Generate File Summary",
            Self::Obligations => "Find Obligations",
            Self::Risks => "Find Risks",
        }
    }

    /// Name of the response field the answer is returned under.
    pub fn answer_field(&self) -> &'static str {
        match self {
            Self::Summary { .. } => "summary",
            Self::Obligations => "obligations",
            Self::Risks => "risks",
        }
    }

    /// Sampling temperature. Summaries get room to paraphrase; structured
    /// extraction runs close to greedy.
    pub fn temperature(&self) -> f32 {
        match self {
            Self::Summary { .. } => 0.7,
            Self::Obligations | Self::Risks => 0.2,
        }
    }

    /// JSON object keys the answer is required to use, empty for free-form
    /// tasks.
    pub fn output_keys(&self) -> &'static [&'static str] {
        match self {
            Self::Summary { .. } => &[],
            Self::Obligations => OBLIGATION_KEYS,
            Self::Risks => RISK_KEYS,
        }
    }

    /// Build the full prompt for this task over the extracted document text.
    pub fn build_prompt(&self, text: &str) -> String {
        match self {
            Self::Summary {
                min_words,
                max_words,
            } => format!(
                "You are an expert content summarizer. You take content in and output only a summary.\n\
                 Combine all of your understanding of the content and summarize it into a concise \
                 summary between {min_words} and {max_words} words.\n\
                 Summarize the content completely and ensure the summary is logical, relevant, and \
                 not truncated.\n\
                 You only output human-readable Markdown.\n\
                 Do NOT output introductory phrases, headings, commentary, extra text, warnings, or \
                 notes. Return the requested summary ONLY.\n\
                 Do NOT repeat items in the summary.\n\
                 Do NOT start items with the same opening words.\n\
                 \n\
                 INPUT:\n{text}"
            ),
            Self::Obligations => format!(
                "Document text: {text}\n\
                 Identify and extract all obligations from the provided document. For each \
                 obligation, extract the following attributes:\n\
                 - Obligation Summary\n\
                 - Obligation Type (choose from: Payment, Delivery, Service, Warranty/Guarantee, \
                 Intellectual Property, Termination, Other)\n\
                 - Obligation Start Date (if specified, otherwise 'NOT SPECIFIED')\n\
                 - Obligation End Date (if specified, otherwise 'NOT SPECIFIED')\n\
                 - Obligation Recurrence (Yes/No)\n\
                 - Obligation Recurrence Frequency (if recurring, e.g., monthly, weekly, daily; \
                 otherwise 'NOT APPLICABLE')\n\
                 - Obligation Associated Risk Factor (High, Medium, Low, or No Risk)\n\
                 Output ONLY a JSON array where each element is a JSON object with the keys: {}.",
                quoted_key_list(OBLIGATION_KEYS)
            ),
            Self::Risks => format!(
                "Document text: {text}\n\
                 Identify and list all risks present in the document. A risk is a potential \
                 negative consequence or issue arising from the obligations or other aspects of \
                 the document.\n\
                 For each risk, output a JSON object with the following keys:\n\
                 - Risk Summary: A concise summary of the risk.\n\
                 - Risk Category: Choose one from Financial, Operational, Legal, Reputational, \
                 Strategic, or Other.\n\
                 - Risk Severity: One of High, Medium, or Low.\n\
                 Output ONLY a JSON array of such objects without any additional commentary. \
                 Use exactly the keys: {}.",
                quoted_key_list(RISK_KEYS)
            ),
        }
    }
}

/// How a Q&A answer should be shaped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionMode {
    /// Only the essential value, one line.
    Specific,
    /// A detailed answer with explanation.
    Elaborate,
}

/// One question from a Q&A request.
#[derive(Debug, Clone, Deserialize)]
pub struct QuestionItem {
    pub question: String,
    pub response_type: QuestionMode,
}

/// Sampling temperature for Q&A answers.
pub const QUESTION_TEMPERATURE: f32 = 0.2;

/// Build a Q&A prompt over the document text.
///
/// The document text is whitespace-normalized so OCR line breaks do not
/// fragment sentences the model needs to read across.
pub fn question_prompt(text: &str, question: &str, mode: QuestionMode) -> String {
    let normalized: String = text.split_whitespace().collect::<Vec<_>>().join(" ");

    let shape = match mode {
        QuestionMode::Specific => {
            "Return ONLY the essential value in a single line, in the requested format.\n\
             If the answer is explicitly stated in the document, provide the answer DIRECTLY and stop.\n\
             Output the answer DIRECTLY, without any prefixes, labels, or additional text."
        }
        QuestionMode::Elaborate => {
            "Return a detailed answer with necessary and relevant explanation.\n\
             If the answer is explicitly stated in the document, provide the answer directly."
        }
    };

    format!(
        "Document text: {normalized}\n\
         Question: {question}\n\
         You are an expert content analyzer and can accurately generate an answer to a question \
         based on the document text relevant to the question asked.\n\
         {shape}\n\
         If the answer requires inference or summarization of information within the document, \
         provide a concise and accurate response.\n\
         If the answer cannot be found within the provided document text, output: 'Answer not \
         found in document.' and stop.\n\
         You only output human-readable Markdown.\n\
         Do NOT output introductory phrases, headings, commentary, extra text, warnings, or notes.\n\
         Do NOT repeat items in the answer.\n\
         Do NOT start items with the same opening words.\n\
         Answer the question based ONLY on the information provided in the document text.\n\
         Do NOT include any external information or assumptions beyond what is present in the \
         document."
    )
}

/// Sampling temperature for knowledge-base answers.
pub const KNOWLEDGE_BASE_TEMPERATURE: f32 = 0.2;

/// Canned reply when retrieval finds nothing relevant.
pub const KNOWLEDGE_BASE_FALLBACK: &str = "I'm not sure about that. Please contact support.";

/// Build a context-grounded prompt for a knowledge-base query.
pub fn knowledge_base_prompt(context: &str, question: &str) -> String {
    format!(
        "Use only the following context to answer the question. If the context is \
         insufficient, respond with 'I'm not sure. Please contact support.'\n\
         \n\
         Context:\n{context}\n\
         \n\
         Question: {question}\n\
         \n\
         Answer:"
    )
}

fn quoted_key_list(keys: &[&str]) -> String {
    keys.iter()
        .map(|k| format!("'{k}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_prompt_includes_word_bounds() {
        let task = AnalysisTask::Summary {
            min_words: 40,
            max_words: 90,
        };
        let prompt = task.build_prompt("Quarterly report body");
        assert!(prompt.contains("between 40 and 90 words"));
        assert!(prompt.contains("Quarterly report body"));
        assert_eq!(task.temperature(), 0.7);
        assert_eq!(task.answer_field(), "summary");
    }

    #[test]
    fn obligations_prompt_names_every_key() {
        let prompt = AnalysisTask::Obligations.build_prompt("lease terms");
        for key in AnalysisTask::Obligations.output_keys() {
            assert!(prompt.contains(key), "prompt missing key {key}");
        }
        assert!(prompt.contains("'Obligation Summary', 'Obligation Type'"));
        assert_eq!(AnalysisTask::Obligations.job_name(), "Find Obligations");
    }

    #[test]
    fn risks_prompt_names_every_key() {
        let prompt = AnalysisTask::Risks.build_prompt("lease terms");
        for key in AnalysisTask::Risks.output_keys() {
            assert!(prompt.contains(key), "prompt missing key {key}");
        }
        assert_eq!(AnalysisTask::Risks.temperature(), 0.2);
    }

    #[test]
    fn question_prompt_normalizes_whitespace() {
        let prompt = question_prompt(
            "line one\n  line\ttwo",
            "What is line two?",
            QuestionMode::Specific,
        );
        assert!(prompt.contains("Document text: line one line two"));
        assert!(prompt.contains("single line"));
    }

    #[test]
    fn question_modes_produce_distinct_instructions() {
        let specific = question_prompt("text", "q?", QuestionMode::Specific);
        let elaborate = question_prompt("text", "q?", QuestionMode::Elaborate);
        assert!(specific.contains("ONLY the essential value"));
        assert!(elaborate.contains("detailed answer"));
        assert_ne!(specific, elaborate);
    }

    #[test]
    fn knowledge_base_prompt_grounds_answer_in_context() {
        let prompt = knowledge_base_prompt("clause 4: rent is due monthly", "When is rent due?");
        assert!(prompt.contains("Use only the following context"));
        assert!(prompt.contains("Context:\nclause 4: rent is due monthly"));
        assert!(prompt.contains("Question: When is rent due?"));
        assert!(prompt.ends_with("Answer:"));
    }

    #[test]
    fn question_item_parses_from_request_json() {
        let items: Vec<QuestionItem> = serde_json::from_str(
            r#"[
                {"question": "Who is the lessor?", "response_type": "specific"},
                {"question": "Explain the termination clause", "response_type": "elaborate"}
            ]"#,
        )
        .unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].response_type, QuestionMode::Specific);
        assert_eq!(items[1].response_type, QuestionMode::Elaborate);
    }
}
