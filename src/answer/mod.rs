// Answer module
// Prompt assembly for the chat model and post-processing of its raw answer
// into renderable prose/code segments.


use anyhow::Result;
use tracing::debug;

use crate::links::SupportingTexts;
use crate::openai::{ChatMessage, OpenAiClient};

/// Returned without calling the chat service when no supporting text was
/// found for a question.
pub const NO_MATCH_ANSWER: &str =
    "No similar text found in the documentation. Please try again.";

/// Assistant persona used when the request carries no custom system message.
pub const DEFAULT_SYSTEM_MESSAGE: &str = "You are a helpful assistant that can answer questions \
    about the OpenSAFELY platform using the supporting text provided. If the answer is not in \
    the supporting text, you can say 'No similar text found in the documentation. Please try \
    again. If you are going to provide code blocks in your answer, the code blocks should only \
    be copied from the supporting text'";

const CODE_FENCE: &str = "```";

/// Ask the chat model to answer `question` using the supporting texts as
/// context.
///
/// An empty supporting-text mapping short-circuits to [`NO_MATCH_ANSWER`]
/// without a remote call. Remote errors propagate unmodified.
#[inline]
pub fn generate_answer(
    client: &OpenAiClient,
    question: &str,
    supporting: &SupportingTexts,
    system_message: Option<&str>,
) -> Result<String> {
    if supporting.is_empty() {
        debug!("No supporting text, returning fixed answer");
        return Ok(NO_MATCH_ANSWER.to_string());
    }

    let labels = quoted_label_list(supporting);
    let messages = vec![
        ChatMessage::system(system_message.unwrap_or(DEFAULT_SYSTEM_MESSAGE)),
        ChatMessage::user(format!(
            "The supporting texts from the documentation are: {labels}"
        )),
        ChatMessage::user("What is the answer to the question?"),
        ChatMessage::user(question),
    ];

    client.chat(messages)
}

/// Render the citation labels as a single-quoted list, e.g.
/// `['Platform', 'Using codelists: Glossary']`. Labels contain no
/// apostrophes, so no escaping is done.
fn quoted_label_list(supporting: &SupportingTexts) -> String {
    let mut list = String::from("[");
    for (position, label) in supporting.labels().enumerate() {
        if position > 0 {
            list.push_str(", ");
        }
        list.push('\'');
        list.push_str(label);
        list.push('\'');
    }
    list.push(']');
    list
}

/// An answer split into alternating prose/code segments for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentedAnswer {
    pub segments: Vec<String>,
    pub code_indices: Vec<usize>,
}

impl SegmentedAnswer {
    #[inline]
    pub fn is_code(&self, index: usize) -> bool {
        self.code_indices.contains(&index)
    }
}

/// Split a raw answer on triple-backtick fences.
///
/// Only when the split produces an odd number of segments (all fences
/// paired) are the odd-indexed segments flagged as code; an unpaired fence
/// still splits the text but flags nothing. The parity rule is deliberate
/// and load-bearing for rendering compatibility; it is not a full fence
/// matcher.
#[inline]
pub fn segment_answer(answer: &str) -> SegmentedAnswer {
    if !answer.contains(CODE_FENCE) {
        return SegmentedAnswer {
            segments: vec![answer.to_string()],
            code_indices: Vec::new(),
        };
    }

    let segments: Vec<String> = answer.split(CODE_FENCE).map(str::to_string).collect();
    let code_indices = if segments.len() % 2 == 1 {
        (1..segments.len()).step_by(2).collect()
    } else {
        Vec::new()
    };

    SegmentedAnswer {
        segments,
        code_indices,
    }
}
