//! Grading prompt rendering.

use crate::analysis::DocumentAnalysis;

const EVALUATION_PROMPT_TEMPLATE: &str = include_str!("../prompts/evaluation.txt");

const NOT_AVAILABLE: &str = "N/A";

/// Build the grading prompt for an analyzed answer sheet
pub fn build_evaluation_prompt(analysis: &DocumentAnalysis) -> String {
    let summary = format!(
        "Pages: {}\nTables: {}\nAverage line confidence: {:.2}\nCharacters extracted: {}",
        analysis.page_count,
        analysis.table_count,
        analysis.average_confidence,
        analysis.text_length()
    );

    let text = if analysis.extracted_text.is_empty() {
        NOT_AVAILABLE
    } else {
        analysis.extracted_text.as_str()
    };

    render(
        EVALUATION_PROMPT_TEMPLATE,
        &[("document_analysis", &summary), ("extracted_text", text)],
    )
}

/// Substitute `{name}` placeholders in one pass.
///
/// Unknown placeholders are left as-is, and substituted values are never
/// rescanned, so braces inside extracted text survive untouched.
fn render(template: &str, values: &[(&str, &str)]) -> String {
    let mut output = String::with_capacity(
        template.len() + values.iter().map(|(_, v)| v.len()).sum::<usize>(),
    );
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        output.push_str(&rest[..open]);
        let candidate = &rest[open + 1..];

        let replacement = candidate.find('}').and_then(|close| {
            let name = &candidate[..close];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, close))
        });

        match replacement {
            Some((value, close)) => {
                output.push_str(value);
                rest = &candidate[close + 1..];
            }
            None => {
                output.push('{');
                rest = candidate;
            }
        }
    }

    output.push_str(rest);
    output
}
