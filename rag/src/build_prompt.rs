use crate::retrieve_chunks::QueryResult;

/// Prompt for the grounded path: the instruction, the verbatim excerpts, then the question.
pub fn build_grounded_prompt(system_prompt: &str, question: &str, results: &[QueryResult]) -> String {
    let context = format_context(results);
    format!(
        "{}\n\nContext:\n{}\n\nQuestion: {}\n\nAnswer:",
        system_prompt, context, question
    )
}

/// Prompt used when no local material matched.
pub fn build_open_prompt(question: &str) -> String {
    format!(
        "No course material matched this question. Answer briefly from general knowledge, \
and say so if you are not sure.\n\nQuestion: {}\n\nAnswer:",
        question
    )
}

pub fn format_context(results: &[QueryResult]) -> String {
    let mut context_lines = Vec::new();
    for (i, hit) in results.iter().enumerate() {
        context_lines.push(format!(
            "[{}] {} (page {})\n{}",
            i + 1,
            hit.source_document,
            hit.page_number,
            hit.chunk_text
        ));
    }

    if context_lines.is_empty() {
        "(no context found)".to_string()
    } else {
        context_lines.join("\n\n")
    }
}
