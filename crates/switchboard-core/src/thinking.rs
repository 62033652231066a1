//! Best-effort split of a thinking model's reply into reasoning and answer.
//!
//! Recognized markers, in priority order: `<answer>…</answer>`, then a line
//! starting with `Final Answer:`, `Answer:` or `Conclusion:` (case-insensitive,
//! leading markdown emphasis or headings ignored). Without a marker the
//! parser gives up and returns `None`.

const LINE_MARKERS: [&str; 3] = ["final answer:", "answer:", "conclusion:"];

/// A reply split at its answer marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThinkingResponse {
    /// Paragraphs preceding the answer.
    pub reasoning: Vec<String>,
    pub final_answer: String,
}

/// Split `text` at its answer marker. Returns `None` when no marker is found
/// or the answer would be empty.
pub fn parse_thinking_response(text: &str) -> Option<ThinkingResponse> {
    parse_answer_tag(text).or_else(|| parse_line_marker(text))
}

fn parse_answer_tag(text: &str) -> Option<ThinkingResponse> {
    let lower = text.to_ascii_lowercase();
    let start = lower.find("<answer>")?;
    let body_start = start + "<answer>".len();
    let end = lower[body_start..].find("</answer>")? + body_start;
    build(&text[..start], &text[body_start..end])
}

fn parse_line_marker(text: &str) -> Option<ThinkingResponse> {
    for marker in LINE_MARKERS {
        // Byte offset of each line start, so the answer can run past its line.
        let mut offset = 0;
        let mut found = None;
        for line in text.split_inclusive('\n') {
            let stripped = line.trim_start().trim_start_matches(['#', '*', '_', ' ']);
            let lead = line.len() - stripped.len();
            if stripped.len() >= marker.len()
                && stripped.is_char_boundary(marker.len())
                && stripped[..marker.len()].eq_ignore_ascii_case(marker)
            {
                // Keep the last occurrence: drafts often precede the real answer.
                found = Some((offset, offset + lead + marker.len()));
            }
            offset += line.len();
        }
        if let Some((line_start, answer_start)) = found {
            let answer = text[answer_start..].trim_start_matches(['*', '_']);
            return build(&text[..line_start], answer);
        }
    }
    None
}

fn build(reasoning: &str, answer: &str) -> Option<ThinkingResponse> {
    let final_answer = answer.trim().to_string();
    if final_answer.is_empty() {
        return None;
    }
    Some(ThinkingResponse {
        reasoning: paragraphs(reasoning),
        final_answer,
    })
}

fn paragraphs(text: &str) -> Vec<String> {
    text.split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}
