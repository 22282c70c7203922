use crate::news_store::Category;

const NO_SUMMARY: &str = "No summary available.";

/// Builds the classification prompt for one record.
///
/// The summary is cut to `summary_max_chars` characters (not bytes) so that a
/// long body cannot blow up the request size.
pub fn render_prompt(title: &str, summary: Option<&str>, summary_max_chars: usize) -> String {
    let summary = summary
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| truncate_chars(s, summary_max_chars))
        .unwrap_or(NO_SUMMARY);

    let categories = Category::ALL
        .iter()
        .map(|c| format!("- \"{}\" - {}", c.as_str(), c.description()))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Assign the news story below to exactly one category.\n\
         \n\
         Title: {title}\n\
         Summary: {summary}\n\
         \n\
         Categories:\n\
         {categories}\n\
         \n\
         Reply with the category name only, in lowercase, without punctuation.\n\
         Category:"
    )
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}
