/// Exact source lines `start_line..=end_line` (1-based) with their common indentation removed
pub fn extract_span(source: &str, start_line: usize, end_line: usize) -> String {
    let lines: Vec<&str> = source.split('\n').collect();
    let start = start_line.saturating_sub(1).min(lines.len());
    let end = end_line.min(lines.len()).max(start);
    dedent(&lines[start..end].join("\n"))
}

/// Remove the longest run of spaces/tabs shared by every non-blank line.
///
/// Lines holding only spaces and tabs are emptied and do not take part in the margin.
pub fn dedent(text: &str) -> String {
    let lines: Vec<&str> = text
        .split('\n')
        .map(|line| if is_blank(line) { "" } else { line })
        .collect();

    let mut margin: Option<&str> = None;
    for line in lines.iter().filter(|l| !l.is_empty()) {
        let indent = leading_indent(line);
        margin = Some(match margin {
            None => indent,
            Some(current) => common_prefix(current, indent),
        });
    }
    let margin = margin.unwrap_or("");

    lines
        .iter()
        .map(|line| line.strip_prefix(margin).unwrap_or(line))
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_blank(line: &str) -> bool {
    line.chars().all(|c| c == ' ' || c == '\t')
}

fn leading_indent(line: &str) -> &str {
    let content = line.trim_start_matches(|c| c == ' ' || c == '\t');
    &line[..line.len() - content.len()]
}

fn common_prefix<'a>(a: &'a str, b: &str) -> &'a str {
    let len = a
        .bytes()
        .zip(b.bytes())
        .take_while(|(x, y)| x == y)
        .count();
    &a[..len]
}
