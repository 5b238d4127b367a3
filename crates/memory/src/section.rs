//! Header-delimited text ranges.
//!
//! A section starts at a level-2 heading (`## Name`) and runs until the next
//! level-2 heading or the end of the document.  This is deliberately not a
//! Markdown parser: documents are split on `\n`, ranges are line indices, and
//! splices rejoin with `\n` so every untouched byte survives a rewrite.

/// How a section header is recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderMatch<'a> {
    /// `## <name>` and nothing else on the line (trailing whitespace ignored).
    Exact(&'a str),
    /// Any level-2 header whose text starts with the token, e.g. `## Log (work)`.
    Prefix(&'a str),
}

impl HeaderMatch<'_> {
    pub fn matches(&self, line: &str) -> bool {
        let Some(text) = header_text(line) else {
            return false;
        };
        match self {
            Self::Exact(name) => text.trim_end() == *name,
            Self::Prefix(name) => text.starts_with(name),
        }
    }
}

/// Line range of one section.  `end` is exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionRange {
    pub header: usize,
    pub end: usize,
}

impl SectionRange {
    pub fn body_start(&self) -> usize {
        self.header + 1
    }
}

pub fn is_section_header(line: &str) -> bool {
    header_text(line).is_some()
}

fn header_text(line: &str) -> Option<&str> {
    line.strip_prefix("## ")
}

fn is_comment_only(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.starts_with("<!--") && trimmed.ends_with("-->")
}

/// First section whose header satisfies `matcher`.
pub fn find_section(lines: &[&str], matcher: HeaderMatch<'_>) -> Option<SectionRange> {
    let header = lines.iter().position(|line| matcher.matches(line))?;
    let end = lines[header + 1..]
        .iter()
        .position(|line| is_section_header(line))
        .map(|offset| header + 1 + offset)
        .unwrap_or(lines.len());
    Some(SectionRange { header, end })
}

/// Where a new entry goes: the first line after the header that is neither
/// blank nor a comment-only line.  If the next header (or the end of the
/// document) comes first the section is empty and the entry goes directly
/// below its header.
pub fn insertion_point(lines: &[&str], range: SectionRange) -> usize {
    for (index, line) in lines.iter().enumerate().skip(range.body_start()) {
        if is_section_header(line) {
            break;
        }
        if !line.trim().is_empty() && !is_comment_only(line) {
            return index;
        }
    }
    range.body_start()
}

/// Insert `new_line` at the section's insertion point.  `None` when no header
/// matches; the caller decides whether that is a no-op or a fallback.
pub fn insert_line(content: &str, matcher: HeaderMatch<'_>, new_line: &str) -> Option<String> {
    let mut lines: Vec<&str> = content.split('\n').collect();
    let range = find_section(&lines, matcher)?;
    let at = insertion_point(&lines, range);
    lines.insert(at, new_line);
    Some(lines.join("\n"))
}

/// Body lines of the named section, header excluded.
pub fn section_lines<'a>(content: &'a str, name: &str) -> Option<Vec<&'a str>> {
    let lines: Vec<&str> = content.split('\n').collect();
    let range = find_section(&lines, HeaderMatch::Exact(name))?;
    Some(lines[range.body_start()..range.end].to_vec())
}

/// Replace everything between the named header and the next level-2 header
/// (or end of document) with `body`, followed by one blank line.
pub fn replace_body(content: &str, name: &str, body: &[String]) -> Option<String> {
    let lines: Vec<&str> = content.split('\n').collect();
    let range = find_section(&lines, HeaderMatch::Exact(name))?;

    let mut rebuilt: Vec<&str> = Vec::with_capacity(lines.len() + body.len());
    rebuilt.extend_from_slice(&lines[..range.body_start()]);
    rebuilt.extend(body.iter().map(String::as_str));
    rebuilt.push("");
    rebuilt.extend_from_slice(&lines[range.end..]);
    Some(rebuilt.join("\n"))
}

/// Append `line` as the last line of the document.
pub fn append_at_end(content: &str, line: &str) -> String {
    let mut out = String::with_capacity(content.len() + line.len() + 2);
    out.push_str(content);
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(line);
    out.push('\n');
    out
}
