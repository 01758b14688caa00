//! Text sanitization for model output and scraped Reddit content.
//!
//! All functions are pure and stateless. Fenced code blocks (```…```) are
//! always passed through byte-for-byte; nothing here ever allocates an
//! unbounded buffer — callers are expected to truncate before rendering.

/// Split `s` into alternating (outside-fence, inside-fence) segments on the
/// ``` delimiter. An unterminated trailing fence is treated as still open
/// (passed through untouched) rather than silently closed.
fn split_fences(s: &str) -> Vec<(bool, &str)> {
    const DELIM: &str = "```";
    let mut segments = Vec::new();
    let mut rest = s;
    let mut fenced = false;
    while let Some(idx) = rest.find(DELIM) {
        let (head, tail) = rest.split_at(idx);
        if !head.is_empty() || fenced {
            segments.push((fenced, head));
        }
        let (marker, after) = tail.split_at(DELIM.len());
        // The ``` marker itself belongs to the fenced region on open, and
        // closes it on the matching close; either way it must never be
        // touched by whitespace/mark normalization.
        segments.push((true, marker));
        rest = after;
        fenced = !fenced;
    }
    if !rest.is_empty() || segments.is_empty() {
        segments.push((fenced, rest));
    }
    segments
}

fn is_combining_mark(c: char) -> bool {
    let cp = c as u32;
    matches!(cp,
        0x0300..=0x036F |
        0x1DC0..=0x1DFF |
        0x20D0..=0x20FF |
        0xFE20..=0xFE2F |
        0x0483..=0x0489
    )
}

/// Remove Zalgo / combining-mark characters from `s`.
pub fn strip_combining_marks(s: &str) -> String {
    s.chars().filter(|c| !is_combining_mark(*c)).collect()
}

fn normalize_whitespace_segment(s: &str) -> String {
    let normalized_newlines = s.replace("\r\n", "\n");

    let mut collapsed = String::with_capacity(normalized_newlines.len());
    let mut chars = normalized_newlines.chars().peekable();
    while let Some(c) = chars.next() {
        if c == ' ' || c == '\t' {
            while matches!(chars.peek(), Some(' ') | Some('\t')) {
                chars.next();
            }
            collapsed.push(' ');
        } else if c == '\n' {
            let mut run = 1;
            while chars.peek() == Some(&'\n') {
                chars.next();
                run += 1;
            }
            collapsed.push('\n');
            if run >= 2 {
                collapsed.push('\n');
            }
        } else {
            collapsed.push(c);
        }
    }
    collapsed
}

/// Normalize whitespace outside fenced code blocks: CRLF→LF, collapse runs
/// of space/tab to one, collapse runs of ≥3 newlines to exactly two, trim
/// ends. Content inside ```…``` fences passes through byte-for-byte.
pub fn normalize_whitespace(s: &str) -> String {
    let segments = split_fences(s);
    let mut out = String::with_capacity(s.len());
    for (fenced, chunk) in segments {
        if fenced {
            out.push_str(chunk);
        } else {
            out.push_str(&normalize_whitespace_segment(chunk));
        }
    }
    out.trim().to_string()
}

/// Full sanitization pass: strip combining marks then normalize whitespace,
/// both skipping fenced regions. Idempotent: `sanitize(sanitize(s)) ==
/// sanitize(s)`.
pub fn sanitize(s: &str) -> String {
    let segments = split_fences(s);
    let mut out = String::with_capacity(s.len());
    for (fenced, chunk) in segments {
        if fenced {
            out.push_str(chunk);
        } else {
            let stripped = strip_combining_marks(chunk);
            out.push_str(&normalize_whitespace_segment(&stripped));
        }
    }
    out.trim().to_string()
}

/// Backslash-escape markdown control characters: `\ * _ [ ] ( ) \``.
pub fn escape_markdown(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '\\' | '*' | '_' | '[' | ']' | '(' | ')' | '`') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_zalgo_marks() {
        let input = "h\u{0301}e\u{0301}llo";
        assert_eq!(strip_combining_marks(input), "hello");
    }

    #[test]
    fn collapses_whitespace_outside_fences() {
        let input = "a   b\r\n\r\n\r\nc\t\td";
        assert_eq!(normalize_whitespace(input), "a b\n\nc d");
    }

    #[test]
    fn preserves_fenced_code_byte_for_byte() {
        let input = "before   text\n```\nfn  main()   {}\n\n\n\n```\nafter   text";
        let result = sanitize(input);
        assert!(result.contains("fn  main()   {}\n\n\n\n"));
        assert!(result.starts_with("before text"));
        assert!(result.ends_with("after text"));
    }

    #[test]
    fn sanitize_is_idempotent() {
        let input = "h\u{0301}ello   world\r\n\r\n\r\n```\nlet x =  1;\n```\n  trailing  ";
        let once = sanitize(input);
        let twice = sanitize(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn escapes_markdown_control_chars() {
        assert_eq!(escape_markdown("a*b_c[d]e(f)g`h\\i"), "a\\*b\\_c\\[d\\]e\\(f\\)g\\`h\\\\i");
    }

    #[test]
    fn unterminated_fence_is_passed_through() {
        let input = "text   before\n```\nraw   content   stays";
        let result = sanitize(input);
        assert!(result.ends_with("raw   content   stays"));
    }
}
