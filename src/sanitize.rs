//! Response repair for model output.
//!
//! Models wrap JSON in code fences, use single quotes, and leave trailing
//! commas. This pass normalizes the raw text and extracts the first balanced
//! JSON object or array span so parsing can work on a clean candidate.
//!
//! The whole pass is pure: it never calls out, never panics on arbitrary
//! input, and is idempotent on already-clean JSON.

/// Normalize raw model output and extract the first JSON object or array.
///
/// Steps, in order:
/// 1. drop code-fence lines (```` ``` ```` markers)
/// 2. replace single quotes with double quotes
/// 3. drop trailing commas immediately before a closing brace/bracket
/// 4. locate the first balanced `{...}` or `[...]` span (string-aware)
///
/// Returns `None` when no balanced span exists. The quote replacement is
/// deliberately naive, matching what models get wrong in practice; an
/// apostrophe inside a value is rewritten like any other single quote.
#[must_use]
pub fn sanitize(text: &str) -> Option<String> {
    let cleaned = strip_code_fences(text);
    let cleaned = cleaned.replace('\'', "\"");
    let cleaned = strip_trailing_commas(&cleaned);
    extract_json_span(&cleaned).map(str::to_string)
}

fn strip_code_fences(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn strip_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());

    for (i, &c) in chars.iter().enumerate() {
        if c == ',' {
            let mut j = i + 1;
            while j < chars.len() && chars[j].is_whitespace() {
                j += 1;
            }
            if j < chars.len() && (chars[j] == '}' || chars[j] == ']') {
                continue;
            }
        }
        out.push(c);
    }

    out
}

/// First balanced `{...}` or `[...]` span. Structural characters are ASCII,
/// so a byte scan is safe on UTF-8 input.
fn extract_json_span(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    for (start, &b) in bytes.iter().enumerate() {
        if b != b'{' && b != b'[' {
            continue;
        }
        if let Some(end) = balanced_end(bytes, start) {
            return Some(&text[start..=end]);
        }
    }
    None
}

fn balanced_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }

        match b {
            b'"' => in_string = true,
            b'{' | b'[' => depth += 1,
            b'}' | b']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }

    None
}
