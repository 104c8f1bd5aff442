//! Line-level token substitution.

use regex::bytes::{NoExpand, Regex};

use super::NewlineMode;

/// Build the matcher for a literal source token.
pub(crate) fn token_pattern(token: &str) -> Result<Regex, regex::Error> {
    Regex::new(&regex::escape(token))
}

/// Rewrite every line of `content` that contains `pattern`, replacing all
/// matches on that line with `replacement`.
///
/// Returns the new content and the number of lines that matched.
///
/// In [`NewlineMode::Terminate`] every output line ends in `\n` and `\r\n`
/// endings are folded to `\n`, so a file without a trailing newline gains
/// one. [`NewlineMode::Preserve`] keeps line endings byte-for-byte.
pub fn rewrite_lines(
    content: &[u8],
    pattern: &Regex,
    replacement: &[u8],
    mode: NewlineMode,
) -> (Vec<u8>, usize) {
    let mut output = Vec::with_capacity(content.len() + 1);
    let mut matched = 0;

    match mode {
        NewlineMode::Terminate => {
            for line in terminated_lines(content) {
                if pattern.is_match(line) {
                    matched += 1;
                    output.extend_from_slice(&pattern.replace_all(line, NoExpand(replacement)));
                } else {
                    output.extend_from_slice(line);
                }
                output.push(b'\n');
            }
        }
        NewlineMode::Preserve => {
            for chunk in content.split_inclusive(|b| *b == b'\n') {
                if pattern.is_match(chunk) {
                    matched += 1;
                    output.extend_from_slice(&pattern.replace_all(chunk, NoExpand(replacement)));
                } else {
                    output.extend_from_slice(chunk);
                }
            }
        }
    }

    (output, matched)
}

/// Lines without their terminators. A final `\n` does not start an empty
/// trailing line.
fn terminated_lines(content: &[u8]) -> impl Iterator<Item = &[u8]> {
    let body = content.strip_suffix(b"\n").unwrap_or(content);
    let empty = content.is_empty();
    body.split(|b| *b == b'\n')
        .filter(move |_| !empty)
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
}
