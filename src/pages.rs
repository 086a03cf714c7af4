//! Page selector parsing.
//!
//! A selector is a comma-separated list of tokens, each either a single
//! 1-based page number (`"7"`) or an inclusive range (`"2-5"`). Ranges may
//! run backwards: `"5-3"` yields `[5, 4, 3]`, which is how callers express
//! reordering without listing every page. Duplicates are allowed and
//! preserved.
//!
//! Parsing is purely syntactic. Whether a page actually exists in its source
//! document is checked during assembly, where the real page count is known.

use crate::error::{Error, Result};

/// Parse a page selector into an ordered page sequence.
///
/// The empty string parses to an empty sequence; callers that distinguish an
/// *absent* selector from an empty one do so before calling (an absent
/// selector means "all pages" and never reaches the parser).
///
/// # Errors
///
/// Returns [`Error::InvalidPageRange`] naming the offending token for any
/// token that is not `DIGITS` or `DIGITS-DIGITS`, including the empty tokens
/// produced by leading, trailing or doubled commas.
///
/// # Examples
///
/// ```
/// use docsplice::pages::parse_page_list;
///
/// assert_eq!(parse_page_list("1,3,2").unwrap(), vec![1, 3, 2]);
/// assert_eq!(parse_page_list("5-3,1").unwrap(), vec![5, 4, 3, 1]);
/// assert_eq!(parse_page_list("").unwrap(), Vec::<u32>::new());
/// assert!(parse_page_list("1,,2").is_err());
/// ```
pub fn parse_page_list(spec: &str) -> Result<Vec<u32>> {
    if spec.is_empty() {
        return Ok(Vec::new());
    }

    let mut result = Vec::new();

    for token in spec.split(',') {
        if is_digits(token) {
            result.push(parse_number(token, token)?);
        } else if let Some((first, last)) = token.split_once('-') {
            if !is_digits(first) || !is_digits(last) {
                return Err(invalid(token));
            }
            let first = parse_number(first, token)?;
            let last = parse_number(last, token)?;
            if first <= last {
                result.extend(first..=last);
            } else {
                result.extend((last..=first).rev());
            }
        } else {
            return Err(invalid(token));
        }
    }

    Ok(result)
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn invalid(token: &str) -> Error {
    Error::InvalidPageRange {
        token: token.to_string(),
    }
}

/// Parse an all-digit string, blaming `token` on overflow.
fn parse_number(digits: &str, token: &str) -> Result<u32> {
    digits.parse().map_err(|_| invalid(token))
}
