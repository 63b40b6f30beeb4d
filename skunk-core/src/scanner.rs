//! Comment and literal stripping for C signature text
//!
//! Global invariants enforced:
//! - Total function: never fails, malformed input only produces warnings
//! - Delimiters inside string/char literals never start a comment
//! - Inputs without any comment or literal marker are returned borrowed

use std::borrow::Cow;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Normal,
    BlockComment,
    LineComment,
    Literal(char),
}

/// Remove `/* */` and `//` comments from `input`
///
/// With `strip_literals`, string and character literals are removed as
/// well, quotes included. Without it they are copied verbatim but still
/// scanned, so `"a/*b"` is not mistaken for the start of a comment.
///
/// Line comments lose their text but keep the terminating newline.
pub fn strip_comments(input: &str, strip_literals: bool) -> Cow<'_, str> {
    let may_have_comments = input.contains("/*") || input.contains("//");
    let may_have_literals = strip_literals && (input.contains('"') || input.contains('\''));
    if !may_have_comments && !may_have_literals {
        return Cow::Borrowed(input);
    }

    let keep_literals = !strip_literals;
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut state = State::Normal;

    while let Some(c) = chars.next() {
        match state {
            State::Normal => match c {
                '/' => match chars.peek() {
                    Some('*') => {
                        chars.next();
                        state = State::BlockComment;
                    }
                    Some('/') => {
                        chars.next();
                        state = State::LineComment;
                    }
                    _ => out.push(c),
                },
                '"' | '\'' => {
                    if keep_literals {
                        out.push(c);
                    }
                    state = State::Literal(c);
                }
                _ => out.push(c),
            },
            State::BlockComment => {
                if c == '*' {
                    match chars.peek() {
                        Some('/') => {
                            chars.next();
                            state = State::Normal;
                        }
                        Some(_) => {}
                        None => break,
                    }
                }
            }
            State::LineComment => {
                if c == '\n' {
                    out.push(c);
                    state = State::Normal;
                }
            }
            State::Literal(quote) => {
                if keep_literals {
                    out.push(c);
                }
                if c == quote {
                    state = State::Normal;
                } else if c == '\\' {
                    match chars.next() {
                        Some(escaped) => {
                            if keep_literals {
                                out.push(escaped);
                            }
                        }
                        None => {
                            warn!(
                                "possibly malformed escape sequence in {} literal: {}",
                                literal_kind(quote),
                                input
                            );
                            // already reported; skip the unterminated-literal warning
                            return Cow::Owned(out);
                        }
                    }
                }
            }
        }
    }

    match state {
        State::BlockComment => warn!("possibly malformed block comment: {}", input),
        State::Literal(quote) => {
            warn!("possibly non-ending {} literal: {}", literal_kind(quote), input)
        }
        State::Normal | State::LineComment => {}
    }

    Cow::Owned(out)
}

fn literal_kind(quote: char) -> &'static str {
    if quote == '"' {
        "string"
    } else {
        "character"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fast_path_returns_borrowed() {
        let input = "static int foo(int a, char *b)";
        let out = strip_comments(input, true);
        assert!(matches!(out, Cow::Borrowed(_)));
        assert_eq!(out, input);
    }

    #[test]
    fn test_fast_path_ignores_quotes_when_keeping_literals() {
        let input = "int f(char c = 'x')";
        assert!(matches!(strip_comments(input, false), Cow::Borrowed(_)));
    }

    #[test]
    fn test_trailing_block_comment_removed() {
        assert_eq!(strip_comments("int f()/* x */", true), "int f()");
    }

    #[test]
    fn test_block_comment_inside_signature() {
        assert_eq!(
            strip_comments("int /* return */ f(int a /* first */, int b)", false),
            "int  f(int a , int b)"
        );
    }

    #[test]
    fn test_line_comment_keeps_newline() {
        assert_eq!(
            strip_comments("int f(int a, // the a\n      int b)", false),
            "int f(int a, \n      int b)"
        );
    }

    #[test]
    fn test_line_comment_at_end_of_input() {
        assert_eq!(strip_comments("int f() // trailing", false), "int f() ");
    }

    #[test]
    fn test_comment_marker_inside_string_kept_as_literal() {
        assert_eq!(strip_comments("x(\"a/*b\")", false), "x(\"a/*b\")");
    }

    #[test]
    fn test_string_literal_removed_when_requested() {
        assert_eq!(strip_comments("x(\"a/*b\")", true), "x()");
    }

    #[test]
    fn test_char_literal_with_escape() {
        assert_eq!(strip_comments("f('\\'', 1) /* c */", true), "f(, 1) ");
        assert_eq!(strip_comments("f('\\'', 1) /* c */", false), "f('\\'', 1) ");
    }

    #[test]
    fn test_escaped_quote_does_not_end_string() {
        assert_eq!(strip_comments("a \"x\\\"//y\" b", true), "a  b");
    }

    #[test]
    fn test_lone_slashes_are_copied() {
        assert_eq!(strip_comments("a / b // c", false), "a / b ");
        assert_eq!(strip_comments("a /* c */ /", false), "a  /");
    }

    #[test]
    fn test_unterminated_block_comment_copies_nothing_further() {
        assert_eq!(strip_comments("int f() /* oops", true), "int f() ");
        assert_eq!(strip_comments("int f() /* oops *", true), "int f() ");
    }

    #[test]
    fn test_unterminated_literal_is_not_fatal() {
        assert_eq!(strip_comments("f(\"abc", true), "f(");
        assert_eq!(strip_comments("f(\"abc", false), "f(\"abc");
    }

    #[test]
    fn test_escape_at_end_of_input_is_not_fatal() {
        assert_eq!(strip_comments("f('\\", true), "f(");
        assert_eq!(strip_comments("f('\\", false), "f('\\");
    }

    #[test]
    fn test_multibyte_text_survives() {
        assert_eq!(strip_comments("int größe(void) /* ü */", true), "int größe(void) ");
    }
}
