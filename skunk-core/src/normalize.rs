//! Canonical whitespace and punctuation form of C function signatures
//!
//! Global invariants enforced:
//! - Pure function of the input text
//! - Idempotent: normalizing a normalized signature is a no-op

/// Normalize a signature string
///
/// - trailing whitespace and backslashes are trimmed
/// - `\` directly followed by a newline is dropped (line continuation)
/// - whitespace runs become a single space, leading whitespace is dropped
/// - no space after `(`, none before `(`, `,` or `)`
/// - exactly one space after `,` and `)`, and on both sides of `*`
pub fn normalize_signature(signature: &str) -> String {
    let trimmed = signature.trim_end_matches(|c: char| c.is_whitespace() || c == '\\');
    let mut out = String::with_capacity(trimmed.len());
    // Last emitted character; a leading space counts as already emitted so
    // leading whitespace is swallowed.
    let mut last = ' ';
    let mut chars = trimmed.chars().peekable();

    while let Some(raw) = chars.next() {
        if raw == '\\' && chars.peek() == Some(&'\n') {
            chars.next();
            continue;
        }
        let c = if raw.is_whitespace() { ' ' } else { raw };
        let mut space_after = false;

        match c {
            ' ' => {
                if last == ' ' || last == '(' {
                    continue;
                }
                out.push(' ');
            }
            '(' => {
                pop_pending_space(&mut out, last);
                out.push('(');
            }
            ',' | ')' => {
                pop_pending_space(&mut out, last);
                out.push(c);
                space_after = true;
            }
            '*' => {
                if last != ' ' {
                    out.push(' ');
                }
                out.push('*');
                space_after = true;
            }
            _ => out.push(c),
        }
        last = c;

        if space_after && chars.peek().is_some() {
            out.push(' ');
            last = ' ';
        }
    }

    out
}

fn pop_pending_space(out: &mut String, last: char) {
    if last == ' ' && out.ends_with(' ') {
        out.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapses_whitespace() {
        assert_eq!(
            normalize_signature("static   int\n\tfoo (int   a)"),
            "static int foo(int a)"
        );
    }

    #[test]
    fn test_pointer_spacing() {
        assert_eq!(
            normalize_signature("static const char *add_setenvif(cmd_parms *cmd, void *mconfig, const char *args)"),
            "static const char * add_setenvif(cmd_parms * cmd, void * mconfig, const char * args)"
        );
    }

    #[test]
    fn test_double_pointer() {
        assert_eq!(normalize_signature("int main(int argc, char**argv)"), "int main(int argc, char * * argv)");
    }

    #[test]
    fn test_spaces_inside_parens_removed() {
        assert_eq!(normalize_signature("int f( int a , int b )"), "int f(int a, int b)");
    }

    #[test]
    fn test_comma_gets_single_space() {
        assert_eq!(normalize_signature("int f(int a,int b)"), "int f(int a, int b)");
    }

    #[test]
    fn test_line_continuation_removed() {
        assert_eq!(normalize_signature("int f(int a,\\\n int b)"), "int f(int a, int b)");
        assert_eq!(normalize_signature("int\\\nf(void)"), "intf(void)");
    }

    #[test]
    fn test_trailing_whitespace_and_backslashes_trimmed() {
        assert_eq!(normalize_signature("int f(void) \\ \n"), "int f(void)");
    }

    #[test]
    fn test_leading_whitespace_dropped() {
        assert_eq!(normalize_signature("\n  int f(void)"), "int f(void)");
    }

    #[test]
    fn test_empty_and_blank() {
        assert_eq!(normalize_signature(""), "");
        assert_eq!(normalize_signature(" \n\t "), "");
    }

    #[test]
    fn test_variadic() {
        assert_eq!(
            normalize_signature("int printf ( const char *fmt , ... )"),
            "int printf(const char * fmt, ...)"
        );
    }

    #[test]
    fn test_function_pointer_parameter() {
        assert_eq!(
            normalize_signature("void qsort(void *base, int (*cmp)(const void *, const void *))"),
            "void qsort(void * base, int( * cmp)(const void *, const void *))"
        );
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "static const char *add_setenvif(cmd_parms *cmd, void *mconfig, const char *args)",
            "int main(int argc, char**argv)",
            "  void   f ( void )  ",
            "void qsort(void *base, int (*cmp)(const void *, const void *))",
            "int f(int a,\\\n int b)",
            "char *",
            "x ( ) , y",
            "a*b",
        ];
        for input in inputs {
            let once = normalize_signature(input);
            let twice = normalize_signature(&once);
            assert_eq!(once, twice, "normalization not idempotent for {:?}", input);
        }
    }
}
