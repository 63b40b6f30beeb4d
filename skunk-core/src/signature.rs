//! Function signature extraction from srcML `function` elements
//!
//! Two strategies:
//! 1. Structural: walk `type`, `name` and `parameter_list` children.
//! 2. Textual fallback: take the function text up to the body's `{`, strip
//!    comments and literals.
//!
//! Global invariants enforced:
//! - Extraction never fails; structural failures fall back to the text
//! - Returned signatures are normalized
//! - `line_count` is at least 1

use crate::files::FileId;
use crate::normalize::normalize_signature;
use crate::scanner::strip_comments;
use crate::srcml::{self, child, code_text, select, source_line_of, text_content};
use roxmltree::Node;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

/// Signature text plus where it sits in the C file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedFunctionSignature {
    text: String,
    start_line: u32,
    line_count: u32,
}

impl ParsedFunctionSignature {
    pub fn new(text: String, start_line: u32, line_count: u32) -> Self {
        ParsedFunctionSignature {
            text,
            start_line,
            line_count: line_count.max(1),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// 1-based line of the function's first token
    pub fn start_line(&self) -> u32 {
        self.start_line
    }

    /// Physical lines the signature spans
    pub fn line_count(&self) -> u32 {
        self.line_count
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

impl fmt::Display for ParsedFunctionSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} /* line {}, {} line(s) */", self.text, self.start_line, self.line_count)
    }
}

/// Why the structural strategy gave up
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureParseError {
    #[error("missing <{0}> element")]
    Missing(&'static str),
}

/// Extract the signature of a srcML `function` element
///
/// `file` is only used for diagnostics.
pub fn extract_signature(function: Node<'_, '_>, file: &FileId) -> ParsedFunctionSignature {
    match parse_structured(function, file) {
        Ok(signature) => {
            debug!("structured signature at {}: {}", file, signature);
            signature
        }
        Err(e) => {
            debug!(
                "falling back to text signature at {}:{}: {}",
                file,
                source_line_of(function),
                e
            );
            parse_text(function, file)
        }
    }
}

/// Structural strategy over the srcML tree
pub fn parse_structured(
    function: Node<'_, '_>,
    file: &FileId,
) -> Result<ParsedFunctionSignature, SignatureParseError> {
    let mut tokens: Vec<String> = Vec::new();

    let return_type = required(function, "type")?;
    required(return_type, "name")?;
    tokens.extend(return_type_tokens(return_type));

    tokens.push(code_text(required(function, "name")?));

    let parameter_list = required(function, "parameter_list")?;
    let mut last_node = parameter_list;
    let mut params = Vec::new();
    for param in parameter_nodes(parameter_list) {
        let (text, last) = parse_parameter(param)?;
        params.push(text);
        last_node = last;
    }

    let signature = format!("{}({})", tokens.join(" "), params.join(", "));
    let start_line = source_line_of(function);
    let end_line = source_line_of(last_node);
    let line_count = clamp_line_count(
        i64::from(end_line) - i64::from(start_line) + 1,
        &signature,
        file,
        start_line,
    );

    Ok(ParsedFunctionSignature::new(
        normalize_signature(&signature),
        start_line,
        line_count,
    ))
}

/// Textual fallback: everything before the body's opening brace
pub fn parse_text(function: Node<'_, '_>, file: &FileId) -> ParsedFunctionSignature {
    let start_line = source_line_of(function);
    let full_text = text_content(function);
    let head = match full_text.find('{') {
        Some(brace) => &full_text[..brace],
        None => {
            warn!(
                "function without opening '{{' at {}:{} (K&R or otherwise unusual definition): {}",
                file, start_line, full_text
            );
            full_text.as_str()
        }
    };

    let stripped = strip_comments(head, true);
    let newlines = head.bytes().filter(|b| *b == b'\n').count();
    let line_count = clamp_line_count(newlines as i64, &stripped, file, start_line);

    ParsedFunctionSignature::new(normalize_signature(&stripped), start_line, line_count)
}

fn required<'a, 'i>(
    node: Node<'a, 'i>,
    name: &'static str,
) -> Result<Node<'a, 'i>, SignatureParseError> {
    child(node, name).ok_or(SignatureParseError::Missing(name))
}

/// `parameter` elements; older srcML releases call them `param`
fn parameter_nodes<'a, 'i: 'a>(list: Node<'a, 'i>) -> impl Iterator<Item = Node<'a, 'i>> + 'a {
    list.children()
        .filter(|n| srcml::is_element(*n, "parameter") || srcml::is_element(*n, "param"))
}

/// Text of one parameter and the last node it consumed
fn parse_parameter<'a, 'i>(
    param: Node<'a, 'i>,
) -> Result<(String, Node<'a, 'i>), SignatureParseError> {
    let decl_type = select(param, "decl/type").ok_or(SignatureParseError::Missing("decl/type"))?;
    let type_text = code_text(decl_type);

    let Some(type_name) = child(decl_type, "name") else {
        // `...` and similar have a type without a name
        return Ok((type_text, decl_type));
    };

    match select(param, "decl/name") {
        Some(param_name) => Ok((
            format!("{} {}", type_text.trim(), code_text(param_name)),
            param_name,
        )),
        None => Ok((type_text, type_name)),
    }
}

/// Specifiers, names and pointer/reference markers of a return type, in order
fn return_type_tokens(type_node: Node<'_, '_>) -> Vec<String> {
    let mut tokens = Vec::new();
    for node in type_node.children() {
        if srcml::is_element(node, "specifier")
            || srcml::is_element(node, "name")
            || srcml::is_element(node, "modifier")
        {
            tokens.push(code_text(node));
        } else if node.is_text() {
            let text = node.text().unwrap_or_default();
            tokens.extend(
                text.chars()
                    .filter(|c| matches!(c, '*' | '&'))
                    .map(String::from),
            );
        }
    }
    tokens
}

fn clamp_line_count(computed: i64, signature: &str, file: &FileId, start_line: u32) -> u32 {
    if computed < 1 {
        warn!(
            "computed signature line count {} for function `{}` at {}:{}; adjusting to 1",
            computed, signature, file, start_line
        );
        return 1;
    }
    u32::try_from(computed).unwrap_or(u32::MAX)
}
