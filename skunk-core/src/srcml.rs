//! srcML document access
//!
//! srcML encodes C source as XML without losing any characters: the text
//! content of a `unit` element is the original source file. Element names
//! are matched on their local name so documents with and without the srcML
//! namespace declarations behave the same.

use crate::files::{BlankLines, FileId};
use anyhow::{Context, Result};
use roxmltree::{Document, Node};
use std::path::{Path, PathBuf};

/// Lines the transducer emits before the first source line (the XML declaration)
const XML_PROLOGUE_LINES: u32 = 1;

/// A srcML file read from disk, not yet analyzed
#[derive(Debug, Clone)]
pub struct SrcMlUnit {
    path: PathBuf,
    file: FileId,
    xml: String,
}

impl SrcMlUnit {
    /// Read and validate a srcML file
    pub fn load(path: &Path) -> Result<Self> {
        let xml = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read srcML file: {}", path.display()))?;
        Self::from_xml(xml, path)
    }

    /// Build a unit from XML text; `origin` names the file when the unit
    /// carries no `filename` attribute
    pub fn from_xml(xml: String, origin: &Path) -> Result<Self> {
        let file = {
            let doc = parse_document(&xml, origin)?;
            let root = doc.root_element();
            if !is_element(root, "unit") {
                anyhow::bail!(
                    "not a srcML unit (root element <{}>): {}",
                    root.tag_name().name(),
                    origin.display()
                );
            }
            match root.attribute("filename") {
                Some(name) if !name.trim().is_empty() => FileId::new(name),
                _ => FileId::from_path(origin),
            }
        };
        Ok(SrcMlUnit {
            path: origin.to_path_buf(),
            file,
            xml,
        })
    }

    /// Path of the XML file this unit was read from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Identity of the C file the unit describes
    pub fn file(&self) -> &FileId {
        &self.file
    }

    pub fn xml(&self) -> &str {
        &self.xml
    }

    /// Parse the XML into a borrowed document tree
    pub fn document(&self) -> Result<Document<'_>> {
        parse_document(&self.xml, &self.path)
    }

    /// Blank lines of the C source encoded by this unit
    pub fn blank_lines(&self) -> Result<BlankLines> {
        Ok(blank_lines_of(&self.document()?))
    }
}

fn parse_document<'i>(xml: &'i str, origin: &Path) -> Result<Document<'i>> {
    Document::parse(xml).with_context(|| format!("Malformed srcML in {}", origin.display()))
}

/// True if `node` is an element with the given local name
pub fn is_element(node: Node<'_, '_>, name: &str) -> bool {
    node.is_element() && node.tag_name().name() == name
}

/// First child element with the given local name
pub fn child<'a, 'i>(node: Node<'a, 'i>, name: &str) -> Option<Node<'a, 'i>> {
    node.children().find(|n| is_element(*n, name))
}

/// All child elements with the given local name, in document order
pub fn children<'a, 'i: 'a>(
    node: Node<'a, 'i>,
    name: &'a str,
) -> impl Iterator<Item = Node<'a, 'i>> + 'a {
    node.children().filter(move |n| is_element(*n, name))
}

/// Follow a `/`-separated path of child element names, e.g. `decl/type`
pub fn select<'a, 'i>(node: Node<'a, 'i>, path: &str) -> Option<Node<'a, 'i>> {
    path.split('/')
        .filter(|step| !step.is_empty())
        .try_fold(node, |current, step| child(current, step))
}

/// Concatenated text of all descendant text nodes
pub fn text_content(node: Node<'_, '_>) -> String {
    if node.is_text() {
        return node.text().unwrap_or_default().to_string();
    }
    node.descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect()
}

/// Text of `node` with `comment` elements left out
pub fn code_text(node: Node<'_, '_>) -> String {
    if node.is_text() {
        return node.text().unwrap_or_default().to_string();
    }
    let mut out = String::new();
    push_code_text(node, &mut out);
    out
}

fn push_code_text(node: Node<'_, '_>, out: &mut String) {
    for n in node.children() {
        if n.is_text() {
            out.push_str(n.text().unwrap_or_default());
        } else if n.is_element() && !is_element(n, "comment") {
            push_code_text(n, out);
        }
    }
}

/// Blank lines of the C source encoded by a parsed unit
pub fn blank_lines_of(doc: &Document<'_>) -> BlankLines {
    BlankLines::from_source(&text_content(doc.root_element()))
}

/// All `function` definition elements of a document, in document order
pub fn function_nodes<'a, 'i>(doc: &'a Document<'i>) -> impl Iterator<Item = Node<'a, 'i>> + 'a {
    doc.root_element()
        .descendants()
        .filter(|n| is_element(*n, "function"))
}

/// 1-based line of the C source where `node` starts
pub fn source_line_of(node: Node<'_, '_>) -> u32 {
    let pos = node.document().text_pos_at(node.range().start);
    pos.row.saturating_sub(XML_PROLOGUE_LINES)
}

/// 1-based line of the C source where `node` ends
pub fn source_end_line_of(node: Node<'_, '_>) -> u32 {
    let pos = node.document().text_pos_at(node.range().end);
    pos.row.saturating_sub(XML_PROLOGUE_LINES)
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNIT: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<unit xmlns="http://www.srcML.org/srcML/src" xmlns:cpp="http://www.srcML.org/srcML/cpp" revision="1.0.0" language="C" filename="./src/util.c"><function><type><name>int</name></type> <name>one</name><parameter_list>(<parameter><decl><type><name>void</name></type></decl></parameter>)</parameter_list>
<block>{<block_content>
    <return>return <expr><literal type="number">1</literal></expr>;</return>
</block_content>}</block></function>

<function><type><name>int</name></type> <name>two</name><parameter_list>()</parameter_list> <block>{<block_content> <return>return <expr><literal type="number">2</literal></expr>;</return> </block_content>}</block></function>
</unit>
"#;

    fn unit() -> SrcMlUnit {
        SrcMlUnit::from_xml(UNIT.to_string(), Path::new("util.c.xml")).unwrap()
    }

    #[test]
    fn test_file_id_from_filename_attribute() {
        assert_eq!(unit().file(), &FileId::new("src/util.c"));
    }

    #[test]
    fn test_file_id_falls_back_to_origin() {
        let xml = "<?xml version=\"1.0\"?>\n<unit>int x;</unit>";
        let unit = SrcMlUnit::from_xml(xml.to_string(), Path::new("out/x.c.xml")).unwrap();
        assert_eq!(unit.file(), &FileId::new("out/x.c.xml"));
    }

    #[test]
    fn test_rejects_non_unit_root() {
        let xml = "<?xml version=\"1.0\"?>\n<project/>";
        assert!(SrcMlUnit::from_xml(xml.to_string(), Path::new("p.xml")).is_err());
    }

    #[test]
    fn test_rejects_malformed_xml() {
        let xml = "<?xml version=\"1.0\"?>\n<unit><function></unit>";
        assert!(SrcMlUnit::from_xml(xml.to_string(), Path::new("bad.xml")).is_err());
    }

    #[test]
    fn test_function_lines() {
        let unit = unit();
        let doc = unit.document().unwrap();
        let functions: Vec<_> = function_nodes(&doc).collect();
        assert_eq!(functions.len(), 2);
        assert_eq!(source_line_of(functions[0]), 1);
        assert_eq!(source_end_line_of(functions[0]), 4);
        assert_eq!(source_line_of(functions[1]), 6);
        assert_eq!(source_end_line_of(functions[1]), 6);
    }

    #[test]
    fn test_select_and_text_content() {
        let unit = unit();
        let doc = unit.document().unwrap();
        let first = function_nodes(&doc).next().unwrap();
        let param_type = select(first, "parameter_list/parameter/decl/type").unwrap();
        assert_eq!(text_content(param_type), "void");
        assert!(select(first, "parameter_list/param").is_none());
        assert_eq!(children(first, "name").count(), 1);
    }

    #[test]
    fn test_code_text_skips_comments() {
        let xml = "<type><specifier>const</specifier> <comment type=\"block\">/* in */</comment> <name>char</name> <modifier>*</modifier></type>";
        let doc = Document::parse(xml).unwrap();
        let root = doc.root_element();
        assert_eq!(code_text(root), "const  char *");
        assert_eq!(text_content(root), "const /* in */ char *");
    }

    #[test]
    fn test_blank_lines_of_unit() {
        let blanks = unit().blank_lines().unwrap();
        assert!(blanks.contains(5));
        assert!(!blanks.contains(4));
    }
}
