//! Minimal XML element tree and writer for domain descriptions.

use std::fmt::Write;

use crate::errors::{RunvmError, RunvmResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// An XML element with ordered attributes and children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: String,
    attrs: Vec<(String, String)>,
    children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.attrs.push((name.into(), value.to_string()));
        self
    }

    pub fn child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = Element>) -> Self {
        self.children.extend(children.into_iter().map(Node::Element));
        self
    }

    pub fn text(mut self, text: impl ToString) -> Self {
        self.children.push(Node::Text(text.to_string()));
        self
    }

    pub fn push(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Child elements with the given name, in document order.
    pub fn find_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter_map(move |node| match node {
            Node::Element(e) if e.name == name => Some(e),
            _ => None,
        })
    }

    /// First child element with the given name.
    pub fn find(&self, name: &str) -> Option<&Element> {
        self.children.iter().find_map(|node| match node {
            Node::Element(e) if e.name == name => Some(e),
            _ => None,
        })
    }

    /// Concatenated text content of direct text children.
    pub fn text_content(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                Node::Text(t) => Some(t.as_str()),
                Node::Element(_) => None,
            })
            .collect()
    }

    /// Serialize with two-space indentation.
    pub fn to_xml(&self) -> RunvmResult<String> {
        let mut out = String::new();
        self.write(&mut out, 0)?;
        Ok(out)
    }

    fn write(&self, out: &mut String, depth: usize) -> RunvmResult<()> {
        check_name(&self.name)?;
        let indent = "  ".repeat(depth);

        write!(out, "{indent}<{}", self.name).map_err(marshal)?;
        for (name, value) in &self.attrs {
            check_name(name)?;
            write!(out, " {}=\"{}\"", name, escape(value)).map_err(marshal)?;
        }

        if self.children.is_empty() {
            out.push_str("/>\n");
            return Ok(());
        }

        let text_only = self.children.iter().all(|c| matches!(c, Node::Text(_)));
        if text_only {
            writeln!(out, ">{}</{}>", escape(&self.text_content()), self.name)
                .map_err(marshal)?;
            return Ok(());
        }

        out.push_str(">\n");
        for node in &self.children {
            match node {
                Node::Element(e) => e.write(out, depth + 1)?,
                Node::Text(t) => {
                    writeln!(out, "{indent}  {}", escape(t)).map_err(marshal)?;
                }
            }
        }
        writeln!(out, "{indent}</{}>", self.name).map_err(marshal)?;
        Ok(())
    }
}

fn marshal(e: std::fmt::Error) -> RunvmError {
    RunvmError::Marshal(e.to_string())
}

fn check_name(name: &str) -> RunvmResult<()> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ':'));
    if valid_start && valid_rest {
        Ok(())
    } else {
        Err(RunvmError::Marshal(format!("invalid XML name {name:?}")))
    }
}

/// Escape text for use in element content or a double-quoted attribute.
pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}
