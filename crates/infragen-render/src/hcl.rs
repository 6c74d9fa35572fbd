//! Minimal HCL writer.
//!
//! Produces `terraform fmt`-shaped output: two-space indentation, aligned
//! `=` signs within runs of consecutive attributes, quoted strings and bare
//! numbers and booleans.

use serde_json::Value;

/// An HCL expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Str(String),
    Number(serde_json::Number),
    Bool(bool),
    Null,
    /// Emitted verbatim (references, type constraints, function calls).
    Raw(String),
    List(Vec<Expr>),
    Map(Vec<(String, Expr)>),
}

impl Expr {
    pub fn raw(expr: impl Into<String>) -> Self {
        Expr::Raw(expr.into())
    }

    pub fn string_list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Expr::List(items.into_iter().map(|s| Expr::Str(s.into())).collect())
    }

    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Expr::Null,
            Value::Bool(b) => Expr::Bool(*b),
            Value::Number(n) => Expr::Number(n.clone()),
            Value::String(s) => Expr::Str(s.clone()),
            Value::Array(items) => Expr::List(items.iter().map(Expr::from_json).collect()),
            Value::Object(map) => Expr::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), Expr::from_json(v)))
                    .collect(),
            ),
        }
    }

    fn is_multiline(&self) -> bool {
        match self {
            Expr::Map(entries) => !entries.is_empty(),
            Expr::List(items) => items.iter().any(Expr::is_multiline),
            _ => false,
        }
    }

    fn write(&self, out: &mut String, indent: usize) {
        match self {
            Expr::Str(s) => write_string(out, s),
            Expr::Number(n) => out.push_str(&n.to_string()),
            Expr::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Expr::Null => out.push_str("null"),
            Expr::Raw(raw) => out.push_str(raw),
            Expr::List(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    item.write(out, indent);
                }
                out.push(']');
            }
            Expr::Map(entries) if entries.is_empty() => out.push_str("{}"),
            Expr::Map(entries) => {
                out.push_str("{\n");
                let keys: Vec<String> = entries.iter().map(|(k, _)| object_key(k)).collect();
                let width = keys.iter().map(String::len).max().unwrap_or(0);
                for (key, (_, value)) in keys.iter().zip(entries) {
                    push_indent(out, indent + 1);
                    out.push_str(&format!("{:<width$} = ", key, width = width));
                    value.write(out, indent + 1);
                    out.push('\n');
                }
                push_indent(out, indent);
                out.push('}');
            }
        }
    }
}

impl From<&str> for Expr {
    fn from(value: &str) -> Self {
        Expr::Str(value.to_string())
    }
}

impl From<String> for Expr {
    fn from(value: String) -> Self {
        Expr::Str(value)
    }
}

impl From<&String> for Expr {
    fn from(value: &String) -> Self {
        Expr::Str(value.clone())
    }
}

impl From<bool> for Expr {
    fn from(value: bool) -> Self {
        Expr::Bool(value)
    }
}

impl From<u64> for Expr {
    fn from(value: u64) -> Self {
        Expr::Number(value.into())
    }
}

impl From<u32> for Expr {
    fn from(value: u32) -> Self {
        Expr::Number(value.into())
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Item {
    Attr(String, Expr),
    Block(Block),
    Blank,
}

/// An HCL block with optional labels.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    kind: String,
    labels: Vec<String>,
    items: Vec<Item>,
}

impl Block {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            labels: Vec::new(),
            items: Vec::new(),
        }
    }

    /// `resource "<type>" "<name>"`
    pub fn resource(resource_type: &str, name: &str) -> Self {
        Self::new("resource").label(resource_type).label(name)
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
    }

    pub fn attr(mut self, key: impl Into<String>, value: impl Into<Expr>) -> Self {
        self.items.push(Item::Attr(key.into(), value.into()));
        self
    }

    pub fn attr_opt(self, key: impl Into<String>, value: Option<impl Into<Expr>>) -> Self {
        match value {
            Some(value) => self.attr(key, value),
            None => self,
        }
    }

    pub fn block(mut self, block: Block) -> Self {
        self.items.push(Item::Block(block));
        self
    }

    /// Insert an empty line, as `terraform fmt` keeps between groups.
    pub fn blank(mut self) -> Self {
        self.items.push(Item::Blank);
        self
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        self.write(&mut out, 0);
        out
    }

    fn write(&self, out: &mut String, indent: usize) {
        push_indent(out, indent);
        out.push_str(&self.kind);
        for label in &self.labels {
            out.push(' ');
            write_string(out, label);
        }
        if self.items.is_empty() {
            out.push_str(" {}\n");
            return;
        }
        out.push_str(" {\n");

        let mut i = 0;
        while i < self.items.len() {
            match &self.items[i] {
                Item::Attr(..) => {
                    // Align the run of consecutive attributes; a multi-line
                    // value closes the run.
                    let start = i;
                    while i < self.items.len() {
                        match &self.items[i] {
                            Item::Attr(_, value) => {
                                i += 1;
                                if value.is_multiline() {
                                    break;
                                }
                            }
                            _ => break,
                        }
                    }
                    let run = &self.items[start..i];
                    let width = run
                        .iter()
                        .filter_map(|item| match item {
                            Item::Attr(key, _) => Some(key.len()),
                            _ => None,
                        })
                        .max()
                        .unwrap_or(0);
                    for item in run {
                        if let Item::Attr(key, value) = item {
                            push_indent(out, indent + 1);
                            out.push_str(&format!("{:<width$} = ", key, width = width));
                            value.write(out, indent + 1);
                            out.push('\n');
                        }
                    }
                }
                Item::Block(block) => {
                    block.write(out, indent + 1);
                    i += 1;
                }
                Item::Blank => {
                    out.push('\n');
                    i += 1;
                }
            }
        }

        push_indent(out, indent);
        out.push_str("}\n");
    }
}

/// Render top-level blocks separated by blank lines, with an optional
/// leading comment.
pub fn document(header: Option<&str>, blocks: &[Block]) -> String {
    let mut out = String::new();
    if let Some(header) = header {
        for line in header.lines() {
            out.push_str("# ");
            out.push_str(line);
            out.push('\n');
        }
        out.push('\n');
    }
    let rendered: Vec<String> = blocks.iter().map(Block::render).collect();
    out.push_str(&rendered.join("\n"));
    out
}

/// Convert a resource name into a Terraform local name.
pub fn local_name(name: &str) -> String {
    let mut label: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if !label.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
        label.insert_str(0, "r_");
    }
    label
}

fn object_key(key: &str) -> String {
    let is_identifier = key
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if is_identifier {
        key.to_string()
    } else {
        let mut quoted = String::new();
        write_string(&mut quoted, key);
        quoted
    }
}

fn write_string(out: &mut String, value: &str) {
    out.push('"');
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '$' | '%' if chars.peek() == Some(&'{') => {
                out.push(c);
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

fn push_indent(out: &mut String, indent: usize) {
    for _ in 0..indent {
        out.push_str("  ");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_aligns_consecutive_attributes() {
        let block = Block::resource("aws_s3_bucket", "logs")
            .attr("bucket", "dev-logs")
            .attr("force_destroy", false);
        assert_eq!(
            block.render(),
            "resource \"aws_s3_bucket\" \"logs\" {\n  bucket        = \"dev-logs\"\n  force_destroy = false\n}\n"
        );
    }

    #[test]
    fn test_nested_blocks_and_maps() {
        let block = Block::new("terraform").block(
            Block::new("required_providers").attr(
                "aws",
                Expr::Map(vec![
                    ("source".into(), "hashicorp/aws".into()),
                    ("version".into(), "~> 5.0".into()),
                ]),
            ),
        );
        assert_eq!(
            block.render(),
            "terraform {\n  required_providers {\n    aws = {\n      source  = \"hashicorp/aws\"\n      version = \"~> 5.0\"\n    }\n  }\n}\n"
        );
    }

    #[test]
    fn test_empty_block() {
        assert_eq!(Block::new("filter").render(), "filter {}\n");
    }

    #[test]
    fn test_literals() {
        let block = Block::new("x")
            .attr("n", 90u64)
            .attr("b", true)
            .attr("r", Expr::raw("var.subnet_ids"))
            .attr("l", Expr::string_list(["secrets"]));
        let text = block.render();
        assert!(text.contains("n = 90\n"));
        assert!(text.contains("b = true\n"));
        assert!(text.contains("r = var.subnet_ids\n"));
        assert!(text.contains("l = [\"secrets\"]\n"));
    }

    #[test]
    fn test_string_escaping() {
        let text = Block::new("x").attr("s", "say \"hi\" ${name}").render();
        assert!(text.contains(r#"s = "say \"hi\" $${name}""#));
    }

    #[test]
    fn test_non_identifier_keys_are_quoted() {
        let text = Block::new("x")
            .attr(
                "tags",
                Expr::Map(vec![
                    ("Owner".into(), "a".into()),
                    ("cost center".into(), "b".into()),
                ]),
            )
            .render();
        assert!(text.contains("\"cost center\" = \"b\""));
    }

    #[test]
    fn test_local_name() {
        assert_eq!(local_name("payments-db"), "payments_db");
        assert_eq!(local_name("2logs"), "r_2logs");
    }
}
