//! A small reader for the subset of HCL that Terraform configurations use.
//!
//! Literals (strings, numbers, booleans, null, lists, objects) are decoded;
//! anything else (references, function calls, conditionals) is kept as the
//! raw expression text. That is enough for static policy checks, which only
//! ever compare literal values.

/// A decoded attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Number(f64),
    Bool(bool),
    Null,
    List(Vec<Value>),
    Object(Vec<(String, Value)>),
    /// A string with `${…}` or `%{…}` sequences, only known at plan time.
    /// Escaped `$${` and `%%{` do not make a template.
    Template(String),
    /// A non-literal expression, verbatim.
    Expression(String),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&[(String, Value)]> {
        match self {
            Value::Object(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn as_expression(&self) -> Option<&str> {
        match self {
            Value::Expression(expr) => Some(expr),
            _ => None,
        }
    }

    pub fn is_expression(&self) -> bool {
        matches!(self, Value::Expression(_))
    }

    /// Raw text of a value that cannot be read statically.
    pub fn as_unresolved(&self) -> Option<&str> {
        match self {
            Value::Expression(text) | Value::Template(text) => Some(text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub key: String,
    pub value: Value,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub kind: String,
    pub labels: Vec<String>,
    pub body: Body,
    pub line: usize,
}

/// Attributes and nested blocks, in source order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Body {
    pub attributes: Vec<Attribute>,
    pub blocks: Vec<Block>,
}

impl Body {
    pub fn attr(&self, key: &str) -> Option<&Value> {
        self.attributes
            .iter()
            .rev()
            .find(|a| a.key == key)
            .map(|a| &a.value)
    }

    pub fn block(&self, kind: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.kind == kind)
    }

    pub fn blocks<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a Block> + 'a {
        self.blocks.iter().filter(move |b| b.kind == kind)
    }

    /// Follow nested blocks, then read an attribute: `path(&["a", "b"], "c")`.
    pub fn nested_attr(&self, blocks: &[&str], key: &str) -> Option<&Value> {
        let mut body = self;
        for kind in blocks {
            body = &body.block(kind)?.body;
        }
        body.attr(key)
    }
}

/// HCL that could not be read.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("line {line}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

/// Parse an HCL document.
pub fn parse(source: &str) -> Result<Body, ParseError> {
    let mut parser = Parser::new(source);
    parser.body(false)
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
    line: usize,
}

impl Parser {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
        }
    }

    // =========================================================================
    // Cursor helpers
    // =========================================================================

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            line: self.line,
            message: message.into(),
        }
    }

    fn at_comment(&self) -> bool {
        matches!(
            (self.peek(), self.peek_at(1)),
            (Some('#'), _) | (Some('/'), Some('/')) | (Some('/'), Some('*'))
        )
    }

    fn skip_comment(&mut self) -> Result<(), ParseError> {
        match (self.peek(), self.peek_at(1)) {
            (Some('/'), Some('*')) => {
                self.pos += 2;
                loop {
                    match self.peek() {
                        None => return Err(self.error("unterminated block comment")),
                        Some('*') if self.peek_at(1) == Some('/') => {
                            self.pos += 2;
                            return Ok(());
                        }
                        Some(_) => {
                            self.bump();
                        }
                    }
                }
            }
            _ => {
                while let Some(c) = self.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.pos += 1;
                }
                Ok(())
            }
        }
    }

    /// Skip spaces, tabs and comments, stopping at a newline.
    fn skip_inline(&mut self) -> Result<(), ParseError> {
        loop {
            match self.peek() {
                Some(' ' | '\t' | '\r') => self.pos += 1,
                Some('/') if self.peek_at(1) == Some('*') => self.skip_comment()?,
                _ => return Ok(()),
            }
        }
    }

    /// Skip all whitespace, newlines and comments.
    fn skip_all(&mut self) -> Result<(), ParseError> {
        loop {
            match self.peek() {
                Some(' ' | '\t' | '\r' | '\n') => {
                    self.bump();
                }
                _ if self.at_comment() => self.skip_comment()?,
                _ => return Ok(()),
            }
        }
    }

    fn identifier(&mut self) -> Option<String> {
        let start = self.pos;
        match self.peek() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => self.pos += 1,
            _ => return None,
        }
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                self.pos += 1;
            } else {
                break;
            }
        }
        Some(self.chars[start..self.pos].iter().collect())
    }

    // =========================================================================
    // Structure
    // =========================================================================

    fn body(&mut self, nested: bool) -> Result<Body, ParseError> {
        let mut body = Body::default();
        loop {
            self.skip_all()?;
            match self.peek() {
                None if nested => return Err(self.error("unclosed block: expected '}'")),
                None => return Ok(body),
                Some('}') if nested => {
                    self.pos += 1;
                    return Ok(body);
                }
                Some('}') => return Err(self.error("unexpected '}'")),
                _ => {}
            }

            let line = self.line;
            let Some(name) = self.identifier() else {
                return Err(self.error(format!(
                    "expected attribute or block name, found '{}'",
                    self.peek().unwrap_or_default()
                )));
            };
            self.skip_inline()?;

            if self.peek() == Some('=') && self.peek_at(1) != Some('=') {
                self.pos += 1;
                let value = self.expression()?;
                self.skip_inline()?;
                if self.at_comment() {
                    self.skip_comment()?;
                }
                match self.peek() {
                    None | Some('\n') | Some('}') => {}
                    Some(c) => {
                        return Err(self.error(format!(
                            "unexpected '{}' after value of '{}'",
                            c, name
                        )));
                    }
                }
                body.attributes.push(Attribute {
                    key: name,
                    value,
                    line,
                });
                continue;
            }

            let mut labels = Vec::new();
            loop {
                match self.peek() {
                    Some('"') => {
                        self.pos += 1;
                        labels.push(self.quoted()?.0);
                    }
                    Some('{') => break,
                    _ => match self.identifier() {
                        Some(label) => labels.push(label),
                        None => {
                            return Err(self.error(format!(
                                "expected '=' or '{{' after '{}'",
                                name
                            )));
                        }
                    },
                }
                self.skip_inline()?;
            }
            self.pos += 1;
            let inner = self.body(true)?;
            body.blocks.push(Block {
                kind: name,
                labels,
                body: inner,
                line,
            });
        }
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    fn at_expression_end(&self) -> bool {
        match self.peek() {
            None => true,
            Some('\n' | ',' | ']' | '}' | ')') => true,
            _ => self.at_comment(),
        }
    }

    fn expression(&mut self) -> Result<Value, ParseError> {
        self.skip_inline()?;
        let (start, start_line) = (self.pos, self.line);

        if let Some(value) = self.literal()? {
            let save = self.pos;
            self.skip_inline()?;
            if self.at_expression_end() {
                return Ok(value);
            }
            self.pos = save;
        }

        // Not a plain literal: rescan as raw expression text.
        self.pos = start;
        self.line = start_line;
        self.raw_expression()
    }

    fn literal(&mut self) -> Result<Option<Value>, ParseError> {
        match self.peek() {
            Some('"') => {
                self.pos += 1;
                let (text, interpolated) = self.quoted()?;
                Ok(Some(if interpolated {
                    Value::Template(text)
                } else {
                    Value::String(text)
                }))
            }
            Some('<') if self.peek_at(1) == Some('<') => self.heredoc().map(Some),
            Some(open @ ('[' | '{')) => {
                // `for` expressions and the like are not literals; let the
                // raw scanner take them.
                let (start, line) = (self.pos, self.line);
                let parsed = if open == '[' { self.list() } else { self.object() };
                match parsed {
                    Ok(value) => Ok(Some(value)),
                    Err(_) => {
                        self.pos = start;
                        self.line = line;
                        Ok(None)
                    }
                }
            }
            Some(c) if c.is_ascii_digit() => Ok(self.number()),
            Some('-') if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) => Ok(self.number()),
            Some(c) if c.is_ascii_alphabetic() => {
                let start = self.pos;
                let word = self.identifier().unwrap_or_default();
                let value = match word.as_str() {
                    "true" => Some(Value::Bool(true)),
                    "false" => Some(Value::Bool(false)),
                    "null" => Some(Value::Null),
                    _ => None,
                };
                if value.is_none() || matches!(self.peek(), Some('.' | '(' | '[')) {
                    self.pos = start;
                    return Ok(None);
                }
                Ok(value)
            }
            _ => Ok(None),
        }
    }

    fn number(&mut self) -> Option<Value> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.pos += 1;
        }
        while let Some(c) = self.peek() {
            let exponent_sign =
                (c == '+' || c == '-') && matches!(self.chars.get(self.pos - 1), Some('e' | 'E'));
            if c.is_ascii_digit() || c == '.' || c == 'e' || c == 'E' || exponent_sign {
                self.pos += 1;
            } else {
                break;
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        match text.parse::<f64>() {
            Ok(n) => Some(Value::Number(n)),
            Err(_) => {
                self.pos = start;
                None
            }
        }
    }

    /// Read a quoted string; the opening quote is already consumed. The flag
    /// is set when the string holds a real template sequence.
    fn quoted(&mut self) -> Result<(String, bool), ParseError> {
        let mut out = String::new();
        let mut interpolated = false;
        loop {
            match self.peek() {
                None | Some('\n') => return Err(self.error("unterminated string")),
                Some('"') => {
                    self.pos += 1;
                    return Ok((out, interpolated));
                }
                Some('\\') => {
                    self.pos += 1;
                    let escaped = match self.bump() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('"') => '"',
                        Some('\\') => '\\',
                        Some(c) => {
                            return Err(self.error(format!("invalid escape sequence '\\{}'", c)));
                        }
                        None => return Err(self.error("unterminated string")),
                    };
                    out.push(escaped);
                }
                Some(c @ ('$' | '%')) if self.peek_at(1) == Some(c) && self.peek_at(2) == Some('{') => {
                    // `$${` and `%%{` are literal `${` and `%{`.
                    self.pos += 3;
                    out.push(c);
                    out.push('{');
                }
                Some('$' | '%') if self.peek_at(1) == Some('{') => {
                    // Template sequence, kept verbatim.
                    interpolated = true;
                    let mut depth = 0usize;
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            return Err(self.error("unterminated template sequence"));
                        }
                        self.pos += 1;
                        out.push(c);
                        match c {
                            '{' => depth += 1,
                            '}' => {
                                depth -= 1;
                                if depth == 0 {
                                    break;
                                }
                            }
                            _ => {}
                        }
                    }
                    if depth != 0 {
                        return Err(self.error("unterminated template sequence"));
                    }
                }
                Some(c) => {
                    self.pos += 1;
                    out.push(c);
                }
            }
        }
    }

    fn heredoc(&mut self) -> Result<Value, ParseError> {
        self.pos += 2;
        let indented = self.peek() == Some('-');
        if indented {
            self.pos += 1;
        }
        let Some(marker) = self.identifier() else {
            return Err(self.error("expected heredoc marker"));
        };
        self.skip_inline()?;
        if self.bump() != Some('\n') {
            return Err(self.error("expected newline after heredoc marker"));
        }

        let mut lines = Vec::new();
        loop {
            if self.peek().is_none() {
                return Err(self.error(format!("unterminated heredoc, expected '{}'", marker)));
            }
            let start = self.pos;
            while let Some(c) = self.peek() {
                if c == '\n' {
                    break;
                }
                self.pos += 1;
            }
            let line: String = self.chars[start..self.pos].iter().collect();
            if line.trim() == marker {
                let (text, interpolated) = heredoc_template(&join_heredoc(&lines, indented));
                return Ok(if interpolated {
                    Value::Template(text)
                } else {
                    Value::String(text)
                });
            }
            lines.push(line);
            self.bump();
        }
    }

    fn list(&mut self) -> Result<Value, ParseError> {
        self.pos += 1;
        let mut items = Vec::new();
        loop {
            self.skip_all()?;
            if self.peek() == Some(']') {
                self.pos += 1;
                return Ok(Value::List(items));
            }
            if self.peek().is_none() {
                return Err(self.error("unclosed list: expected ']'"));
            }
            items.push(self.expression()?);
            self.skip_all()?;
            match self.peek() {
                Some(',') => self.pos += 1,
                Some(']') => {}
                _ => return Err(self.error("expected ',' or ']' in list")),
            }
        }
    }

    fn object(&mut self) -> Result<Value, ParseError> {
        self.pos += 1;
        let mut entries = Vec::new();
        loop {
            self.skip_all()?;
            match self.peek() {
                Some('}') => {
                    self.pos += 1;
                    return Ok(Value::Object(entries));
                }
                None => return Err(self.error("unclosed object: expected '}'")),
                Some('"') => {
                    self.pos += 1;
                    let key = self.quoted()?.0;
                    entries.push((key, Value::Null));
                }
                _ => match self.identifier() {
                    Some(key) => entries.push((key, Value::Null)),
                    None => return Err(self.error("expected object key")),
                },
            }
            self.skip_inline()?;
            match self.peek() {
                Some('=' | ':') => self.pos += 1,
                _ => return Err(self.error("expected '=' or ':' after object key")),
            }
            let value = self.expression()?;
            if let Some(entry) = entries.last_mut() {
                entry.1 = value;
            }
            self.skip_inline()?;
            if self.peek() == Some(',') {
                self.pos += 1;
            }
        }
    }

    /// Consume an arbitrary expression up to the end of the value.
    fn raw_expression(&mut self) -> Result<Value, ParseError> {
        let start = self.pos;
        let mut depth = 0usize;
        while let Some(c) = self.peek() {
            match c {
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' if depth == 0 => break,
                ')' | ']' | '}' => depth -= 1,
                '\n' | ',' if depth == 0 => break,
                '#' if depth == 0 => break,
                '/' if depth == 0 && matches!(self.peek_at(1), Some('/' | '*')) => break,
                '"' => {
                    self.pos += 1;
                    self.quoted()?;
                    continue;
                }
                _ => {}
            }
            self.bump();
        }
        if depth != 0 {
            return Err(self.error("unbalanced brackets in expression"));
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        let text = text.trim();
        if text.is_empty() {
            return Err(self.error("expected a value"));
        }
        Ok(Value::Expression(text.to_string()))
    }
}

/// Unescape `$${` and `%%{` in heredoc text and report whether any
/// unescaped template sequence remains.
fn heredoc_template(text: &str) -> (String, bool) {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut interpolated = false;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if matches!(c, '$' | '%') && chars.get(i + 1) == Some(&c) && chars.get(i + 2) == Some(&'{') {
            out.push(c);
            out.push('{');
            i += 3;
            continue;
        }
        if matches!(c, '$' | '%') && chars.get(i + 1) == Some(&'{') {
            interpolated = true;
        }
        out.push(c);
        i += 1;
    }
    (out, interpolated)
}

fn join_heredoc(lines: &[String], indented: bool) -> String {
    if !indented {
        return lines.iter().map(|l| format!("{}\n", l)).collect();
    }
    let indent = lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);
    lines
        .iter()
        .map(|l| format!("{}\n", l.get(indent..).unwrap_or("").trim_end_matches('\r')))
        .collect()
}
