//! Label sets identifying the synthetic series.
//!
//! Labels are given on the command line as `name="value",other="value"`.
//! Values use Go-style quoting: double-quoted with backslash escapes, or
//! back-quoted raw strings.

use std::fmt;

use crate::{Result, UpError};

/// Reserved label carrying the metric name.
pub const METRIC_NAME_LABEL: &str = "__name__";

/// A single `name="value"` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub name: String,
    pub value: String,
}

impl Label {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Ordered labels of the synthetic series.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSet(Vec<Label>);

impl LabelSet {
    pub fn new(labels: Vec<Label>) -> Self {
        Self(labels)
    }

    /// Parse a comma-separated list of `name="value"` pairs.
    ///
    /// Commas inside quoted values do not split pairs.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        split_pairs(raw)
            .into_iter()
            .map(parse_pair)
            .collect::<Result<Vec<_>>>()
            .map(Self)
    }

    /// Append the reserved metric-name label.
    pub fn with_metric_name(mut self, name: &str) -> Self {
        self.0.push(Label::new(METRIC_NAME_LABEL, name));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &Label> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Series selector matching exactly these labels, e.g. `{__name__="up"}`.
    pub fn selector(&self) -> String {
        let matchers: Vec<String> = self
            .0
            .iter()
            .map(|l| format!("{}=\"{}\"", l.name, escape(&l.value)))
            .collect();
        format!("{{{}}}", matchers.join(","))
    }
}

impl fmt::Display for LabelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pairs: Vec<String> = self
            .0
            .iter()
            .map(|l| format!("{}={}", l.name, l.value))
            .collect();
        f.write_str(&pairs.join(", "))
    }
}

/// Whether `name` is a valid label name: `[a-zA-Z_][a-zA-Z0-9_]*`.
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn split_pairs(raw: &str) -> Vec<&str> {
    let mut pairs = Vec::new();
    let mut start = 0;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in raw.char_indices() {
        match quote {
            Some('"') if escaped => escaped = false,
            Some('"') if c == '\\' => escaped = true,
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '`' => quote = Some(c),
            None if c == ',' => {
                pairs.push(&raw[start..i]);
                start = i + 1;
            }
            None => {}
        }
    }
    pairs.push(&raw[start..]);
    pairs
}

fn parse_pair(pair: &str) -> Result<Label> {
    let invalid = |reason: &str| UpError::InvalidLabel {
        label: pair.to_string(),
        reason: reason.to_string(),
    };

    let (name, value) = pair
        .split_once('=')
        .ok_or_else(|| invalid("unrecognized label, expected name=\"value\""))?;
    let name = name.trim();
    if !is_valid_name(name) {
        return Err(invalid("unsupported format for label name"));
    }
    let value = unquote(value.trim()).map_err(|reason| invalid(&reason))?;

    Ok(Label::new(name, value))
}

/// Unquote a double-quoted or back-quoted string.
fn unquote(raw: &str) -> std::result::Result<String, String> {
    if raw.len() >= 2 && raw.starts_with('`') && raw.ends_with('`') {
        let inner = &raw[1..raw.len() - 1];
        if inner.contains('`') {
            return Err("unexpected backquote in raw string".into());
        }
        return Ok(inner.to_string());
    }
    if raw.len() < 2 || !raw.starts_with('"') || !raw.ends_with('"') {
        return Err("label value must be quoted".into());
    }

    let inner = &raw[1..raw.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => return Err("unescaped quote in label value".into()),
            '\\' => {
                let escaped = match chars.next() {
                    Some('n') => '\n',
                    Some('t') => '\t',
                    Some('r') => '\r',
                    Some('\\') => '\\',
                    Some('"') => '"',
                    Some('\'') => '\'',
                    Some('u') => {
                        let hex: String = chars.by_ref().take(4).collect();
                        u32::from_str_radix(&hex, 16)
                            .ok()
                            .filter(|_| hex.len() == 4)
                            .and_then(char::from_u32)
                            .ok_or_else(|| format!("invalid unicode escape \\u{hex}"))?
                    }
                    Some(other) => return Err(format!("invalid escape \\{other}")),
                    None => return Err("trailing backslash in label value".into()),
                };
                out.push(escaped);
            }
            c => out.push(c),
        }
    }
    Ok(out)
}

fn escape(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}
