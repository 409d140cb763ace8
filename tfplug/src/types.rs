//! Core type system for tfplug
//!
//! This module provides the state values resources read and write, attribute
//! paths into them, and the diagnostics returned to Terraform.

use crate::error::{Result, TfplugError};
use std::collections::HashMap;
use std::fmt;

/// Dynamic represents Terraform values that can be of any type
/// IMPORTANT: Always use type-safe accessors instead of matching directly
#[derive(Debug, Clone, PartialEq)]
pub enum Dynamic {
    /// Explicit null value
    Null,
    Bool(bool),
    /// All numbers are f64 to match Terraform
    Number(f64),
    String(String),
    /// Ordered, allows duplicates
    List(Vec<Dynamic>),
    /// Objects are represented as Maps
    Map(HashMap<String, Dynamic>),
}

impl Dynamic {
    pub fn as_string(&self) -> Option<&String> {
        match self {
            Dynamic::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Dynamic::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Dynamic::Number(n) => Some(*n),
            _ => None,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Dynamic::Null => "null",
            Dynamic::Bool(_) => "bool",
            Dynamic::Number(_) => "number",
            Dynamic::String(_) => "string",
            Dynamic::List(_) => "list",
            Dynamic::Map(_) => "map",
        }
    }
}

impl From<serde_json::Value> for Dynamic {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Dynamic::Null,
            serde_json::Value::Bool(b) => Dynamic::Bool(b),
            serde_json::Value::Number(n) => Dynamic::Number(n.as_f64().unwrap_or_default()),
            serde_json::Value::String(s) => Dynamic::String(s),
            serde_json::Value::Array(items) => {
                Dynamic::List(items.into_iter().map(Dynamic::from).collect())
            }
            serde_json::Value::Object(map) => Dynamic::Map(
                map.into_iter()
                    .map(|(key, value)| (key, Dynamic::from(value)))
                    .collect(),
            ),
        }
    }
}

/// DynamicValue wraps the root Dynamic of a config, plan or state
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicValue {
    pub value: Dynamic,
}

impl DynamicValue {
    pub fn new(value: Dynamic) -> Self {
        Self { value }
    }

    /// Empty object, the usual starting point for building state
    pub fn object() -> Self {
        Self {
            value: Dynamic::Map(HashMap::new()),
        }
    }

    pub fn null() -> Self {
        Self {
            value: Dynamic::Null,
        }
    }

    pub fn decode_json(data: &[u8]) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_slice(data)
            .map_err(|e| TfplugError::DecodingError(format!("json decoding failed: {}", e)))?;
        Ok(Self {
            value: value.into(),
        })
    }

    /// Type-safe accessors - ALWAYS use these instead of pattern matching
    pub fn get(&self, path: &AttributePath) -> Result<&Dynamic> {
        self.navigate_path(path)
    }

    pub fn get_string(&self, path: &AttributePath) -> Result<String> {
        let value = self.navigate_path(path)?;
        match value {
            Dynamic::String(s) => Ok(s.clone()),
            _ => Err(TfplugError::TypeMismatch {
                expected: "string".to_string(),
                actual: value.type_name().to_string(),
            }),
        }
    }

    /// String attribute, None when absent or null
    pub fn get_optional_string(&self, path: &AttributePath) -> Result<Option<String>> {
        match self.navigate_path(path) {
            Ok(Dynamic::Null) | Err(TfplugError::AttributeNotFound(_)) => Ok(None),
            Ok(Dynamic::String(s)) => Ok(Some(s.clone())),
            Ok(other) => Err(TfplugError::TypeMismatch {
                expected: "string".to_string(),
                actual: other.type_name().to_string(),
            }),
            Err(e) => Err(e),
        }
    }

    pub fn get_number(&self, path: &AttributePath) -> Result<f64> {
        let value = self.navigate_path(path)?;
        match value {
            Dynamic::Number(n) => Ok(*n),
            _ => Err(TfplugError::TypeMismatch {
                expected: "number".to_string(),
                actual: value.type_name().to_string(),
            }),
        }
    }

    pub fn get_bool(&self, path: &AttributePath) -> Result<bool> {
        let value = self.navigate_path(path)?;
        match value {
            Dynamic::Bool(b) => Ok(*b),
            _ => Err(TfplugError::TypeMismatch {
                expected: "bool".to_string(),
                actual: value.type_name().to_string(),
            }),
        }
    }

    pub fn get_list(&self, path: &AttributePath) -> Result<Vec<Dynamic>> {
        let value = self.navigate_path(path)?;
        match value {
            Dynamic::List(l) => Ok(l.clone()),
            _ => Err(TfplugError::TypeMismatch {
                expected: "list".to_string(),
                actual: value.type_name().to_string(),
            }),
        }
    }

    pub fn set_string(&mut self, path: &AttributePath, value: String) -> Result<()> {
        self.set_value(path, Dynamic::String(value))
    }

    pub fn set_optional_string(
        &mut self,
        path: &AttributePath,
        value: Option<String>,
    ) -> Result<()> {
        self.set_value(path, value.map(Dynamic::String).unwrap_or(Dynamic::Null))
    }

    pub fn set_number(&mut self, path: &AttributePath, value: f64) -> Result<()> {
        self.set_value(path, Dynamic::Number(value))
    }

    pub fn set_bool(&mut self, path: &AttributePath, value: bool) -> Result<()> {
        self.set_value(path, Dynamic::Bool(value))
    }

    pub fn is_null(&self) -> bool {
        matches!(self.value, Dynamic::Null)
    }

    fn navigate_path<'a>(&'a self, path: &AttributePath) -> Result<&'a Dynamic> {
        let mut current = &self.value;

        for step in &path.steps {
            current = match (current, step) {
                (Dynamic::Map(m), AttributePathStep::AttributeName(name)) => m
                    .get(name)
                    .ok_or_else(|| TfplugError::AttributeNotFound(name.clone()))?,
                (Dynamic::List(l), AttributePathStep::ElementKeyInt(idx)) => {
                    let idx = usize::try_from(*idx).map_err(|_| {
                        TfplugError::InvalidPath(format!("negative list index {}", idx))
                    })?;
                    l.get(idx).ok_or_else(|| {
                        TfplugError::InvalidPath(format!("list index {} out of bounds", idx))
                    })?
                }
                (other, _) => {
                    return Err(TfplugError::InvalidPath(format!(
                        "cannot step into {}",
                        other.type_name()
                    )))
                }
            };
        }

        Ok(current)
    }

    /// Intermediate maps are created as needed; the root must be a map or null
    fn set_value(&mut self, path: &AttributePath, value: Dynamic) -> Result<()> {
        let Some((last, parents)) = path.steps.split_last() else {
            self.value = value;
            return Ok(());
        };

        if self.is_null() {
            self.value = Dynamic::Map(HashMap::new());
        }

        let mut current = &mut self.value;
        for step in parents {
            current = match (current, step) {
                (Dynamic::Map(m), AttributePathStep::AttributeName(name)) => m
                    .entry(name.clone())
                    .or_insert_with(|| Dynamic::Map(HashMap::new())),
                (Dynamic::List(l), AttributePathStep::ElementKeyInt(idx)) => {
                    let len = l.len();
                    usize::try_from(*idx)
                        .ok()
                        .and_then(|idx| l.get_mut(idx))
                        .ok_or_else(|| {
                            TfplugError::InvalidPath(format!(
                                "list index {} out of bounds (len {})",
                                idx, len
                            ))
                        })?
                }
                (other, _) => {
                    return Err(TfplugError::InvalidPath(format!(
                        "cannot step into {}",
                        other.type_name()
                    )))
                }
            };
        }

        match (current, last) {
            (Dynamic::Map(m), AttributePathStep::AttributeName(name)) => {
                m.insert(name.clone(), value);
                Ok(())
            }
            (Dynamic::List(l), AttributePathStep::ElementKeyInt(idx)) => {
                let len = l.len();
                let slot = usize::try_from(*idx)
                    .ok()
                    .and_then(|idx| l.get_mut(idx))
                    .ok_or_else(|| {
                        TfplugError::InvalidPath(format!(
                            "list index {} out of bounds (len {})",
                            idx, len
                        ))
                    })?;
                *slot = value;
                Ok(())
            }
            (other, _) => Err(TfplugError::InvalidPath(format!(
                "cannot set value inside {}",
                other.type_name()
            ))),
        }
    }
}

/// AttributePath represents a path to an attribute within a DynamicValue
#[derive(Debug, Clone, PartialEq)]
pub struct AttributePath {
    pub steps: Vec<AttributePathStep>,
}

impl AttributePath {
    pub fn new(name: &str) -> Self {
        Self {
            steps: vec![AttributePathStep::AttributeName(name.to_string())],
        }
    }

    pub fn attribute(mut self, name: &str) -> Self {
        self.steps
            .push(AttributePathStep::AttributeName(name.to_string()));
        self
    }

    pub fn index(mut self, idx: i64) -> Self {
        self.steps.push(AttributePathStep::ElementKeyInt(idx));
        self
    }
}

/// Individual step in an AttributePath
#[derive(Debug, Clone, PartialEq)]
pub enum AttributePathStep {
    /// Access attribute by name in object/map
    AttributeName(String),
    /// Access element by integer index (for lists)
    ElementKeyInt(i64),
}

/// Diagnostic represents a warning or error from the provider
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: DiagnosticSeverity,
    pub summary: String,
    pub detail: String,
    pub attribute: Option<AttributePath>,
}

impl Diagnostic {
    pub fn error(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Error,
            summary: summary.into(),
            detail: detail.into(),
            attribute: None,
        }
    }

    pub fn warning(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Warning,
            summary: summary.into(),
            detail: detail.into(),
            attribute: None,
        }
    }

    pub fn with_attribute(mut self, path: AttributePath) -> Self {
        self.attribute = Some(path);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.detail.is_empty() {
            write!(f, "{}", self.summary)
        } else {
            write!(f, "{}: {}", self.summary, self.detail)
        }
    }
}

/// Severity level for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticSeverity {
    Invalid,
    Error,
    Warning,
}

/// Ordered collection of diagnostics produced by one operation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }

    pub fn add_error(&mut self, summary: impl Into<String>, detail: impl Into<String>) {
        self.push(Diagnostic::error(summary, detail));
    }

    pub fn add_warning(&mut self, summary: impl Into<String>, detail: impl Into<String>) {
        self.push(Diagnostic::warning(summary, detail));
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    pub fn has_error(&self) -> bool {
        self.items.iter().any(Diagnostic::is_error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(|d| d.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items
            .iter()
            .filter(|d| d.severity == DiagnosticSeverity::Warning)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl From<Diagnostic> for Diagnostics {
    fn from(diagnostic: Diagnostic) -> Self {
        Self {
            items: vec![diagnostic],
        }
    }
}

impl FromIterator<Diagnostic> for Diagnostics {
    fn from_iter<I: IntoIterator<Item = Diagnostic>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

/// Error diagnostics rendered as `[summary: detail; ...]`
impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, diagnostic) in self.errors().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", diagnostic)?;
        }
        write!(f, "]")
    }
}

/// Config represents configuration values
pub type Config = DynamicValue;

/// State represents resource state values
pub type State = DynamicValue;
