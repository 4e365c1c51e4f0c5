//! CWL documents and job parameters.
//!
//! Both are kept as untyped YAML trees: the runner is the one that
//! interprets CWL, this crate only checks enough structure to fail early and
//! ships the documents to the cluster verbatim.

use std::path::Path;

use serde_yaml::{Mapping, Value};

use crate::error::{JobError, Result};

/// A CWL workflow document.
#[derive(Debug, Clone, PartialEq)]
pub struct CwlDocument {
    root: Mapping,
}

impl CwlDocument {
    /// Parse a document from YAML (JSON is accepted too).
    pub fn from_str(text: &str) -> Result<Self> {
        let value: Value = serde_yaml::from_str(text)
            .map_err(|e| JobError::InvalidWorkflow(format!("not valid YAML: {}", e)))?;
        Self::from_value(value)
    }

    /// Read and parse a document from disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| JobError::io(path, e))?;
        Self::from_str(&text)
    }

    /// Wrap an already parsed tree.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Mapping(root) = value else {
            return Err(JobError::InvalidWorkflow(
                "document root must be a mapping".to_string(),
            ));
        };
        if !root.contains_key("cwlVersion") {
            return Err(JobError::InvalidWorkflow(
                "missing 'cwlVersion'".to_string(),
            ));
        }
        Ok(Self { root })
    }

    /// The declared CWL version.
    pub fn cwl_version(&self) -> Option<&str> {
        self.root.get("cwlVersion").and_then(Value::as_str)
    }

    /// Whether this is a packed document (`$graph`).
    pub fn is_packed(&self) -> bool {
        self.root.contains_key("$graph")
    }

    /// Ids of the processes in a packed document, without the leading `#`.
    pub fn process_ids(&self) -> Vec<String> {
        self.root
            .get("$graph")
            .and_then(Value::as_sequence)
            .map(|graph| {
                graph
                    .iter()
                    .filter_map(|process| process.get("id").and_then(Value::as_str))
                    .map(|id| id.trim_start_matches('#').to_string())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn has_process(&self, id: &str) -> bool {
        let id = id.trim_start_matches('#');
        self.process_ids().iter().any(|p| p == id)
    }

    /// Check that an entry point names a process of a packed document.
    ///
    /// Documents without `$graph` accept any entry point.
    pub fn validate_entry_point(&self, entry_point: Option<&str>) -> Result<()> {
        match entry_point {
            Some(id) if self.is_packed() && !self.has_process(id) => {
                Err(JobError::InvalidWorkflow(format!(
                    "entry point '{}' not found in $graph (available: {})",
                    id,
                    self.process_ids().join(", ")
                )))
            }
            _ => Ok(()),
        }
    }

    /// YAML text stored in the workflow config map.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.root)?)
    }
}

/// Input parameters of a workflow run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobParams {
    values: Mapping,
}

impl JobParams {
    /// Empty parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse parameters from YAML or JSON. An empty document is empty params.
    pub fn from_str(text: &str) -> Result<Self> {
        let value: Value = serde_yaml::from_str(text)
            .map_err(|e| JobError::InvalidParams(format!("not valid YAML: {}", e)))?;
        Self::from_value(value)
    }

    /// Read and parse parameters from disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| JobError::io(path, e))?;
        Self::from_str(&text)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(Self::default()),
            Value::Mapping(values) => Ok(Self { values }),
            other => Err(JobError::InvalidParams(format!(
                "parameters must be a mapping, got {}",
                kind_of(&other)
            ))),
        }
    }

    /// Set a single parameter.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(Value::String(key.into()), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// YAML text stored in the params config map.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.values)?)
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}
