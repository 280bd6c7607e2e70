//! Project configuration: `dockhand.json` plus a flat property map.
//!
//! Properties are read throughout the pipeline and mutated only by
//! set-if-unset defaulting, except for explicit `--set key=value`
//! overrides which are applied before any defaulting happens.

use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub const PROJECT_FILE: &str = "dockhand.json";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectFile {
    name: String,
    version: String,
    #[serde(default)]
    properties: Map<String, Value>,
}

#[derive(Debug, Clone)]
pub struct Project {
    pub name: String,
    pub version: String,
    base_dir: PathBuf,
    properties: Map<String, Value>,
}

impl Project {
    /// Load the project file from a directory (tilde-expanded).
    pub fn load(project_dir: &str) -> Result<Self> {
        let base_dir = PathBuf::from(shellexpand::tilde(project_dir).to_string());
        let path = base_dir.join(PROJECT_FILE);

        let content = std::fs::read_to_string(&path).map_err(|e| {
            Error::internal_io(e.to_string(), Some(format!("read {}", path.display())))
                .with_hint(format!(
                    "Create a {} file with at least {{\"name\": ..., \"version\": ...}}",
                    PROJECT_FILE
                ))
        })?;

        let file: ProjectFile = serde_json::from_str(&content)
            .map_err(|e| Error::config_invalid_json(path.display().to_string(), e))?;

        if file.name.trim().is_empty() {
            return Err(Error::config_invalid_value(
                "name",
                Some(file.name),
                "Project name must not be empty",
            ));
        }
        if file.version.trim().is_empty() {
            return Err(Error::config_invalid_value(
                "version",
                Some(file.version),
                "Project version must not be empty",
            ));
        }

        Ok(Self {
            name: file.name,
            version: file.version,
            base_dir,
            properties: file.properties,
        })
    }

    /// Build a project directly from values (used by tests and embedders).
    pub fn from_parts(
        name: impl Into<String>,
        version: impl Into<String>,
        base_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            base_dir: base_dir.into(),
            properties: Map::new(),
        }
    }

    /// Apply `key=value` overrides from the command line.
    /// `true`/`false` become booleans, everything else stays a string.
    pub fn apply_overrides(&mut self, sets: &[String]) -> Result<()> {
        for pair in sets {
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                Error::validation_invalid_argument(
                    "set",
                    "Expected key=value",
                    Some(pair.clone()),
                )
            })?;
            if key.is_empty() {
                return Err(Error::validation_invalid_argument(
                    "set",
                    "Property key must not be empty",
                    Some(pair.clone()),
                ));
            }
            self.set(key, parse_value(value));
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// String property with a fallback default.
    pub fn get_str_or(&self, key: &str, default: &str) -> String {
        match self.properties.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => default.to_string(),
        }
    }

    /// Boolean property with a fallback default. String `"true"`/`"false"`
    /// values coerce, anything else keeps the default.
    pub fn get_bool_or(&self, key: &str, default: bool) -> bool {
        match self.properties.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) if s == "true" => true,
            Some(Value::String(s)) if s == "false" => false,
            _ => default,
        }
    }

    /// Mandatory string property; missing key is a configuration error.
    pub fn get_mandatory(&self, key: &str) -> Result<String> {
        match self.properties.get(key) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(other) => Ok(other.to_string()),
            None => Err(Error::config_missing_key(
                key,
                Some(self.base_dir.join(PROJECT_FILE).display().to_string()),
            )),
        }
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.properties.insert(key.to_string(), value.into());
    }

    /// Set a default without clobbering an explicit value.
    pub fn set_if_unset(&mut self, key: &str, value: impl Into<Value>) {
        if !self.properties.contains_key(key) {
            self.properties.insert(key.to_string(), value.into());
        }
    }

    pub fn properties(&self) -> &Map<String, Value> {
        &self.properties
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Resolve a path relative to the project directory.
    /// Absolute paths are kept as-is.
    pub fn expand_path(&self, path: &str) -> PathBuf {
        let path = PathBuf::from(shellexpand::tilde(path).to_string());
        if path.is_absolute() {
            path
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn target_dir(&self) -> PathBuf {
        self.base_dir.join("target")
    }

    pub fn dist_dir(&self) -> PathBuf {
        self.target_dir().join("dist")
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.target_dir().join("reports")
    }
}

fn parse_value(s: &str) -> Value {
    match s {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(s.to_string()),
    }
}
