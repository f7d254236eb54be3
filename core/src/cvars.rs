//! Console variables.
//!
//! [`ConsoleVariables`] is a typed `name -> value` registry for runtime
//! tunables such as `r.Bloom` or `r.ResolutionScale`. Every variable is
//! registered with a default value that fixes its type; later writes must
//! keep that type (an integer may be written into a float variable).
//!
//! The registry is owned by the simulation side. The renderer never reads it
//! directly during a frame: it works from an immutable snapshot taken when
//! the frame's scene proxy is built.
//!
//! Variables can be loaded in bulk from TOML. Both dotted keys and nested
//! tables address the same variable:
//!
//! ```toml
//! "r.Bloom" = false
//!
//! [r]
//! ResolutionScale = 75
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Errors produced by the console-variable registry.
#[derive(Debug, thiserror::Error)]
pub enum CVarError {
    /// No variable with this name was registered.
    #[error("unknown console variable '{0}'")]
    Unknown(String),
    /// The value does not match the registered type.
    #[error("console variable '{name}' expects {expected}, got {found}")]
    TypeMismatch {
        /// Variable name.
        name: String,
        /// Registered kind.
        expected: CVarKind,
        /// Kind of the rejected value.
        found: CVarKind,
    },
    /// A variable with this name already exists with a different type.
    #[error("console variable '{0}' is already registered with a different type")]
    Conflicting(String),
    /// The TOML source could not be parsed.
    #[error("failed to parse console variables: {0}")]
    Parse(#[from] toml::de::Error),
    /// The registry could not be written as TOML.
    #[error("failed to serialize console variables: {0}")]
    Serialize(#[from] toml::ser::Error),
    /// A TOML value has no console-variable equivalent (arrays, dates).
    #[error("console variable '{0}' has an unsupported value type")]
    Unsupported(String),
}

/// Type of a console variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CVarKind {
    /// Boolean flag.
    Bool,
    /// Signed integer.
    Int,
    /// Floating point number.
    Float,
    /// Free-form string.
    Str,
}

impl fmt::Display for CVarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Str => "string",
        };
        f.write_str(name)
    }
}

/// Value of a console variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CVarValue {
    /// Boolean flag.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// Free-form string.
    Str(String),
}

impl CVarValue {
    /// Kind of this value.
    pub fn kind(&self) -> CVarKind {
        match self {
            Self::Bool(_) => CVarKind::Bool,
            Self::Int(_) => CVarKind::Int,
            Self::Float(_) => CVarKind::Float,
            Self::Str(_) => CVarKind::Str,
        }
    }

    /// Convert this value to `kind`, allowing only the int-to-float widening.
    fn coerce(self, kind: CVarKind) -> Option<Self> {
        match (self, kind) {
            (Self::Int(v), CVarKind::Float) => Some(Self::Float(v as f64)),
            (value, kind) if value.kind() == kind => Some(value),
            _ => None,
        }
    }

    fn from_toml(value: toml::Value) -> Option<Self> {
        match value {
            toml::Value::Boolean(v) => Some(Self::Bool(v)),
            toml::Value::Integer(v) => Some(Self::Int(v)),
            toml::Value::Float(v) => Some(Self::Float(v)),
            toml::Value::String(v) => Some(Self::Str(v)),
            _ => None,
        }
    }
}

impl fmt::Display for CVarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Str(v) => write!(f, "\"{v}\""),
        }
    }
}

impl From<bool> for CVarValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for CVarValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for CVarValue {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<f64> for CVarValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<f32> for CVarValue {
    fn from(v: f32) -> Self {
        Self::Float(v as f64)
    }
}

impl From<&str> for CVarValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for CVarValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

/// A registered console variable.
#[derive(Debug, Clone, PartialEq)]
pub struct CVar {
    value: CVarValue,
    default: CVarValue,
    description: String,
}

impl CVar {
    /// Current value.
    pub fn value(&self) -> &CVarValue {
        &self.value
    }

    /// Registered default.
    pub fn default_value(&self) -> &CVarValue {
        &self.default
    }

    /// Help text.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Registered kind.
    pub fn kind(&self) -> CVarKind {
        self.default.kind()
    }
}

/// Typed registry of console variables.
#[derive(Debug, Clone, Default)]
pub struct ConsoleVariables {
    vars: BTreeMap<String, CVar>,
    revision: u64,
}

impl ConsoleVariables {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a variable with its default value.
    ///
    /// Registering an existing name with the same type keeps the current
    /// value and replaces default and description.
    ///
    /// # Errors
    ///
    /// Returns [`CVarError::Conflicting`] if the name exists with another type.
    pub fn register(
        &mut self,
        name: &str,
        default: impl Into<CVarValue>,
        description: &str,
    ) -> Result<(), CVarError> {
        let default = default.into();
        if let Some(existing) = self.vars.get_mut(name) {
            if existing.kind() != default.kind() {
                return Err(CVarError::Conflicting(name.to_string()));
            }
            existing.default = default;
            existing.description = description.to_string();
            return Ok(());
        }

        log::trace!("ConsoleVariables: registered {name} = {default}");
        self.vars.insert(
            name.to_string(),
            CVar {
                value: default.clone(),
                default,
                description: description.to_string(),
            },
        );
        self.revision += 1;
        Ok(())
    }

    /// Look up a variable.
    pub fn get(&self, name: &str) -> Option<&CVar> {
        self.vars.get(name)
    }

    /// Whether a variable is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Read a boolean variable.
    pub fn get_bool(&self, name: &str) -> Result<bool, CVarError> {
        match self.value(name)? {
            CVarValue::Bool(v) => Ok(*v),
            other => Err(mismatch(name, CVarKind::Bool, other)),
        }
    }

    /// Read an integer variable.
    pub fn get_int(&self, name: &str) -> Result<i64, CVarError> {
        match self.value(name)? {
            CVarValue::Int(v) => Ok(*v),
            other => Err(mismatch(name, CVarKind::Int, other)),
        }
    }

    /// Read a float variable.
    pub fn get_float(&self, name: &str) -> Result<f64, CVarError> {
        match self.value(name)? {
            CVarValue::Float(v) => Ok(*v),
            other => Err(mismatch(name, CVarKind::Float, other)),
        }
    }

    /// Read a string variable.
    pub fn get_str(&self, name: &str) -> Result<&str, CVarError> {
        match self.value(name)? {
            CVarValue::Str(v) => Ok(v),
            other => Err(mismatch(name, CVarKind::Str, other)),
        }
    }

    /// Write a variable, keeping its registered type.
    pub fn set(&mut self, name: &str, value: impl Into<CVarValue>) -> Result<(), CVarError> {
        let value = value.into();
        let var = self
            .vars
            .get_mut(name)
            .ok_or_else(|| CVarError::Unknown(name.to_string()))?;
        let found = value.kind();
        let value = value
            .coerce(var.kind())
            .ok_or_else(|| CVarError::TypeMismatch {
                name: name.to_string(),
                expected: var.kind(),
                found,
            })?;

        if var.value != value {
            log::debug!("ConsoleVariables: {name} = {value}");
            var.value = value;
            self.revision += 1;
        }
        Ok(())
    }

    /// Restore a variable to its default.
    pub fn reset(&mut self, name: &str) -> Result<(), CVarError> {
        let default = self
            .vars
            .get(name)
            .map(|var| var.default.clone())
            .ok_or_else(|| CVarError::Unknown(name.to_string()))?;
        self.set(name, default)
    }

    /// Counter bumped by every change; lets callers cache derived snapshots.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Iterate over all variables in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &CVar)> {
        self.vars.iter().map(|(name, var)| (name.as_str(), var))
    }

    /// Number of registered variables.
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Whether no variables are registered.
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Apply values from a TOML document.
    ///
    /// Unregistered names are skipped with a warning. Returns the number of
    /// variables that were applied.
    ///
    /// # Errors
    ///
    /// Fails on malformed TOML or on a value whose type does not match the
    /// registered variable. Values applied before the failing entry stay set.
    pub fn load_toml_str(&mut self, source: &str) -> Result<usize, CVarError> {
        let table: toml::Table = toml::from_str(source)?;
        let mut entries = Vec::new();
        flatten_table(String::new(), table, &mut entries);

        let mut applied = 0;
        for (name, value) in entries {
            if !self.contains(&name) {
                log::warn!("ConsoleVariables: ignoring unknown variable '{name}'");
                continue;
            }
            let value = CVarValue::from_toml(value)
                .ok_or_else(|| CVarError::Unsupported(name.clone()))?;
            self.set(&name, value)?;
            applied += 1;
        }
        Ok(applied)
    }

    /// Write all current values as a flat TOML document with dotted keys.
    pub fn to_toml_string(&self) -> Result<String, CVarError> {
        let values: BTreeMap<&str, &CVarValue> = self
            .vars
            .iter()
            .map(|(name, var)| (name.as_str(), &var.value))
            .collect();
        Ok(toml::to_string(&values)?)
    }

    fn value(&self, name: &str) -> Result<&CVarValue, CVarError> {
        self.vars
            .get(name)
            .map(|var| &var.value)
            .ok_or_else(|| CVarError::Unknown(name.to_string()))
    }
}

fn mismatch(name: &str, expected: CVarKind, found: &CVarValue) -> CVarError {
    CVarError::TypeMismatch {
        name: name.to_string(),
        expected,
        found: found.kind(),
    }
}

fn flatten_table(prefix: String, table: toml::Table, out: &mut Vec<(String, toml::Value)>) {
    for (key, value) in table {
        let name = if prefix.is_empty() {
            key
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            toml::Value::Table(inner) => flatten_table(name, inner, out),
            value => out.push((name, value)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ConsoleVariables {
        let mut cvars = ConsoleVariables::new();
        cvars.register("r.Bloom", true, "Enable bloom").unwrap();
        cvars
            .register("r.ResolutionScale", 100i64, "Resolution scale percent")
            .unwrap();
        cvars.register("r.Exposure", 1.0f64, "Exposure").unwrap();
        cvars.register("r.Tonemapper", "aces", "Tone curve").unwrap();
        cvars
    }

    #[test]
    fn test_defaults() {
        let cvars = registry();
        assert!(cvars.get_bool("r.Bloom").unwrap());
        assert_eq!(cvars.get_int("r.ResolutionScale").unwrap(), 100);
        assert_eq!(cvars.get_float("r.Exposure").unwrap(), 1.0);
        assert_eq!(cvars.get_str("r.Tonemapper").unwrap(), "aces");
        assert_eq!(cvars.len(), 4);
    }

    #[test]
    fn test_set_type_checked() {
        let mut cvars = registry();
        cvars.set("r.Bloom", false).unwrap();
        assert!(!cvars.get_bool("r.Bloom").unwrap());

        let err = cvars.set("r.Bloom", 3i64).unwrap_err();
        assert!(matches!(
            err,
            CVarError::TypeMismatch {
                expected: CVarKind::Bool,
                found: CVarKind::Int,
                ..
            }
        ));
    }

    #[test]
    fn test_int_widens_to_float() {
        let mut cvars = registry();
        cvars.set("r.Exposure", 2i64).unwrap();
        assert_eq!(cvars.get_float("r.Exposure").unwrap(), 2.0);
    }

    #[test]
    fn test_unknown_variable() {
        let mut cvars = registry();
        assert!(matches!(cvars.get_bool("r.Missing"), Err(CVarError::Unknown(_))));
        assert!(matches!(cvars.set("r.Missing", true), Err(CVarError::Unknown(_))));
    }

    #[test]
    fn test_wrong_getter() {
        let cvars = registry();
        assert!(cvars.get_int("r.Bloom").is_err());
    }

    #[test]
    fn test_register_conflict() {
        let mut cvars = registry();
        assert!(matches!(
            cvars.register("r.Bloom", 1i64, ""),
            Err(CVarError::Conflicting(_))
        ));
        // Same type re-registration keeps the current value.
        cvars.set("r.Bloom", false).unwrap();
        cvars.register("r.Bloom", true, "again").unwrap();
        assert!(!cvars.get_bool("r.Bloom").unwrap());
        assert_eq!(cvars.get("r.Bloom").unwrap().description(), "again");
    }

    #[test]
    fn test_reset() {
        let mut cvars = registry();
        cvars.set("r.ResolutionScale", 50i64).unwrap();
        cvars.reset("r.ResolutionScale").unwrap();
        assert_eq!(cvars.get_int("r.ResolutionScale").unwrap(), 100);
    }

    #[test]
    fn test_revision_tracks_changes() {
        let mut cvars = registry();
        let start = cvars.revision();
        cvars.set("r.Bloom", true).unwrap();
        assert_eq!(cvars.revision(), start);
        cvars.set("r.Bloom", false).unwrap();
        assert_eq!(cvars.revision(), start + 1);
    }

    #[test]
    fn test_load_toml_dotted_and_nested() {
        let mut cvars = registry();
        let applied = cvars
            .load_toml_str(
                r#"
                "r.Bloom" = false
                "r.Unknown" = 1

                [r]
                ResolutionScale = 50
                Exposure = 1.5
                "#,
            )
            .unwrap();
        assert_eq!(applied, 3);
        assert!(!cvars.get_bool("r.Bloom").unwrap());
        assert_eq!(cvars.get_int("r.ResolutionScale").unwrap(), 50);
        assert_eq!(cvars.get_float("r.Exposure").unwrap(), 1.5);
    }

    #[test]
    fn test_load_toml_type_mismatch() {
        let mut cvars = registry();
        let result = cvars.load_toml_str("\"r.Bloom\" = \"yes\"");
        assert!(matches!(result, Err(CVarError::TypeMismatch { .. })));
    }

    #[test]
    fn test_load_toml_parse_error() {
        let mut cvars = registry();
        assert!(matches!(
            cvars.load_toml_str("r.Bloom = = true"),
            Err(CVarError::Parse(_))
        ));
    }

    #[test]
    fn test_toml_dump_reloads() {
        let mut cvars = registry();
        cvars.set("r.ResolutionScale", 67i64).unwrap();
        let dumped = cvars.to_toml_string().unwrap();

        let mut fresh = registry();
        fresh.load_toml_str(&dumped).unwrap();
        assert_eq!(fresh.get_int("r.ResolutionScale").unwrap(), 67);
    }
}
