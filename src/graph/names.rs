//! Entity display-name context.
//!
//! Knowledge-base ids such as `m.06f7lp` are meaningless in prompts and answers.
//! An [`EntityNames`] map resolves them to human-readable names. It is an explicit
//! value handed to the components that render or match names; there is no
//! process-wide name table.

use std::collections::HashMap;
use std::path::Path;

use crate::error::GraphError;

/// Id → display name lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityNames {
    names: HashMap<String, String>,
}

impl EntityNames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a flat JSON object of `id → name`.
    pub fn load_json(path: &Path) -> Result<Self, GraphError> {
        let text = std::fs::read_to_string(path).map_err(|e| GraphError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let names: HashMap<String, String> =
            serde_json::from_str(&text).map_err(|e| GraphError::NameMap {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        tracing::info!(path = %path.display(), names = names.len(), "loaded entity name map");
        Ok(Self { names })
    }

    pub fn insert(&mut self, id: impl Into<String>, name: impl Into<String>) {
        self.names.insert(id.into(), name.into());
    }

    pub fn get(&self, id: &str) -> Option<&str> {
        self.names.get(id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl FromIterator<(String, String)> for EntityNames {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn lookup() {
        let names: EntityNames = [("m.1".to_string(), "Ada".to_string())].into_iter().collect();
        assert_eq!(names.get("m.1"), Some("Ada"));
        assert_eq!(names.get("m.2"), None);
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"m.06f7lp": "Barack Obama"}}"#).unwrap();
        let names = EntityNames::load_json(file.path()).unwrap();
        assert_eq!(names.get("m.06f7lp"), Some("Barack Obama"));
    }

    #[test]
    fn non_object_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[1, 2]").unwrap();
        let err = EntityNames::load_json(file.path()).unwrap_err();
        assert!(matches!(err, GraphError::NameMap { .. }));
    }
}
