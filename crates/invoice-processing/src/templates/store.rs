//! Named deletion templates persisted as JSON.

use crate::error::{ProcessingError, Result};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

/// Name of the built-in template.
pub const DEFAULT_TEMPLATE_NAME: &str = "发票数据标准模板";

/// Columns removed by the built-in template.
pub const DEFAULT_TEMPLATE_COLUMNS: [&str; 9] = [
    "发票代码",
    "发票号码",
    "销方识别号",
    "销方名称",
    "购方识别号",
    "发票来源",
    "是否正数",
    "发票风险等级",
    "开票人",
];

const CREATED_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A saved list of columns to delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    #[serde(default)]
    pub description: String,
    pub columns_to_delete: Vec<String>,
    /// Local time formatted as `%Y-%m-%d %H:%M:%S`.
    #[serde(default)]
    pub created_time: String,
    /// Default templates cannot be removed or overwritten.
    #[serde(default)]
    pub is_default: bool,
}

/// Collection of templates keyed by name.
///
/// Serializes as a flat JSON object `name -> template`. Names are kept
/// sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateStore {
    templates: BTreeMap<String, Template>,
}

impl TemplateStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store holding only the built-in template.
    pub fn with_defaults() -> Self {
        let mut templates = BTreeMap::new();
        templates.insert(
            DEFAULT_TEMPLATE_NAME.to_string(),
            Template {
                description: "发票数据处理的标准模板，删除常见的冗余列".to_string(),
                columns_to_delete: DEFAULT_TEMPLATE_COLUMNS
                    .iter()
                    .map(|c| c.to_string())
                    .collect(),
                created_time: "2024-01-01 00:00:00".to_string(),
                is_default: true,
            },
        );
        Self { templates }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Pretty-printed JSON; non-ASCII names are written as-is.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Read a store from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let store = Self::from_json(&content)?;
        info!("Loaded {} templates from {}", store.len(), path.display());
        Ok(store)
    }

    /// Read a store from a JSON file, or return the defaults if the file
    /// does not exist yet.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            info!("No template file at {}, using defaults", path.display());
            Ok(Self::with_defaults())
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_json()?)?;
        info!("Saved {} templates to {}", self.len(), path.display());
        Ok(())
    }

    /// Add or replace a user template, stamping the current local time.
    ///
    /// # Errors
    ///
    /// - [`ProcessingError::InvalidConfig`] for a blank name
    /// - [`ProcessingError::TemplateProtected`] when `name` is a default template
    pub fn add(
        &mut self,
        name: impl Into<String>,
        columns_to_delete: Vec<String>,
        description: impl Into<String>,
    ) -> Result<()> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ProcessingError::InvalidConfig(
                "template name must not be blank".to_string(),
            ));
        }
        if self.templates.get(&name).is_some_and(|t| t.is_default) {
            return Err(ProcessingError::TemplateProtected(name));
        }

        let template = Template {
            description: description.into(),
            columns_to_delete,
            created_time: Local::now().format(CREATED_TIME_FORMAT).to_string(),
            is_default: false,
        };
        info!("Added template '{}'", name);
        self.templates.insert(name, template);
        Ok(())
    }

    /// Remove a user template and return it.
    pub fn remove(&mut self, name: &str) -> Result<Template> {
        match self.templates.get(name) {
            None => {
                warn!("Template '{}' does not exist", name);
                Err(ProcessingError::TemplateNotFound(name.to_string()))
            }
            Some(template) if template.is_default => {
                warn!("Refusing to remove default template '{}'", name);
                Err(ProcessingError::TemplateProtected(name.to_string()))
            }
            Some(_) => {
                info!("Removed template '{}'", name);
                self.templates
                    .remove(name)
                    .ok_or_else(|| ProcessingError::TemplateNotFound(name.to_string()))
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Template> {
        self.templates.get(name)
    }

    /// Look up a template, failing with `TemplateNotFound`.
    pub fn require(&self, name: &str) -> Result<&Template> {
        self.get(name)
            .ok_or_else(|| ProcessingError::TemplateNotFound(name.to_string()))
    }

    pub fn names(&self) -> Vec<String> {
        self.templates.keys().cloned().collect()
    }

    /// The first template flagged as default, if any.
    pub fn default_template(&self) -> Option<(&str, &Template)> {
        self.templates
            .iter()
            .find(|(_, t)| t.is_default)
            .map(|(name, t)| (name.as_str(), t))
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use tempfile::TempDir;

    #[test]
    fn test_with_defaults() {
        let store = TemplateStore::with_defaults();
        let (name, template) = store.default_template().unwrap();

        assert_eq!(name, DEFAULT_TEMPLATE_NAME);
        assert!(template.is_default);
        assert_eq!(template.columns_to_delete.len(), 9);
        assert_eq!(template.columns_to_delete[0], "发票代码");
        assert_eq!(template.columns_to_delete[8], "开票人");
    }

    #[test]
    fn test_add_stamps_created_time() {
        let mut store = TemplateStore::new();
        store
            .add("精简", vec!["开票人".to_string()], "只删开票人")
            .unwrap();

        let template = store.get("精简").unwrap();
        assert!(!template.is_default);
        assert_eq!(template.description, "只删开票人");
        assert!(NaiveDateTime::parse_from_str(&template.created_time, CREATED_TIME_FORMAT).is_ok());
    }

    #[test]
    fn test_add_overwrites_user_template() {
        let mut store = TemplateStore::new();
        store.add("t", vec!["a".to_string()], "").unwrap();
        store.add("t", vec!["b".to_string()], "").unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("t").unwrap().columns_to_delete, vec!["b"]);
    }

    #[test]
    fn test_add_rejects_default_and_blank_names() {
        let mut store = TemplateStore::with_defaults();
        assert!(matches!(
            store.add(DEFAULT_TEMPLATE_NAME, vec![], ""),
            Err(ProcessingError::TemplateProtected(_))
        ));
        assert!(matches!(
            store.add("  ", vec![], ""),
            Err(ProcessingError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_remove() {
        let mut store = TemplateStore::with_defaults();
        store.add("临时", vec!["开票人".to_string()], "").unwrap();

        let removed = store.remove("临时").unwrap();
        assert_eq!(removed.columns_to_delete, vec!["开票人"]);
        assert!(store.get("临时").is_none());

        assert!(matches!(
            store.remove("临时"),
            Err(ProcessingError::TemplateNotFound(_))
        ));
        assert!(matches!(
            store.remove(DEFAULT_TEMPLATE_NAME),
            Err(ProcessingError::TemplateProtected(_))
        ));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_json_preserves_chinese() {
        let store = TemplateStore::with_defaults();
        let json = store.to_json().unwrap();
        assert!(json.contains("发票数据标准模板"));
        assert!(json.contains("\"is_default\": true"));

        let parsed = TemplateStore::from_json(&json).unwrap();
        assert_eq!(parsed, store);
    }

    #[test]
    fn test_from_json_missing_optional_fields() {
        let json = r#"{ "简单": { "columns_to_delete": ["开票人"] } }"#;
        let store = TemplateStore::from_json(json).unwrap();
        let template = store.get("简单").unwrap();
        assert!(!template.is_default);
        assert!(template.description.is_empty());
        assert!(store.default_template().is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("templates.json");

        let mut store = TemplateStore::with_defaults();
        store.add("自定义", vec!["销方名称".to_string()], "").unwrap();
        store.save(&path).unwrap();

        let loaded = TemplateStore::load(&path).unwrap();
        assert_eq!(loaded, store);
        assert_eq!(loaded.names(), store.names());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = TempDir::new().unwrap();
        let store = TemplateStore::load_or_default(dir.path().join("none.json")).unwrap();
        assert_eq!(store, TemplateStore::with_defaults());
    }

    #[test]
    fn test_load_invalid_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            TemplateStore::load(&path),
            Err(ProcessingError::Json(_))
        ));
    }
}
