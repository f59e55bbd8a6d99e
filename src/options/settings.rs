use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::BlurError;

/// One stored setting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    /// Checkbox.
    Bool(bool),
    /// Integer field or list selection.
    Int(i64),
    /// Slider.
    Float(f64),
    /// Source name or file path.
    String(String),
}

/// The host's generic key/value settings store.
///
/// Getters fall back to the registered default for the key, then to the
/// zero value of the requested type. Numbers convert between integer and
/// float on read, so a preset file may write `radius = 10` or `10.0`.
/// Only explicitly set values are serialized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings {
    values: BTreeMap<String, SettingValue>,
    #[serde(skip)]
    defaults: BTreeMap<String, SettingValue>,
}

impl Settings {
    /// Empty store without defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty store with the filter's defaults registered.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut settings = Self::new();
        super::register_defaults(&mut settings);
        settings
    }

    fn lookup(&self, key: &str) -> Option<&SettingValue> {
        self.values.get(key).or_else(|| self.defaults.get(key))
    }

    /// Whether `key` has an explicit (non-default) value.
    #[must_use]
    pub fn has_user_value(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Remove an explicit value, exposing the default again.
    pub fn erase(&mut self, key: &str) {
        let _ = self.values.remove(key);
    }

    /// Read a boolean.
    #[must_use]
    pub fn get_bool(&self, key: &str) -> bool {
        match self.lookup(key) {
            Some(SettingValue::Bool(v)) => *v,
            Some(SettingValue::Int(v)) => *v != 0,
            _ => false,
        }
    }

    /// Read an integer; floats are truncated toward zero.
    #[must_use]
    pub fn get_int(&self, key: &str) -> i64 {
        match self.lookup(key) {
            Some(SettingValue::Int(v)) => *v,
            Some(SettingValue::Float(v)) if v.is_finite() => *v as i64,
            Some(SettingValue::Bool(v)) => i64::from(*v),
            _ => 0,
        }
    }

    /// Read a float.
    #[must_use]
    pub fn get_double(&self, key: &str) -> f64 {
        match self.lookup(key) {
            Some(SettingValue::Float(v)) => *v,
            Some(SettingValue::Int(v)) => *v as f64,
            _ => 0.0,
        }
    }

    /// Read a string; non-string values read as empty.
    #[must_use]
    pub fn get_string(&self, key: &str) -> &str {
        match self.lookup(key) {
            Some(SettingValue::String(v)) => v,
            _ => "",
        }
    }

    /// Set a boolean.
    pub fn set_bool(&mut self, key: &str, value: bool) {
        self.set(key, SettingValue::Bool(value));
    }

    /// Set an integer.
    pub fn set_int(&mut self, key: &str, value: i64) {
        self.set(key, SettingValue::Int(value));
    }

    /// Set a float.
    pub fn set_double(&mut self, key: &str, value: f64) {
        self.set(key, SettingValue::Float(value));
    }

    /// Set a string.
    pub fn set_string(&mut self, key: &str, value: &str) {
        self.set(key, SettingValue::String(value.to_owned()));
    }

    fn set(&mut self, key: &str, value: SettingValue) {
        let _ = self.values.insert(key.to_owned(), value);
    }

    /// Register the fallback for a key.
    pub fn set_default(&mut self, key: &str, value: SettingValue) {
        let _ = self.defaults.insert(key.to_owned(), value);
    }

    /// Parse a flat TOML table of settings.
    ///
    /// # Errors
    ///
    /// Returns [`BlurError::Settings`] on malformed TOML or nested tables.
    pub fn from_toml_str(text: &str) -> Result<Self, BlurError> {
        toml::from_str(text).map_err(|e| BlurError::Settings(e.to_string()))
    }

    /// Parse a flat JSON object of settings.
    ///
    /// # Errors
    ///
    /// Returns [`BlurError::Settings`] on malformed JSON or nested objects.
    pub fn from_json_str(text: &str) -> Result<Self, BlurError> {
        serde_json::from_str(text)
            .map_err(|e| BlurError::Settings(e.to_string()))
    }

    /// Explicit values as pretty TOML.
    ///
    /// # Errors
    ///
    /// Returns [`BlurError::Settings`] if serialization fails.
    pub fn to_toml_string(&self) -> Result<String, BlurError> {
        toml::to_string_pretty(self)
            .map_err(|e| BlurError::Settings(e.to_string()))
    }

    /// Explicit values as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns [`BlurError::Settings`] if serialization fails.
    pub fn to_json_string(&self) -> Result<String, BlurError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| BlurError::Settings(e.to_string()))
    }

    /// Load a `.json` or `.toml` settings file on top of the filter
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns [`BlurError::Io`] if the file cannot be read and
    /// [`BlurError::Settings`] if it cannot be parsed.
    pub fn load(path: &Path) -> Result<Self, BlurError> {
        let content = std::fs::read_to_string(path)?;
        let parsed = if is_json(path) {
            Self::from_json_str(&content)?
        } else {
            Self::from_toml_str(&content)?
        };
        let mut settings = Self::with_defaults();
        settings.values = parsed.values;
        Ok(settings)
    }

    /// Save explicit values as `.json` or `.toml` by file extension.
    ///
    /// # Errors
    ///
    /// Returns [`BlurError::Settings`] if serialization fails and
    /// [`BlurError::Io`] if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), BlurError> {
        let content = if is_json(path) {
            self.to_json_string()?
        } else {
            self.to_toml_string()?
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }
}

fn is_json(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_back_unset_keys() {
        let mut settings = Settings::with_defaults();
        assert_eq!(settings.get_double("radius"), 10.0);
        settings.set_double("radius", 3.5);
        assert_eq!(settings.get_double("radius"), 3.5);
        settings.erase("radius");
        assert_eq!(settings.get_double("radius"), 10.0);
        assert_eq!(settings.get_double("no_such_key"), 0.0);
        assert_eq!(settings.get_string("no_such_key"), "");
    }

    #[test]
    fn numbers_convert_on_read() {
        let settings =
            Settings::from_toml_str("radius = 10\nkawase_passes = 3.5\n")
                .unwrap();
        assert_eq!(settings.get_double("radius"), 10.0);
        assert_eq!(settings.get_int("kawase_passes"), 3);
        assert_eq!(settings.get_double("kawase_passes"), 3.5);
    }

    #[test]
    fn toml_and_json_round_trip_explicit_values_only() {
        let mut settings = Settings::with_defaults();
        settings.set_int("blur_algorithm", 3);
        settings.set_bool("effect_mask_crop_invert", true);
        settings.set_string("background", "Camera");

        let toml_text = settings.to_toml_string().unwrap();
        assert!(!toml_text.contains("radius"));
        let parsed = Settings::from_toml_str(&toml_text).unwrap();
        assert_eq!(parsed.get_int("blur_algorithm"), 3);
        assert!(parsed.get_bool("effect_mask_crop_invert"));

        let json = settings.to_json_string().unwrap();
        let parsed = Settings::from_json_str(&json).unwrap();
        assert_eq!(parsed.get_string("background"), "Camera");
    }

    #[test]
    fn nested_tables_are_rejected() {
        assert!(matches!(
            Settings::from_toml_str("[blur]\nradius = 1.0\n"),
            Err(BlurError::Settings(_))
        ));
    }

    #[test]
    fn load_and_save_by_extension() {
        let dir = std::env::temp_dir()
            .join(format!("composite-blur-settings-{}", std::process::id()));
        let mut settings = Settings::with_defaults();
        settings.set_double("kawase_passes", 2.25);
        for name in ["preset.toml", "preset.json"] {
            let path = dir.join(name);
            settings.save(&path).unwrap();
            let loaded = Settings::load(&path).unwrap();
            assert_eq!(loaded.get_double("kawase_passes"), 2.25);
            assert_eq!(loaded.get_int("passes"), 1);
        }
        let _ = std::fs::remove_dir_all(&dir);
    }
}
