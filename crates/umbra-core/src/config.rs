// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Runtime-mutable named options.
//!
//! Every tunable of the pipeline lives in a plain serde struct. The
//! [`NamedOptions`] trait turns such a struct into a console-style surface:
//! options are addressed by their serialized (camelCase) name and values are
//! given as text, the way a console command would pass them.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

/// An error raised while reading or mutating a named option set.
#[derive(Debug)]
pub enum ConfigError {
    /// No option with this name exists in the section.
    UnknownOption {
        /// The option section, e.g. `"lighting"`.
        section: &'static str,
        /// The name that was looked up.
        name: String,
    },
    /// The value could not be converted into the option's type.
    InvalidValue {
        /// The resolved option name.
        name: String,
        /// The rejected textual value.
        value: String,
        /// Why the conversion failed.
        reason: String,
    },
    /// A whole configuration document failed to parse.
    Parse(serde_json::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::UnknownOption { section, name } => {
                write!(f, "Unknown {section} option '{name}'")
            }
            ConfigError::InvalidValue {
                name,
                value,
                reason,
            } => write!(f, "Invalid value '{value}' for option '{name}': {reason}"),
            ConfigError::Parse(e) => write!(f, "Failed to parse configuration: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Parse(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Parse(e)
    }
}

/// A serde struct whose fields double as named, runtime-settable options.
///
/// Implementors should use `#[serde(default)]` at the container level so a
/// partial document only overrides what it names.
pub trait NamedOptions: Serialize + DeserializeOwned + Sized {
    /// Short section name used in diagnostics.
    const SECTION: &'static str;

    /// Alternative spellings accepted by [`NamedOptions::set_option`], as
    /// `(alias, canonical)` pairs.
    fn option_aliases() -> &'static [(&'static str, &'static str)] {
        &[]
    }

    /// All option names, sorted alphabetically.
    fn option_names(&self) -> Vec<String> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => {
                let mut names: Vec<String> = map.keys().cloned().collect();
                names.sort();
                names
            }
            _ => Vec::new(),
        }
    }

    /// Reads an option as a JSON value.
    fn get_option(&self, name: &str) -> Result<Value, ConfigError> {
        let map = to_object::<Self>(self)?;
        let key = resolve_name::<Self>(&map, name)?;
        Ok(map[&key].clone())
    }

    /// Sets an option from its textual representation.
    ///
    /// The text is parsed as JSON first (`"3"`, `"true"`, `"[1,0,0,1]"`) and
    /// otherwise taken as a plain string. Numbers assigned to boolean
    /// options follow the console convention `0 = off`.
    fn set_option(&mut self, name: &str, value: &str) -> Result<(), ConfigError> {
        let mut map = to_object::<Self>(self)?;
        let key = resolve_name::<Self>(&map, name)?;

        let parsed: Value =
            serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_owned()));
        let coerced = match (&map[&key], parsed) {
            (Value::Bool(_), Value::Number(n)) => Value::Bool(n.as_f64() != Some(0.0)),
            (_, other) => other,
        };
        map.insert(key.clone(), coerced);

        let updated: Self =
            serde_json::from_value(Value::Object(map)).map_err(|e| ConfigError::InvalidValue {
                name: key.clone(),
                value: value.to_owned(),
                reason: e.to_string(),
            })?;
        *self = updated;
        log::debug!("{} option '{key}' set to {value}", Self::SECTION);
        Ok(())
    }

    /// Loads the options from a JSON document. Missing fields keep defaults.
    fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serializes the options as pretty JSON.
    fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn to_object<T: NamedOptions>(options: &T) -> Result<Map<String, Value>, ConfigError> {
    match serde_json::to_value(options)? {
        Value::Object(map) => Ok(map),
        other => Err(ConfigError::InvalidValue {
            name: T::SECTION.to_owned(),
            value: other.to_string(),
            reason: "option set does not serialize to an object".to_owned(),
        }),
    }
}

fn resolve_name<T: NamedOptions>(map: &Map<String, Value>, name: &str) -> Result<String, ConfigError> {
    let name = T::option_aliases()
        .iter()
        .find(|(alias, _)| alias.eq_ignore_ascii_case(name))
        .map_or(name, |(_, canonical)| *canonical);
    map.keys()
        .find(|k| k.eq_ignore_ascii_case(name))
        .cloned()
        .ok_or_else(|| ConfigError::UnknownOption {
            section: T::SECTION,
            name: name.to_owned(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(default, rename_all = "camelCase")]
    struct Knobs {
        pass_count: u32,
        blur_size: f32,
        enabled: bool,
    }

    impl Default for Knobs {
        fn default() -> Self {
            Self {
                pass_count: 4,
                blur_size: 1.5,
                enabled: true,
            }
        }
    }

    impl NamedOptions for Knobs {
        const SECTION: &'static str = "knobs";

        fn option_aliases() -> &'static [(&'static str, &'static str)] {
            &[("passes", "passCount")]
        }
    }

    #[test]
    fn set_option_is_case_insensitive() {
        let mut k = Knobs::default();
        k.set_option("PASSCOUNT", "7").unwrap();
        assert_eq!(k.pass_count, 7);
    }

    #[test]
    fn aliases_resolve_to_canonical_names() {
        let mut k = Knobs::default();
        k.set_option("passes", "2").unwrap();
        assert_eq!(k.get_option("passCount").unwrap(), Value::from(2));
    }

    #[test]
    fn numeric_values_toggle_booleans() {
        let mut k = Knobs::default();
        k.set_option("enabled", "0").unwrap();
        assert!(!k.enabled);
        k.set_option("enabled", "true").unwrap();
        assert!(k.enabled);
    }

    #[test]
    fn invalid_values_leave_options_untouched() {
        let mut k = Knobs::default();
        let err = k.set_option("passCount", "many").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
        assert_eq!(k, Knobs::default());
    }

    #[test]
    fn unknown_options_are_reported() {
        let mut k = Knobs::default();
        assert!(matches!(
            k.set_option("nope", "1"),
            Err(ConfigError::UnknownOption { .. })
        ));
    }

    #[test]
    fn partial_documents_keep_defaults() {
        let k = Knobs::from_json_str(r#"{ "blurSize": 3.0 }"#).unwrap();
        assert_eq!(k.blur_size, 3.0);
        assert_eq!(k.pass_count, 4);
        assert_eq!(k.option_names(), vec!["blurSize", "enabled", "passCount"]);
    }
}
