//! Generation options and the per-backend allow-list.
//!
//! Callers hand over whatever options a request carried. Unknown keys are
//! discarded on parse, and each backend keeps only the options listed for it
//! in [`supported_options`] before the request is built.

use std::collections::{BTreeMap, HashMap};

use serde::de::Deserializer;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

use crate::config::ChatBackend;

/// A generation option understood by at least one backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GenOption {
    Temperature,
    MaxTokens,
    TopP,
    PresencePenalty,
    FrequencyPenalty,
}

impl GenOption {
    pub const ALL: [GenOption; 5] = [
        GenOption::Temperature,
        GenOption::MaxTokens,
        GenOption::TopP,
        GenOption::PresencePenalty,
        GenOption::FrequencyPenalty,
    ];

    /// Canonical (OpenAI-style) option name.
    pub fn key(self) -> &'static str {
        match self {
            GenOption::Temperature => "temperature",
            GenOption::MaxTokens => "max_tokens",
            GenOption::TopP => "top_p",
            GenOption::PresencePenalty => "presence_penalty",
            GenOption::FrequencyPenalty => "frequency_penalty",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|opt| opt.key() == key)
    }

    fn is_integer(self) -> bool {
        matches!(self, GenOption::MaxTokens)
    }

    /// JSON value as vendors expect it (token counts are integers).
    pub fn json_value(self, value: f64) -> serde_json::Value {
        if self.is_integer() {
            serde_json::Value::from(value.max(0.0).round() as u64)
        } else {
            serde_json::Value::from(value)
        }
    }
}

/// Options allowed through for each backend.
pub fn supported_options(backend: ChatBackend) -> &'static [GenOption] {
    use GenOption::*;
    match backend {
        ChatBackend::OpenAi
        | ChatBackend::Moonshot
        | ChatBackend::Xinference
        | ChatBackend::Ollama => &[Temperature, MaxTokens, TopP, PresencePenalty, FrequencyPenalty],
        ChatBackend::ZhipuAi => &[Temperature, MaxTokens, TopP],
        ChatBackend::Qwen => &[Temperature, MaxTokens, TopP, PresencePenalty],
    }
}

/// Numeric generation options for one call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationConfig {
    values: BTreeMap<GenOption, f64>,
}

impl GenerationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, option: GenOption, value: f64) -> Self {
        self.set(option, value);
        self
    }

    pub fn set(&mut self, option: GenOption, value: f64) {
        if value.is_finite() {
            self.values.insert(option, value);
        }
    }

    pub fn get(&self, option: GenOption) -> Option<f64> {
        self.values.get(&option).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (GenOption, f64)> + '_ {
        self.values.iter().map(|(k, v)| (*k, *v))
    }

    /// Copy keeping only the options in `allowed`.
    pub fn filtered(&self, allowed: &[GenOption]) -> Self {
        Self {
            values: self
                .values
                .iter()
                .filter(|(k, _)| allowed.contains(k))
                .map(|(k, v)| (*k, *v))
                .collect(),
        }
    }

    /// Build from a raw JSON object, dropping unknown keys and non-numbers.
    pub fn from_json_map<I>(raw: I) -> Self
    where
        I: IntoIterator<Item = (String, serde_json::Value)>,
    {
        let mut config = Self::default();
        for (key, value) in raw {
            match (GenOption::from_key(&key), value.as_f64()) {
                (Some(option), Some(v)) => config.set(option, v),
                _ => tracing::trace!("Dropping generation option {}", key),
            }
        }
        config
    }
}

impl Serialize for GenerationConfig {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (option, value) in &self.values {
            map.serialize_entry(option.key(), &option.json_value(*value))?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for GenerationConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // null reads as no options
        let raw = Option::<HashMap<String, serde_json::Value>>::deserialize(deserializer)?;
        Ok(Self::from_json_map(raw.unwrap_or_default()))
    }
}
