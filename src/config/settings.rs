use anyhow::Context;
use kafka_extension_consumer::ConsumerConfig;
use kafka_extension_producer::ProducerConfig;
use serde::de::DeserializeOwned;
use serde_yaml::Value;
use std::fs;
use std::path::Path;

pub const DEFAULT_CONSUMER_PREFIX: &str = "extensions.kafkaconsumer";
pub const DEFAULT_PRODUCER_PREFIX: &str = "extensions.kafkaproducer";

/// A parsed settings document.
///
/// Sections are looked up by dotted prefix. Prefix segments match mapping
/// keys case-insensitively; keys inside a section are exact. A missing or
/// empty section yields the section's defaults, and so does any key missing
/// from a present section.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    root: Value,
}

impl Settings {
    /// Load settings from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse settings file {}", path.display()))
    }

    /// Parse settings from a YAML string.
    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        let root: Value = serde_yaml::from_str(yaml).context("Invalid YAML")?;
        Ok(Self { root })
    }

    pub fn consumer(&self) -> anyhow::Result<ConsumerConfig> {
        self.consumer_with_prefix(DEFAULT_CONSUMER_PREFIX)
    }

    pub fn consumer_with_prefix(&self, prefix: &str) -> anyhow::Result<ConsumerConfig> {
        self.section(prefix)
    }

    pub fn producer(&self) -> anyhow::Result<ProducerConfig> {
        self.producer_with_prefix(DEFAULT_PRODUCER_PREFIX)
    }

    pub fn producer_with_prefix(&self, prefix: &str) -> anyhow::Result<ProducerConfig> {
        self.section(prefix)
    }

    /// Deserialize the section under `prefix`, or `T::default()` if absent.
    pub fn section<T: DeserializeOwned + Default>(&self, prefix: &str) -> anyhow::Result<T> {
        match self.lookup(prefix) {
            None | Some(Value::Null) => Ok(T::default()),
            Some(value) => serde_yaml::from_value(value.clone())
                .with_context(|| format!("Invalid settings under '{prefix}'")),
        }
    }

    fn lookup(&self, prefix: &str) -> Option<&Value> {
        prefix
            .split('.')
            .filter(|segment| !segment.is_empty())
            .try_fold(&self.root, |value, segment| {
                value.as_mapping()?.iter().find_map(|(key, child)| {
                    key.as_str()
                        .filter(|key| key.eq_ignore_ascii_case(segment))
                        .map(|_| child)
                })
            })
    }
}
