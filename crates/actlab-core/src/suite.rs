use crate::error::{HarnessError, Result};
use crate::workflow::StepOverrides;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer};
use serde_yaml::Value;
use std::path::Path;

/// YAML authors leave keys dangling (`test:` with nothing under it); treat
/// an explicit null the same as an absent key.
fn null_as_default<'de, D, T>(de: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(de)?.unwrap_or_default())
}

/// Include/exclude marker lists for one experiment. Markers are matched
/// against the runner's log after being prefixed with the "step ran" marker
/// (see [`crate::assertion`]).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Assertions {
    #[serde(default, deserialize_with = "null_as_default")]
    pub includes: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub excludes: Vec<String>,
}

/// The body under an experiment's event key.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ExperimentBody {
    #[serde(default, deserialize_with = "null_as_default")]
    inputs: IndexMap<String, Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    outputs: StepOverrides,
    #[serde(default, deserialize_with = "null_as_default")]
    test: Assertions,
}

/// One declared scenario: a trigger event, optional inputs, optional step
/// output overrides, and log assertions.
#[derive(Debug, Clone)]
pub struct Experiment {
    pub title: String,
    pub event: String,
    pub inputs: IndexMap<String, Value>,
    pub overrides: StepOverrides,
    pub assertions: Assertions,
}

/// Ordered experiment list, immutable after load.
#[derive(Debug, Clone, Default)]
pub struct ExperimentSuite {
    pub experiments: Vec<Experiment>,
}

impl ExperimentSuite {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(HarnessError::SuiteNotFound(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Parse and validate a suite document. Any structural problem is fatal:
    /// no partial suite is ever returned. An empty experiment list is valid.
    pub fn parse(text: &str) -> Result<Self> {
        let raw: Value = serde_yaml::from_str(text)?;
        let entries = raw
            .as_mapping()
            .and_then(|m| m.get("experiments"))
            .ok_or_else(|| {
                HarnessError::MalformedSuite("missing top-level 'experiments' list".into())
            })?
            .as_sequence()
            .ok_or_else(|| {
                HarnessError::MalformedSuite("'experiments' must be a list".into())
            })?;

        let mut experiments = Vec::with_capacity(entries.len());
        for entry in entries {
            experiments.push(Self::parse_entry(entry)?);
        }
        Ok(Self { experiments })
    }

    fn parse_entry(entry: &Value) -> Result<Experiment> {
        let map = entry.as_mapping().ok_or_else(|| {
            HarnessError::MalformedSuite("experiment entry must be a mapping".into())
        })?;
        let title = map
            .get("it")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                HarnessError::MalformedSuite("experiment entry missing 'it' title".into())
            })?
            .to_string();

        // Exactly one key besides the title names the trigger event.
        let mut events = map
            .iter()
            .filter(|(k, _)| k.as_str() != Some("it"))
            .collect::<Vec<_>>();
        match events.len() {
            0 => return Err(HarnessError::MissingEvent { title }),
            1 => {}
            _ => {
                let names = events
                    .iter()
                    .map(|(k, _)| k.as_str().unwrap_or("<non-string>").to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                return Err(HarnessError::AmbiguousEvent {
                    title,
                    events: names,
                });
            }
        }
        let (event_key, body) = events.pop().expect("length checked");
        let event = event_key
            .as_str()
            .ok_or_else(|| {
                HarnessError::MalformedSuite(format!(
                    "experiment '{title}' has a non-string event key"
                ))
            })?
            .to_string();

        // A bare event key (`push:` with no body) is a valid "just run it"
        // experiment.
        let body: ExperimentBody = if body.is_null() {
            ExperimentBody::default()
        } else {
            serde_yaml::from_value(body.clone()).map_err(|e| {
                HarnessError::MalformedSuite(format!("experiment '{title}': {e}"))
            })?
        };

        Ok(Experiment {
            title,
            event,
            inputs: body.inputs,
            overrides: body.outputs,
            assertions: body.test,
        })
    }
}
