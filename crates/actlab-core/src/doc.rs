use crate::error::Result;
use serde_yaml::{Mapping, Value};

/// A workflow/config document as a mutable YAML tree, addressed by
/// mapping-key paths. Sequence traversal (e.g. walking job steps) is done by
/// callers that know the shape; this type only covers the mapping spine.
#[derive(Debug, Clone, PartialEq)]
pub struct Doc(Value);

impl Doc {
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value = serde_yaml::from_str(text)?;
        Ok(Self(value))
    }

    pub fn from_value(value: Value) -> Self {
        Self(value)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.0)?)
    }

    pub fn root(&self) -> &Value {
        &self.0
    }

    pub fn root_mut(&mut self) -> &mut Value {
        &mut self.0
    }

    /// Read the value at `path`, or None if any segment is absent or not a
    /// mapping.
    pub fn get(&self, path: &[&str]) -> Option<&Value> {
        let mut cur = &self.0;
        for key in path {
            cur = cur.as_mapping()?.get(Value::from(*key))?;
        }
        Some(cur)
    }

    pub fn get_mut(&mut self, path: &[&str]) -> Option<&mut Value> {
        let mut cur = &mut self.0;
        for key in path {
            cur = cur.as_mapping_mut()?.get_mut(Value::from(*key))?;
        }
        Some(cur)
    }

    /// Write `value` at `path`, creating intermediate mappings as needed.
    /// A non-mapping intermediate node is replaced by a mapping.
    pub fn set(&mut self, path: &[&str], value: Value) {
        let Some((last, parents)) = path.split_last() else {
            self.0 = value;
            return;
        };
        let mut cur = &mut self.0;
        for key in parents {
            if !cur.is_mapping() {
                *cur = Value::Mapping(Mapping::new());
            }
            let map = cur.as_mapping_mut().expect("just ensured mapping");
            let key = Value::from(*key);
            if !map.contains_key(&key) {
                map.insert(key.clone(), Value::Mapping(Mapping::new()));
            }
            cur = map.get_mut(&key).expect("just inserted");
        }
        if !cur.is_mapping() {
            *cur = Value::Mapping(Mapping::new());
        }
        cur.as_mapping_mut()
            .expect("just ensured mapping")
            .insert(Value::from(*last), value);
    }

    /// Remove and return the value at `path`, or None if it was absent.
    pub fn remove(&mut self, path: &[&str]) -> Option<Value> {
        let (last, parents) = path.split_last()?;
        let mut cur = &mut self.0;
        for key in parents {
            cur = cur.as_mapping_mut()?.get_mut(Value::from(*key))?;
        }
        cur.as_mapping_mut()?.remove(Value::from(*last))
    }
}

/// Render a YAML scalar the way it appears in shell/env text: bare strings,
/// numbers, and booleans without quoting, null as the empty string.
pub fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}
