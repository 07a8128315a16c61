use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use crate::core::error::{Error, ErrorKind, Result};

/// Bind parameters of one query: the names the query text uses and the values
/// the caller supplied. Collection parameters (`@@name`) are stored as `@name`.
#[derive(Debug, Default)]
pub struct BindParameters {
    names: BTreeSet<String>,
    values: BTreeMap<String, Value>,
}

pub fn is_collection_parameter(name: &str) -> bool {
    name.starts_with('@')
}

impl BindParameters {
    /// Records a parameter used by the query text.
    pub fn register_name(&mut self, name: &str) {
        self.names.insert(name.to_string());
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Takes the caller's values, a JSON object keyed by parameter name.
    pub fn add_values(&mut self, parameters: Option<&Value>) -> Result<()> {
        let Some(parameters) = parameters else {
            return Ok(());
        };
        let Value::Object(map) = parameters else {
            return Err(Error::new(
                ErrorKind::QueryBindParametersInvalid,
                "bind parameters must be an object",
            ));
        };
        for (name, value) in map {
            if name.is_empty() || name == "@" {
                return Err(Error::new(ErrorKind::QueryBindParametersInvalid, "empty bind parameter name"));
            }
            self.values.insert(name.clone(), value.clone());
        }
        Ok(())
    }

    /// Every used name needs a value and every value a use. Collection
    /// parameters must be collection names.
    pub fn validate(&self) -> Result<()> {
        if let Some(missing) = self.names.iter().find(|name| !self.values.contains_key(*name)) {
            return Err(Error::new(
                ErrorKind::QueryBindParameterMissing,
                format!("no value specified for declared bind parameter '{}'", missing),
            ));
        }
        if let Some(extra) = self.values.keys().find(|name| !self.names.contains(*name)) {
            return Err(Error::new(
                ErrorKind::QueryBindParameterUndeclared,
                format!("bind parameter '{}' was not declared in the query", extra),
            ));
        }
        for (name, value) in &self.values {
            if is_collection_parameter(name) && !value.is_string() {
                return Err(Error::new(
                    ErrorKind::QueryBindParameterValueInvalid,
                    format!("collection bind parameter '{}' must be a string", name),
                ));
            }
        }
        Ok(())
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parameters(names: &[&str], values: Value) -> Result<()> {
        let mut bind = BindParameters::default();
        names.iter().for_each(|name| bind.register_name(name));
        bind.add_values(Some(&values))?;
        bind.validate()
    }

    #[test]
    fn names_and_values_must_match() {
        parameters(&["a", "@c"], json!({"a": 1, "@c": "users"})).unwrap();
        let kind = |r: Result<()>| r.unwrap_err().kind;
        assert_eq!(kind(parameters(&["a"], json!({}))), ErrorKind::QueryBindParameterMissing);
        assert_eq!(kind(parameters(&[], json!({"a": 1}))), ErrorKind::QueryBindParameterUndeclared);
        assert_eq!(kind(parameters(&["@c"], json!({"@c": 3}))), ErrorKind::QueryBindParameterValueInvalid);
        assert_eq!(kind(parameters(&["a"], json!([1]))), ErrorKind::QueryBindParametersInvalid);
    }

    #[test]
    fn no_values_is_fine_without_names() {
        let mut bind = BindParameters::default();
        bind.add_values(None).unwrap();
        bind.validate().unwrap();
    }
}
