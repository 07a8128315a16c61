use serde::{Deserialize, Serialize};

use crate::core::error::{Error, ErrorKind, Result};
use crate::core::utils::{is_valid_document_key, new_tick, update_tick};

/// `keyOptions` of a collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyOptions {
    #[serde(rename = "type")]
    pub kind: String,
    pub allow_user_keys: bool,
}

impl Default for KeyOptions {
    fn default() -> Self {
        KeyOptions {
            kind: "traditional".to_string(),
            allow_user_keys: true,
        }
    }
}

/// Traditional key generator: keys are server ticks unless the user supplies one.
#[derive(Debug, Clone)]
pub struct KeyGenerator {
    allow_user_keys: bool,
}

impl KeyGenerator {
    pub fn new(options: &KeyOptions) -> Result<Self> {
        if options.kind != "traditional" {
            return Err(Error::new(
                ErrorKind::BadParameter,
                format!("unsupported key generator '{}'", options.kind),
            ));
        }
        Ok(KeyGenerator {
            allow_user_keys: options.allow_user_keys,
        })
    }

    /// The key for a new document, validating a user supplied one.
    pub fn generate(&self, user_key: Option<&str>) -> Result<String> {
        match user_key {
            None => Ok(new_tick().to_string()),
            Some(_) if !self.allow_user_keys => Err(Error::new(
                ErrorKind::DocumentKeyUnexpected,
                "collection does not allow user defined keys",
            )),
            Some(key) => {
                self.validate(key)?;
                self.track(key);
                Ok(key.to_string())
            }
        }
    }

    pub fn validate(&self, key: &str) -> Result<()> {
        if is_valid_document_key(key) {
            Ok(())
        } else {
            Err(Error::new(ErrorKind::DocumentKeyBad, format!("illegal document key '{}'", key)))
        }
    }

    /// Numeric user keys move the tick generator so generated keys never collide.
    pub fn track(&self, key: &str) {
        if let Ok(tick) = key.parse::<u64>() {
            update_tick(tick);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keys_are_ticks() {
        let generator = KeyGenerator::new(&KeyOptions::default()).unwrap();
        let a: u64 = generator.generate(None).unwrap().parse().unwrap();
        let b: u64 = generator.generate(None).unwrap().parse().unwrap();
        assert!(b > a);
    }

    #[test]
    fn numeric_user_keys_advance_the_generator() {
        let generator = KeyGenerator::new(&KeyOptions::default()).unwrap();
        let far = crate::core::utils::current_tick() + 1_000;
        generator.generate(Some(&far.to_string())).unwrap();
        let next: u64 = generator.generate(None).unwrap().parse().unwrap();
        assert!(next > far);
    }

    #[test]
    fn user_keys_are_checked() {
        let generator = KeyGenerator::new(&KeyOptions::default()).unwrap();
        assert_eq!(generator.generate(Some("a b")).unwrap_err().kind, ErrorKind::DocumentKeyBad);

        let strict = KeyGenerator::new(&KeyOptions {
            allow_user_keys: false,
            ..KeyOptions::default()
        })
        .unwrap();
        assert_eq!(strict.generate(Some("abc")).unwrap_err().kind, ErrorKind::DocumentKeyUnexpected);

        let options = KeyOptions { kind: "autoincrement".to_string(), allow_user_keys: true };
        assert!(KeyGenerator::new(&options).is_err());
    }
}
