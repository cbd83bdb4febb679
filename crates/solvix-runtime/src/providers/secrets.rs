//! Credential handling for LLM providers.
//!
//! Every provider key passes through [`ApiCredential`]:
//!
//! - **No accidental logging**: `Debug` and `Display` show `[REDACTED]`
//! - **Memory hygiene**: values are zeroed on drop via `secrecy`
//! - **Explicit use**: the raw value is only reachable through [`ApiCredential::expose`]
//!
//! ## Usage
//!
//! ```ignore
//! use solvix_runtime::providers::ApiCredential;
//!
//! let cred = ApiCredential::new(key, CredentialSource::Environment, "Gemini API key");
//! if !cred.is_empty() {
//!     request.header("x-goog-api-key", cred.expose());
//! }
//! ```

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};
use std::fmt;

/// Where a credential was loaded from.
///
/// Useful when debugging configuration without exposing the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// Settings file
    Config,
    /// Environment variable
    Environment,
    /// Provided programmatically
    Programmatic,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Config => write!(f, "config"),
            CredentialSource::Environment => write!(f, "environment"),
            CredentialSource::Programmatic => write!(f, "programmatic"),
        }
    }
}

/// A securely-stored API credential.
pub struct ApiCredential {
    value: SecretString,
    source: CredentialSource,
    name: &'static str,
}

impl ApiCredential {
    /// Wrap a raw value. It cannot be printed after this point.
    pub fn new(value: impl Into<String>, source: CredentialSource, name: &'static str) -> Self {
        Self {
            value: SecretString::from(value.into()),
            source,
            name,
        }
    }

    /// Expose the value for use in a request header.
    ///
    /// Only call this at the point of use. Never store the result.
    pub fn expose(&self) -> &str {
        self.value.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.value.expose_secret().trim().is_empty()
    }

    pub fn source(&self) -> CredentialSource {
        self.source
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Rename for log and error messages.
    pub fn named(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }
}

impl Clone for ApiCredential {
    fn clone(&self) -> Self {
        Self {
            value: SecretString::from(self.value.expose_secret().to_string()),
            source: self.source,
            name: self.name,
        }
    }
}

impl<'de> Deserialize<'de> for ApiCredential {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Ok(Self::new(value, CredentialSource::Config, "API key"))
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredential")
            .field("value", &"[REDACTED]")
            .field("source", &self.source)
            .field("name", &self.name)
            .finish()
    }
}

impl fmt::Display for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} from {} [REDACTED]", self.name, self.source)
    }
}
