//! API key handling.
//!
//! Keys are wrapped in `secrecy` so they never reach logs, and are screened
//! for obvious placeholders before a backend is selected.

use secrecy::{ExposeSecret, SecretBox};
use std::fmt;

/// Shortest key any supported provider issues.
pub const MIN_KEY_LEN: usize = 20;

/// A secret string that won't be logged or displayed.
pub struct SecretString(SecretBox<str>);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretBox::new(Box::from(value.into().as_str())))
    }

    /// Only call this when building a request.
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl Clone for SecretString {
    fn clone(&self) -> Self {
        Self::new(self.expose())
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Why a credential was rejected before use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialIssue {
    Missing,
    Empty,
    Placeholder,
    TooShort,
}

impl fmt::Display for CredentialIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Missing => "credential missing",
            Self::Empty => "credential empty",
            Self::Placeholder => "credential is a placeholder",
            Self::TooShort => "credential too short",
        };
        f.write_str(text)
    }
}

/// Screen a key for presence and shape. Says nothing about whether the
/// provider will accept it.
pub fn check_key(key: Option<&SecretString>) -> Result<(), CredentialIssue> {
    let Some(key) = key else {
        return Err(CredentialIssue::Missing);
    };
    let value = key.expose().trim();

    if value.is_empty() {
        return Err(CredentialIssue::Empty);
    }
    if is_placeholder(value) {
        return Err(CredentialIssue::Placeholder);
    }
    if value.chars().count() < MIN_KEY_LEN {
        return Err(CredentialIssue::TooShort);
    }
    Ok(())
}

fn is_placeholder(value: &str) -> bool {
    let lowered = value.to_lowercase();
    lowered.starts_with("your_")
        || lowered.starts_with("your-")
        || lowered.ends_with("_here")
        || lowered.contains("changeme")
        || lowered.contains("replace_me")
        || (lowered.starts_with('<') && lowered.ends_with('>'))
        || (lowered.len() >= 3 && lowered.chars().all(|c| c == 'x' || c == '*'))
}

/// Key, model and endpoint for one remote model provider.
#[derive(Clone)]
pub struct ModelCredentials {
    pub api_key: Option<SecretString>,
    pub model: String,
    pub base_url: Option<String>,
}

impl ModelCredentials {
    pub fn new(api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.map(SecretString::new),
            model: model.into(),
            base_url: None,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn check(&self) -> Result<(), CredentialIssue> {
        check_key(self.api_key.as_ref())
    }
}

impl fmt::Debug for ModelCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelCredentials")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> Option<SecretString> {
        Some(SecretString::new(s))
    }

    #[test]
    fn test_secret_not_in_debug_or_display() {
        let secret = SecretString::new("sk-super-secret-key");
        assert!(!format!("{:?}", secret).contains("sk-super"));
        assert!(!format!("{}", secret).contains("sk-super"));
        assert_eq!(secret.expose(), "sk-super-secret-key");
    }

    #[test]
    fn test_check_key() {
        assert_eq!(check_key(None), Err(CredentialIssue::Missing));
        assert_eq!(check_key(key("   ").as_ref()), Err(CredentialIssue::Empty));
        assert_eq!(
            check_key(key("your_gemini_api_key_here").as_ref()),
            Err(CredentialIssue::Placeholder)
        );
        assert_eq!(
            check_key(key("<OPENAI_API_KEY>").as_ref()),
            Err(CredentialIssue::Placeholder)
        );
        assert_eq!(
            check_key(key("xxxxxxxxxxxxxxxxxxxxxxxx").as_ref()),
            Err(CredentialIssue::Placeholder)
        );
        assert_eq!(check_key(key("sk-short").as_ref()), Err(CredentialIssue::TooShort));
        assert!(check_key(key("sk-proj-abcdefghijklmnopqrstuvwxyz").as_ref()).is_ok());
    }

    #[test]
    fn test_model_credentials_debug() {
        let creds = ModelCredentials::new(Some("sk-secret-value".into()), "gpt-4o");
        let debug = format!("{:?}", creds);
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("gpt-4o"));
    }
}
