//! Service credential from the environment.

use secrecy::SecretString;

/// Environment variable holding the service API key.
pub const API_KEY_ENV: &str = "OUTREACH_API_KEY";

/// The API key, if set and non-empty. Never logged.
pub fn api_key_from_env() -> Option<SecretString> {
    api_key_from(std::env::var(API_KEY_ENV).ok())
}

fn api_key_from(value: Option<String>) -> Option<SecretString> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(SecretString::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_key_is_trimmed() {
        let key = api_key_from(Some(" sk-test \n".to_string())).unwrap();
        assert_eq!(key.expose_secret(), "sk-test");
    }

    #[test]
    fn test_blank_or_missing_key_is_none() {
        assert!(api_key_from(Some("   ".to_string())).is_none());
        assert!(api_key_from(None).is_none());
    }
}
