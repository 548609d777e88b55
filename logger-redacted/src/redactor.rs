use base64::{engine::general_purpose, Engine as _};
use regex::{Captures, Regex};
use sha2::{Digest, Sha256};

#[allow(clippy::unwrap_used)]
mod patterns {
    use lazy_static::lazy_static;
    use regex::Regex;

    lazy_static! {
        pub static ref PRIVATE_KEY_REGEX: Regex =
            Regex::new(r#"(?i)(private[_-]?key["']?\s*[:=]\s*["']?)([^\s"'&,;}]+)"#).unwrap();
        pub static ref QUERY_SECRET_REGEX: Regex =
            Regex::new(r"(?i)([?&](?:signature|accesstoken)=)([^&#\s]+)").unwrap();
        pub static ref HMAC_DIGEST_REGEX: Regex = Regex::new(r"\b[0-9a-fA-F]{64}\b").unwrap();
    }
}

/// Which kinds of credential material get masked
#[derive(Debug, Clone)]
pub struct RedactionConfig {
    pub redact_private_keys: bool,
    pub redact_query_secrets: bool,
    pub redact_hmac_digests: bool,
    pub hash_for_correlation: bool,
    pub custom_patterns: Vec<(Regex, String)>,
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            redact_private_keys: true,
            redact_query_secrets: true,
            redact_hmac_digests: true,
            hash_for_correlation: true,
            custom_patterns: Vec::new(),
        }
    }
}

/// Credential redactor for log messages and operator output
///
/// Private keys are HMAC secrets and request signatures are replayable
/// within the timestamp window, so neither may reach a log sink verbatim.
#[derive(Debug, Clone, Default)]
pub struct CredentialRedactor {
    config: RedactionConfig,
}

impl CredentialRedactor {
    pub fn new(config: RedactionConfig) -> Self {
        Self { config }
    }

    /// Redactor that leaves text untouched, for `redaction_enabled: false`
    pub fn disabled() -> Self {
        Self::new(RedactionConfig {
            redact_private_keys: false,
            redact_query_secrets: false,
            redact_hmac_digests: false,
            hash_for_correlation: false,
            custom_patterns: Vec::new(),
        })
    }

    pub fn redact(&self, text: &str) -> String {
        let mut result = text.to_string();

        if self.config.redact_private_keys {
            result = self.redact_private_keys(&result);
        }

        if self.config.redact_query_secrets {
            result = self.redact_query_secrets(&result);
        }

        if self.config.redact_hmac_digests {
            result = self.redact_hmac_digests(&result);
        }

        for (pattern, replacement) in &self.config.custom_patterns {
            result = pattern.replace_all(&result, replacement.as_str()).to_string();
        }

        result
    }

    /// Mask a whole secret value, whatever characters it contains
    ///
    /// Always masks, even on a disabled redactor.
    pub fn mask_secret(&self, secret: &str) -> String {
        self.mask("KEY", secret)
    }

    fn redact_private_keys(&self, text: &str) -> String {
        patterns::PRIVATE_KEY_REGEX
            .replace_all(text, |caps: &Captures| {
                format!("{}{}", &caps[1], self.mask("KEY", &caps[2]))
            })
            .to_string()
    }

    fn redact_query_secrets(&self, text: &str) -> String {
        patterns::QUERY_SECRET_REGEX
            .replace_all(text, |caps: &Captures| {
                format!("{}{}", &caps[1], self.mask("TOKEN", &caps[2]))
            })
            .to_string()
    }

    fn redact_hmac_digests(&self, text: &str) -> String {
        patterns::HMAC_DIGEST_REGEX
            .replace_all(text, |caps: &Captures| self.mask("SIG", &caps[0]))
            .to_string()
    }

    fn mask(&self, label: &str, value: &str) -> String {
        if self.config.hash_for_correlation {
            format!("{}[{}]", label, Self::hash_value(value))
        } else {
            "****".to_string()
        }
    }

    fn hash_value(value: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(value.as_bytes());
        let result = hasher.finalize();
        general_purpose::STANDARD.encode(&result[..8]) // First 8 bytes are enough to correlate
    }
}
