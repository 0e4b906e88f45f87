//! Transparent decryption of `ENC:`-marked property values

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use super::error::PropertyError;

/// Prefix marking a property value as encrypted
pub const ENCRYPTED_PREFIX: &str = "ENC:";

/// Environment variable consulted for the decryption key
pub const KEY_ENV_VAR: &str = "RUSTLE_PROVISION_KEY";

pub const DEFAULT_KEY_ATTEMPTS: u32 = 3;

pub fn is_encrypted(value: &str) -> bool {
    value.starts_with(ENCRYPTED_PREFIX)
}

/// Decrypts a single ciphertext with a key
#[async_trait]
pub trait SecretDecryptor: Send + Sync {
    async fn decrypt(&self, ciphertext: &str, key: &str) -> Result<String, String>;
}

/// Supplies (another) decryption key, typically by asking the operator
pub trait KeyPrompt: Send {
    fn prompt_key(&mut self, attempt: u32) -> Result<String, PropertyError>;
}

/// Decrypts through `openssl enc`, AES-256-CBC with PBKDF2 key derivation.
///
/// Ciphertext is the single-line base64 output of
/// `openssl enc -aes-256-cbc -pbkdf2 -a -A -pass env:RUSTLE_PROVISION_KEY`.
pub struct OpensslDecryptor {
    program: String,
}

impl OpensslDecryptor {
    pub fn new() -> Self {
        Self {
            program: "openssl".to_string(),
        }
    }
}

impl Default for OpensslDecryptor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SecretDecryptor for OpensslDecryptor {
    async fn decrypt(&self, ciphertext: &str, key: &str) -> Result<String, String> {
        STANDARD
            .decode(ciphertext.trim())
            .map_err(|e| format!("ciphertext is not valid base64: {e}"))?;

        let mut child = Command::new(&self.program)
            .args(["enc", "-d", "-aes-256-cbc", "-pbkdf2", "-a", "-A"])
            .arg("-pass")
            .arg(format!("env:{KEY_ENV_VAR}"))
            .env(KEY_ENV_VAR, key)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| format!("failed to run {}: {e}", self.program))?;

        let fed = match child.stdin.take() {
            Some(mut stdin) => {
                let written = stdin.write_all(ciphertext.trim().as_bytes()).await;
                // closing stdin ends openssl's input
                drop(stdin);
                written
            }
            None => Ok(()),
        };

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| format!("failed to wait for {}: {e}", self.program))?;
        fed.map_err(|e| format!("failed to write ciphertext: {e}"))?;

        if !output.status.success() {
            return Err(String::from_utf8_lossy(&output.stderr).trim().to_string());
        }

        String::from_utf8(output.stdout).map_err(|e| format!("plaintext is not UTF-8: {e}"))
    }
}

/// Asks for the key on the controlling terminal without echo
pub struct TerminalKeyPrompt;

impl KeyPrompt for TerminalKeyPrompt {
    fn prompt_key(&mut self, attempt: u32) -> Result<String, PropertyError> {
        let message = if attempt == 1 {
            "Property decryption key: ".to_string()
        } else {
            format!("Decryption failed, re-enter key (attempt {attempt}): ")
        };
        rpassword::prompt_password(message).map_err(|e| PropertyError::KeyUnavailable {
            reason: e.to_string(),
        })
    }
}

/// Reveals encrypted values, asking for a new key on failure up to a bounded
/// number of attempts. The working key is cached for the rest of the run.
pub struct SecretResolver {
    decryptor: Box<dyn SecretDecryptor>,
    prompt: Box<dyn KeyPrompt>,
    key: Option<String>,
    max_attempts: u32,
}

impl SecretResolver {
    pub fn new(decryptor: Box<dyn SecretDecryptor>, prompt: Box<dyn KeyPrompt>) -> Self {
        Self {
            decryptor,
            prompt,
            key: None,
            max_attempts: DEFAULT_KEY_ATTEMPTS,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Returns `value` unchanged unless it carries [`ENCRYPTED_PREFIX`]
    pub async fn reveal(&mut self, value: &str) -> Result<String, PropertyError> {
        let Some(ciphertext) = value.strip_prefix(ENCRYPTED_PREFIX) else {
            return Ok(value.to_string());
        };

        let mut last_reason = String::from("no key available");
        for attempt in 1..=self.max_attempts {
            let key = match self.key.take() {
                Some(key) => key,
                None => self.prompt.prompt_key(attempt)?,
            };

            match self.decryptor.decrypt(ciphertext, &key).await {
                Ok(plain) => {
                    debug!("Decrypted property value on attempt {}", attempt);
                    self.key = Some(key);
                    return Ok(plain);
                }
                Err(reason) => {
                    warn!("Decryption attempt {} failed: {}", attempt, reason);
                    last_reason = reason;
                }
            }
        }

        Err(PropertyError::DecryptionFailed {
            attempts: self.max_attempts,
            reason: last_reason,
        })
    }
}
