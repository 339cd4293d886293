//! Tool unlock tokens
//!
//! A token proves the caller read the tool documentation for *this*
//! installation, user and version. It is derived, never stored:
//!
//! ```text
//! token = hex(HMAC-SHA256(key = installation, msg = user || 0x00 || version))[..32]
//! ```
//!
//! Two shapes are accepted:
//! - direct: the token itself
//! - composite: `-{caller}-{token}`, used when one tool calls another and
//!   forwards its own token as an opaque prefix
//!
//! Validation is pure. It never logs or touches the filesystem, so it is
//! safe to call from any producer thread.

use std::fs;
use std::path::Path;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::info;

use crate::error::{BridgeError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Number of hex characters kept from the HMAC digest
pub const TOKEN_LEN: usize = 32;

/// Tool name mixed into the installation identity
pub const TOOL_NAME: &str = "user";

/// File inside the data directory that holds the installation UUID
pub const INSTALLATION_ID_FILE: &str = "installation-id";

/// The three inputs a token is derived from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenIdentity {
    installation: String,
    user: String,
    version: String,
}

impl TokenIdentity {
    pub fn new(
        installation: impl Into<String>,
        user: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            installation: installation.into(),
            user: user.into(),
            version: version.into(),
        }
    }

    /// Identity for this process: persisted installation id, the login user
    /// and the crate version.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let installation_id = load_or_create_installation_id(data_dir)?;
        Ok(Self::new(
            format!("{}:{}", installation_id, TOOL_NAME),
            current_user(),
            env!("CARGO_PKG_VERSION"),
        ))
    }

    /// The direct token this identity accepts
    pub fn expected_token(&self) -> String {
        // new_from_slice only fails for fixed-size keys; HMAC takes any length
        let mut mac = match HmacSha256::new_from_slice(self.installation.as_bytes()) {
            Ok(mac) => mac,
            Err(_) => return String::new(),
        };
        mac.update(self.user.as_bytes());
        mac.update(&[0u8]);
        mac.update(self.version.as_bytes());

        let mut token = hex::encode(mac.finalize().into_bytes());
        token.truncate(TOKEN_LEN);
        token
    }
}

/// Result of checking a presented token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenValidity {
    /// The presented value is the expected token
    Direct,
    /// Composite `-{caller}-{token}`; `caller` is passed through unverified
    Delegated { caller: String },
    Invalid,
}

impl TokenValidity {
    pub fn is_valid(&self) -> bool {
        !matches!(self, TokenValidity::Invalid)
    }
}

/// Check `presented` against the token `identity` expects.
pub fn validate(presented: &str, identity: &TokenIdentity) -> TokenValidity {
    let expected = identity.expected_token();
    if expected.is_empty() {
        return TokenValidity::Invalid;
    }

    if presented == expected {
        return TokenValidity::Direct;
    }

    // The expected token is pure hex, so the last '-' always separates it
    // from the caller prefix even when the prefix contains dashes itself.
    if let Some(rest) = presented.strip_prefix('-') {
        if let Some((caller, target)) = rest.rsplit_once('-') {
            if target == expected {
                return TokenValidity::Delegated {
                    caller: caller.to_string(),
                };
            }
        }
    }

    TokenValidity::Invalid
}

/// Login name from the environment, `unknown` when neither variable is set
fn current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}

/// Read `<data_dir>/installation-id`, generating it on first run
fn load_or_create_installation_id(data_dir: &Path) -> Result<String> {
    let id_path = data_dir.join(INSTALLATION_ID_FILE);

    if id_path.exists() {
        let id = fs::read_to_string(&id_path)
            .map_err(|e| BridgeError::io(&id_path, e))?
            .trim()
            .to_string();

        if !id.is_empty() {
            return Ok(id);
        }
    }

    let id = uuid::Uuid::new_v4().to_string();
    fs::create_dir_all(data_dir).map_err(|e| BridgeError::io(data_dir, e))?;
    fs::write(&id_path, &id).map_err(|e| BridgeError::io(&id_path, e))?;

    info!(path = %id_path.display(), "Generated new installation id");
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn identity() -> TokenIdentity {
        TokenIdentity::new("install-1234:user", "alice", "0.3.1")
    }

    #[test]
    fn test_expected_token_shape() {
        let token = identity().expected_token();
        assert_eq!(token.len(), TOKEN_LEN);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(!token.contains('-'));
    }

    #[test]
    fn test_expected_token_is_deterministic() {
        assert_eq!(identity().expected_token(), identity().expected_token());
    }

    #[test]
    fn test_token_depends_on_every_identity_part() {
        let base = identity().expected_token();
        let other_install = TokenIdentity::new("install-9999:user", "alice", "0.3.1");
        let other_user = TokenIdentity::new("install-1234:user", "bob", "0.3.1");
        let other_version = TokenIdentity::new("install-1234:user", "alice", "0.3.2");

        assert_ne!(base, other_install.expected_token());
        assert_ne!(base, other_user.expected_token());
        assert_ne!(base, other_version.expected_token());
    }

    #[test]
    fn test_separator_prevents_ambiguous_concatenation() {
        let a = TokenIdentity::new("k", "ab", "c").expected_token();
        let b = TokenIdentity::new("k", "a", "bc").expected_token();
        assert_ne!(a, b);
    }

    #[test]
    fn test_direct_token_is_valid() {
        let id = identity();
        assert_eq!(validate(&id.expected_token(), &id), TokenValidity::Direct);
    }

    #[test]
    fn test_wrong_tokens_are_invalid() {
        let id = identity();
        let expected = id.expected_token();

        let upper = expected.to_uppercase();
        for bad in ["", "-", "--", "abc", &expected[1..], upper.as_str()] {
            assert_eq!(validate(bad, &id), TokenValidity::Invalid, "{bad:?}");
        }
        assert_eq!(validate(&format!("{expected} "), &id), TokenValidity::Invalid);
    }

    #[test]
    fn test_composite_accepts_any_caller_prefix() {
        let id = identity();
        let expected = id.expected_token();

        for caller in ["", "caller", "with-many-dashes", "0123abcd"] {
            let presented = format!("-{caller}-{expected}");
            assert_eq!(
                validate(&presented, &id),
                TokenValidity::Delegated {
                    caller: caller.to_string()
                }
            );
        }
    }

    #[test]
    fn test_composite_with_wrong_target_is_invalid() {
        let id = identity();
        let expected = id.expected_token();

        assert_eq!(
            validate(&format!("-{expected}-deadbeef"), &id),
            TokenValidity::Invalid
        );
        // Missing the leading dash is not a composite token
        assert_eq!(
            validate(&format!("caller-{expected}"), &id),
            TokenValidity::Invalid
        );
    }

    #[test]
    fn test_is_valid() {
        assert!(TokenValidity::Direct.is_valid());
        assert!(TokenValidity::Delegated {
            caller: String::new()
        }
        .is_valid());
        assert!(!TokenValidity::Invalid.is_valid());
    }

    #[test]
    fn test_installation_id_is_created_once() {
        let temp_dir = TempDir::new().unwrap();
        let first = load_or_create_installation_id(temp_dir.path()).unwrap();
        let second = load_or_create_installation_id(temp_dir.path()).unwrap();

        assert_eq!(first, second);
        assert!(temp_dir.path().join(INSTALLATION_ID_FILE).exists());
    }

    #[test]
    fn test_identity_load_is_stable_across_calls() {
        let temp_dir = TempDir::new().unwrap();
        let a = TokenIdentity::load(temp_dir.path()).unwrap();
        let b = TokenIdentity::load(temp_dir.path()).unwrap();
        assert_eq!(a.expected_token(), b.expected_token());
    }

    #[test]
    fn test_empty_installation_file_is_regenerated() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(INSTALLATION_ID_FILE), "  \n").unwrap();

        let id = load_or_create_installation_id(temp_dir.path()).unwrap();
        assert!(uuid::Uuid::parse_str(&id).is_ok());
    }
}
