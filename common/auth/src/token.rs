use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use data_encoding::BASE32_NOPAD;
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::employee::EmployeeId;
use crate::error::{AuthError, AuthResult};

const TOKEN_ENTROPY_BYTES: usize = 16;

/// SHA-256 of a token plaintext. The only form of a token that is persisted.
pub type TokenHash = [u8; 32];

/// Purpose a token was issued for. Scopes never satisfy each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Activation,
    Authentication,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Activation => "activation",
            Scope::Authentication => "authentication",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "activation" => Ok(Scope::Activation),
            "authentication" => Ok(Scope::Authentication),
            other => Err(format!("unknown token scope '{other}'")),
        }
    }
}

/// A freshly issued token. This value is the only place the plaintext ever
/// exists server-side; it is handed to the caller once and then dropped.
#[derive(Clone, Serialize)]
pub struct Token {
    #[serde(rename = "token")]
    pub plaintext: String,
    #[serde(skip)]
    pub hash: TokenHash,
    #[serde(rename = "userId")]
    pub user_id: EmployeeId,
    pub expiry: DateTime<Utc>,
    pub scope: Scope,
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("plaintext", &"<redacted>")
            .field("user_id", &self.user_id)
            .field("expiry", &self.expiry)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Persisted shape of a token: digest, owner, expiry and scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRecord {
    pub hash: TokenHash,
    pub user_id: EmployeeId,
    pub expiry: DateTime<Utc>,
    pub scope: Scope,
}

impl TokenRecord {
    /// Valid iff the scope matches and expiry is strictly after `now`.
    pub fn is_live(&self, scope: Scope, now: DateTime<Utc>) -> bool {
        self.scope == scope && self.expiry > now
    }
}

impl Token {
    pub fn generate(
        user_id: EmployeeId,
        ttl: Duration,
        scope: Scope,
        now: DateTime<Utc>,
    ) -> AuthResult<Self> {
        let mut random = [0u8; TOKEN_ENTROPY_BYTES];
        OsRng
            .try_fill_bytes(&mut random)
            .map_err(|err| AuthError::Entropy(err.to_string()))?;

        let plaintext = BASE32_NOPAD.encode(&random);
        let hash = token_digest(&plaintext);

        Ok(Self {
            plaintext,
            hash,
            user_id,
            expiry: now + ttl,
            scope,
        })
    }

    pub fn record(&self) -> TokenRecord {
        TokenRecord {
            hash: self.hash,
            user_id: self.user_id,
            expiry: self.expiry,
            scope: self.scope,
        }
    }
}

pub fn token_digest(plaintext: &str) -> TokenHash {
    Sha256::digest(plaintext.as_bytes()).into()
}
