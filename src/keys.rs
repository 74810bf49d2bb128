use crate::error::{Error, Result};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};
use once_cell::sync::OnceCell;
use serde::Deserialize;
use std::fmt;

/// Token signing configuration.
///
/// Keys are PEM strings: PKCS#8 for the private key, SPKI for the public key.
#[derive(Clone, Deserialize)]
pub struct JwtConfig {
    /// Asymmetric signing algorithm.
    pub algorithm: Algorithm,
    /// Private key used to sign tokens.
    pub private_key: String,
    /// Public key used to verify tokens.
    pub public_key: String,
    /// Expected and issued `iss` claim.
    pub issuer: String,
    /// Expected and issued `aud` claim.
    pub audience: String,
    /// Clock skew tolerance in seconds for `exp` and `nbf`.
    #[serde(default)]
    pub leeway: u64,
}

impl JwtConfig {
    /// Creates a configuration with zero leeway.
    pub fn new(
        algorithm: Algorithm,
        private_key: impl Into<String>,
        public_key: impl Into<String>,
        issuer: impl Into<String>,
        audience: impl Into<String>,
    ) -> Self {
        Self {
            algorithm,
            private_key: private_key.into(),
            public_key: public_key.into(),
            issuer: issuer.into(),
            audience: audience.into(),
            leeway: 0,
        }
    }

    /// Sets the clock skew tolerance.
    pub fn leeway(mut self, seconds: u64) -> Self {
        self.leeway = seconds;
        self
    }
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("algorithm", &self.algorithm)
            .field("private_key", &"<redacted>")
            .field("public_key", &self.public_key)
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("leeway", &self.leeway)
            .finish()
    }
}

#[derive(Clone, Copy)]
enum KeyFamily {
    Rsa,
    Ec,
    Ed,
}

fn key_family(algorithm: Algorithm) -> Result<KeyFamily> {
    match algorithm {
        Algorithm::RS256
        | Algorithm::RS384
        | Algorithm::RS512
        | Algorithm::PS256
        | Algorithm::PS384
        | Algorithm::PS512 => Ok(KeyFamily::Rsa),
        Algorithm::ES256 | Algorithm::ES384 => Ok(KeyFamily::Ec),
        Algorithm::EdDSA => Ok(KeyFamily::Ed),
        other => Err(Error::UnsupportedAlgorithm(other)),
    }
}

/// Lazily imported key pair.
///
/// Each key is parsed on first use and cached for the lifetime of the value.
pub struct KeyMaterial {
    config: JwtConfig,
    secret: OnceCell<EncodingKey>,
    pubkey: OnceCell<DecodingKey>,
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("config", &self.config)
            .field("secret_loaded", &self.secret.get().is_some())
            .field("pubkey_loaded", &self.pubkey.get().is_some())
            .finish()
    }
}

impl KeyMaterial {
    /// Creates key material without parsing any key yet.
    pub fn new(config: JwtConfig) -> Self {
        Self {
            config,
            secret: OnceCell::new(),
            pubkey: OnceCell::new(),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &JwtConfig {
        &self.config
    }

    /// Returns the signing algorithm.
    pub fn algorithm(&self) -> Algorithm {
        self.config.algorithm
    }

    /// Returns the signing key, importing it on first call.
    pub fn secret(&self) -> Result<&EncodingKey> {
        self.secret.get_or_try_init(|| {
            let pem = self.config.private_key.as_bytes();
            let key = match key_family(self.config.algorithm)? {
                KeyFamily::Rsa => EncodingKey::from_rsa_pem(pem),
                KeyFamily::Ec => EncodingKey::from_ec_pem(pem),
                KeyFamily::Ed => EncodingKey::from_ed_pem(pem),
            };
            key.map_err(|err| {
                tracing::warn!(algorithm = ?self.config.algorithm, error = %err, "private key import failed");
                Error::Key(err)
            })
        })
    }

    /// Returns the verification key, importing it on first call.
    pub fn pubkey(&self) -> Result<&DecodingKey> {
        self.pubkey.get_or_try_init(|| {
            let pem = self.config.public_key.as_bytes();
            let key = match key_family(self.config.algorithm)? {
                KeyFamily::Rsa => DecodingKey::from_rsa_pem(pem),
                KeyFamily::Ec => DecodingKey::from_ec_pem(pem),
                KeyFamily::Ed => DecodingKey::from_ed_pem(pem),
            };
            key.map_err(|err| {
                tracing::warn!(algorithm = ?self.config.algorithm, error = %err, "public key import failed");
                Error::Key(err)
            })
        })
    }
}
