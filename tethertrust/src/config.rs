// Protocol configuration shared by both peers.
//
// Nothing here is negotiated: two peers interoperate only if they load the
// same curve, cipher suite and context label.

use serde::{Deserialize, Serialize};

use crate::crypto::aead::CipherSuite;
use crate::crypto::agreement::Curve;
use crate::error::{Result, TetherTrustError};

/// Default HKDF context label identifying this protocol and its version.
pub const DEFAULT_CONTEXT: &str = "tether/secure-channel/v1";

/// Static protocol parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProtocolConfig {
    /// Curve for the ephemeral ECDH exchange.
    pub curve: Curve,
    /// AEAD used for records.
    pub cipher: CipherSuite,
    /// HKDF context label.
    pub context: String,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            curve: Curve::default(),
            cipher: CipherSuite::default(),
            context: DEFAULT_CONTEXT.to_string(),
        }
    }
}

impl ProtocolConfig {
    /// Parse and validate a JSON document. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| TetherTrustError::Config(format!("{e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.context.is_empty() {
            return Err(TetherTrustError::Config("context label must not be empty".into()));
        }
        Ok(())
    }
}
