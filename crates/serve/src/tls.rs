//! Transport security configuration.

use thiserror::Error;

/// How the listener terminates connections.
#[derive(Debug, Clone)]
pub enum TransportSecurity {
    /// No TLS at all.
    Plaintext,
    /// Real TLS with the given identity.
    Tls {
        /// PEM-encoded certificate chain.
        cert_pem: Vec<u8>,
        /// PEM-encoded private key.
        key_pem: Vec<u8>,
    },
}

/// Invalid transport flag combinations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    /// `--plaintext` and `--insecure` together make no sense.
    #[error("plaintext and insecure-skip-verify are mutually exclusive")]
    ConflictingFlags,
    /// TLS requested without a full identity.
    #[error("tls requires both a certificate and a private key")]
    IncompleteIdentity,
}

impl TransportSecurity {
    /// Resolves the flag trio into a security mode.
    ///
    /// `insecure` relaxes certificate verification but still runs TLS, so a
    /// server identity remains required; combining it with `plaintext` is
    /// rejected as an invalid argument.
    pub fn from_flags(
        plaintext: bool,
        insecure_skip_verify: bool,
        cert_pem: Option<Vec<u8>>,
        key_pem: Option<Vec<u8>>,
    ) -> Result<Self, TransportError> {
        if plaintext && insecure_skip_verify {
            return Err(TransportError::ConflictingFlags);
        }
        if plaintext {
            return Ok(Self::Plaintext);
        }
        match (cert_pem, key_pem) {
            (Some(cert_pem), Some(key_pem)) => Ok(Self::Tls { cert_pem, key_pem }),
            (None, None) if !insecure_skip_verify => Ok(Self::Plaintext),
            _ => Err(TransportError::IncompleteIdentity),
        }
    }
}
