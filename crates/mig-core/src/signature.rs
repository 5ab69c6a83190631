//! Action authentication.
//!
//! Verification is split in two: the canonical form of the action is built
//! here, and the cryptographic check is delegated to a [`SignatureVerifier`]
//! fed with a readable keyring. The bundled [`Ed25519Verifier`] reads a
//! plain-text keyring of `<name> <base64 public key>` lines and armored
//! detached signatures produced by [`sign_action`].

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::Utc;
use ed25519_dalek::{Signature, Signer as _, SigningKey, Verifier as _, VerifyingKey};
use std::io::Read;
use tracing::{debug, error, warn};

use crate::action::Action;
use crate::error::VerificationError;

const ARMOR_BEGIN: &str = "-----BEGIN MIG SIGNATURE-----";
const ARMOR_END: &str = "-----END MIG SIGNATURE-----";

// ---------------------------------------------------------------------------
// Verification primitive
// ---------------------------------------------------------------------------

/// Outcome reported by a verification primitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub valid: bool,
    /// Name of the key that produced the signature, when known.
    pub signer: Option<String>,
}

/// External check of an armored signature over a payload.
///
/// Implementations must only read from the keyring. An `Err` means no
/// verdict could be reached; `Ok` with `valid == false` is a definitive
/// rejection.
pub trait SignatureVerifier: Send + Sync {
    fn verify(
        &self,
        payload: &str,
        armored_signature: &str,
        keyring: &mut dyn Read,
    ) -> Result<Verification, VerificationError>;
}

/// Canonicalize `action`, then ask `verifier` to check its signature.
pub fn verify_action(
    action: &Action,
    keyring: &mut dyn Read,
    verifier: &dyn SignatureVerifier,
) -> Result<Verification, VerificationError> {
    let payload = action
        .canonical_string()
        .map_err(VerificationError::Canonicalize)?;

    let verification = match verifier.verify(&payload, &action.pgp_signature, keyring) {
        Ok(v) => v,
        Err(e) => {
            error!(action_id = action.id, error = %e, "signature verification mechanism failed");
            return Err(e);
        }
    };
    if !verification.valid {
        warn!(action_id = action.id, "invalid action signature");
        return Err(VerificationError::InvalidSignature);
    }
    debug!(
        action_id = action.id,
        signer = verification.signer.as_deref().unwrap_or("unknown"),
        "action signature verified"
    );
    Ok(verification)
}

// ---------------------------------------------------------------------------
// Keyring
// ---------------------------------------------------------------------------

/// Named Ed25519 public keys.
#[derive(Debug, Clone, Default)]
pub struct Keyring {
    keys: Vec<(String, VerifyingKey)>,
}

impl Keyring {
    /// Parse `<name> <base64 key>` lines. Blank lines and `#` comments are skipped.
    pub fn read(reader: &mut dyn Read) -> Result<Self, VerificationError> {
        let mut content = String::new();
        reader
            .read_to_string(&mut content)
            .map_err(|e| VerificationError::Mechanism(format!("unreadable keyring: {e}")))?;

        let mut keys = Vec::new();
        for (lineno, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut parts = line.split_whitespace();
            let (Some(name), Some(encoded), None) = (parts.next(), parts.next(), parts.next())
            else {
                return Err(VerificationError::Mechanism(format!(
                    "keyring line {}: expected '<name> <base64 key>'",
                    lineno + 1
                )));
            };
            let key = decode_verifying_key(encoded).map_err(|e| {
                VerificationError::Mechanism(format!("keyring line {}: {e}", lineno + 1))
            })?;
            keys.push((name.to_string(), key));
        }
        Ok(Self { keys })
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// One keyring line for `key`.
    pub fn entry(name: &str, key: &VerifyingKey) -> String {
        format!("{name} {}", STANDARD.encode(key.as_bytes()))
    }

    fn find_signer(&self, payload: &[u8], signature: &Signature) -> Option<&str> {
        self.keys
            .iter()
            .find(|(_, key)| key.verify(payload, signature).is_ok())
            .map(|(name, _)| name.as_str())
    }
}

fn decode_verifying_key(encoded: &str) -> Result<VerifyingKey, String> {
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| format!("bad base64: {e}"))?;
    let bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|_| "public key must be 32 bytes".to_string())?;
    VerifyingKey::from_bytes(&bytes).map_err(|e| e.to_string())
}

// ---------------------------------------------------------------------------
// Ed25519Verifier
// ---------------------------------------------------------------------------

/// Verification primitive backed by Ed25519 and a plain-text keyring.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Verifier;

impl SignatureVerifier for Ed25519Verifier {
    fn verify(
        &self,
        payload: &str,
        armored_signature: &str,
        keyring: &mut dyn Read,
    ) -> Result<Verification, VerificationError> {
        let keyring = Keyring::read(keyring)?;
        if keyring.is_empty() {
            return Err(VerificationError::Mechanism(
                "keyring contains no keys".to_string(),
            ));
        }
        let signature = dearmor(armored_signature)?;
        let signer = keyring.find_signer(payload.as_bytes(), &signature);
        Ok(Verification {
            valid: signer.is_some(),
            signer: signer.map(str::to_string),
        })
    }
}

// ---------------------------------------------------------------------------
// Armor
// ---------------------------------------------------------------------------

pub fn armor(signature: &Signature) -> String {
    format!(
        "{ARMOR_BEGIN}\n{}\n{ARMOR_END}\n",
        STANDARD.encode(signature.to_bytes())
    )
}

pub fn dearmor(armored: &str) -> Result<Signature, VerificationError> {
    let body = armored
        .trim()
        .strip_prefix(ARMOR_BEGIN)
        .and_then(|rest| rest.strip_suffix(ARMOR_END))
        .ok_or_else(|| VerificationError::Mechanism("malformed signature armor".to_string()))?;
    let encoded: String = body.split_whitespace().collect();
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| VerificationError::Mechanism(format!("malformed signature body: {e}")))?;
    Signature::from_slice(&bytes)
        .map_err(|e| VerificationError::Mechanism(format!("malformed signature: {e}")))
}

// ---------------------------------------------------------------------------
// Signing
// ---------------------------------------------------------------------------

/// Sign the canonical form of `action` in place.
///
/// Sets `pgp_signature` and stamps `pgp_signature_date`. Neither field is part
/// of the canonical form, so signing twice yields the same payload.
pub fn sign_action(action: &mut Action, key: &SigningKey) -> Result<(), VerificationError> {
    let payload = action
        .canonical_string()
        .map_err(VerificationError::Canonicalize)?;
    action.pgp_signature = armor(&key.sign(payload.as_bytes()));
    action.pgp_signature_date = Utc::now();
    Ok(())
}

/// Fresh investigator key from OS randomness.
pub fn generate_signing_key() -> SigningKey {
    SigningKey::generate(&mut rand::rngs::OsRng)
}

pub fn encode_signing_key(key: &SigningKey) -> String {
    STANDARD.encode(key.to_bytes())
}

pub fn decode_signing_key(encoded: &str) -> Result<SigningKey, VerificationError> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| VerificationError::Mechanism(format!("bad signing key encoding: {e}")))?;
    let bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|_| VerificationError::Mechanism("signing key must be 32 bytes".to_string()))?;
    Ok(SigningKey::from_bytes(&bytes))
}
