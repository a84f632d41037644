// ABOUTME: Vendor login cryptography: AES-ECB envelope codec and RSA password encryption
// ABOUTME: Implements the vendors' client-side wire contracts bit-for-bit, weaknesses included
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! Cryptographic primitives mandated by the vendor protocols.
//!
//! Nothing in this module is a security boundary. The envelope scheme uses
//! AES-128-ECB with a key shipped inside every official vendor app, and the
//! asymmetric schemes use RSA PKCS#1 v1.5; both are weak by modern
//! standards and both are non-negotiable: the vendor servers accept exactly
//! this framing and nothing else. Changing mode or padding breaks wire
//! compatibility, so the weaknesses are documented and preserved.

use aes::Aes128;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use ecb::cipher::block_padding::Pkcs7;
use ecb::cipher::{BlockDecryptMut, BlockEncryptMut, KeyInit};
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::{Pkcs1v15Encrypt, RsaPublicKey};

use crate::errors::{SyncError, SyncResult};

/// Block/key size of the envelope cipher; the vendor key is plain ASCII.
const ENVELOPE_KEY_LEN: usize = 16;

/// Whole-payload cipher for the symmetric envelope scheme.
///
/// Requests are JSON-serialized, ECB-encrypted with PKCS#7 padding,
/// base64-encoded, and wrapped as `{"encryptData": <b64>}`; responses mirror
/// the shape on their `data` field.
#[derive(Clone)]
pub struct EnvelopeCipher {
    vendor: String,
    key: [u8; ENVELOPE_KEY_LEN],
}

impl EnvelopeCipher {
    /// Build a cipher from the profile-embedded key string.
    ///
    /// # Errors
    /// Returns [`SyncError::Configuration`] if the key is not exactly 16
    /// bytes.
    pub fn new(vendor: &str, key: &str) -> SyncResult<Self> {
        let bytes = key.as_bytes();
        let key: [u8; ENVELOPE_KEY_LEN] = bytes.try_into().map_err(|_| {
            SyncError::configuration(
                vendor,
                format!(
                    "envelope key must be {ENVELOPE_KEY_LEN} bytes, got {}",
                    bytes.len()
                ),
            )
        })?;
        Ok(Self {
            vendor: vendor.to_owned(),
            key,
        })
    }

    /// Encrypt a plaintext payload to the base64 form the vendor expects.
    #[must_use]
    pub fn encrypt(&self, plaintext: &str) -> String {
        let ciphertext = ecb::Encryptor::<Aes128>::new(&self.key.into())
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());
        BASE64_STANDARD.encode(ciphertext)
    }

    /// Decrypt a base64 envelope body back to its plaintext payload.
    ///
    /// # Errors
    /// Returns [`SyncError::Decryption`] on bad base64, padding, or non-UTF-8
    /// plaintext.
    pub fn decrypt(&self, ciphertext_b64: &str) -> SyncResult<String> {
        let ciphertext = BASE64_STANDARD
            .decode(ciphertext_b64.trim())
            .map_err(|e| SyncError::decryption(&self.vendor, format!("invalid base64: {e}")))?;

        let plaintext = ecb::Decryptor::<Aes128>::new(&self.key.into())
            .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
            .map_err(|e| SyncError::decryption(&self.vendor, format!("invalid padding: {e}")))?;

        String::from_utf8(plaintext)
            .map_err(|e| SyncError::decryption(&self.vendor, format!("non-UTF-8 plaintext: {e}")))
    }
}

impl std::fmt::Debug for EnvelopeCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Key bytes deliberately omitted from debug output.
        f.debug_struct("EnvelopeCipher")
            .field("vendor", &self.vendor)
            .finish_non_exhaustive()
    }
}

/// Encrypt an account password with a vendor public key, PKCS#1 v1.5 padded
/// and base64-encoded as the login endpoints expect.
///
/// Accepts both SubjectPublicKeyInfo (`BEGIN PUBLIC KEY`) and PKCS#1
/// (`BEGIN RSA PUBLIC KEY`) PEM envelopes, since vendors ship either.
///
/// # Errors
/// Returns [`SyncError::Configuration`] if the key fails to parse or is too
/// small for the password.
pub fn encrypt_password(vendor: &str, public_key_pem: &str, password: &str) -> SyncResult<String> {
    let key = RsaPublicKey::from_public_key_pem(public_key_pem)
        .or_else(|_| RsaPublicKey::from_pkcs1_pem(public_key_pem))
        .map_err(|e| SyncError::configuration(vendor, format!("public key unparseable: {e}")))?;

    let mut rng = rand::rngs::OsRng;
    let ciphertext = key
        .encrypt(&mut rng, Pkcs1v15Encrypt, password.as_bytes())
        .map_err(|e| SyncError::configuration(vendor, format!("password encryption failed: {e}")))?;

    Ok(BASE64_STANDARD.encode(ciphertext))
}

/// Wrap a bare base64 key body in standard PEM headers.
///
/// One vendor's key endpoint returns the DER body without the PEM envelope;
/// the RSA importer requires the markers and 64-column lines.
#[must_use]
pub fn ensure_pem(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.contains("-----BEGIN") {
        return trimmed.to_owned();
    }

    let body: String = trimmed.split_whitespace().collect();
    let mut pem = String::with_capacity(body.len() + 64);
    pem.push_str("-----BEGIN PUBLIC KEY-----\n");
    for chunk in body.as_bytes().chunks(64) {
        pem.push_str(&String::from_utf8_lossy(chunk));
        pem.push('\n');
    }
    pem.push_str("-----END PUBLIC KEY-----");
    pem
}
