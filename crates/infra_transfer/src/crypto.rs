//! Envelope encryption for payer files
//!
//! Each message is sealed for one payer public key:
//!
//! 1. A fresh X25519 ephemeral secret is agreed with the recipient key.
//! 2. The AES-256-GCM key is `SHA-256(context || shared || eph_pub || recipient_pub)`.
//! 3. The output `version || eph_pub || nonce || ciphertext` is ASCII-armored.
//!
//! Private keys never exist on disk in the clear. Their armor holds the
//! X25519 secret sealed with AES-256-GCM under a PBKDF2-HMAC-SHA256 key
//! derived from the payer passphrase.

use std::fmt;

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

use crate::error::CryptoError;

const ENVELOPE_CONTEXT: &[u8] = b"accumulation-envelope-v1";
const FORMAT_VERSION: u8 = 1;
const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const SALT_LEN: usize = 16;
const TAG_LEN: usize = 16;
const LINE_WIDTH: usize = 64;

const MESSAGE_LABEL: &str = "ACCUMULATION MESSAGE";
const PUBLIC_KEY_LABEL: &str = "ACCUMULATION PUBLIC KEY";
const PRIVATE_KEY_LABEL: &str = "ACCUMULATION PRIVATE KEY";

/// PBKDF2 rounds used when locking a newly generated private key
pub const DEFAULT_KDF_ITERATIONS: u32 = 210_000;

/// A passphrase held in memory that is wiped on drop
#[derive(Clone)]
pub struct Passphrase(Zeroizing<String>);

impl Passphrase {
    pub fn new(value: impl Into<String>) -> Self {
        Self(Zeroizing::new(value.into()))
    }

    /// Reads the passphrase from the named environment variable
    pub fn from_env(variable: &str) -> Result<Self, CryptoError> {
        std::env::var(variable)
            .map(Self::new)
            .map_err(|_| CryptoError::KeyImport(format!("passphrase variable {variable} is not set")))
    }

    fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Passphrase(<redacted>)")
    }
}

/// A payer's public key, used to seal outbound files
#[derive(Clone, PartialEq, Eq)]
pub struct PayerPublicKey(PublicKey);

impl PayerPublicKey {
    /// Imports an armored public key
    pub fn from_armored(text: &str) -> Result<Self, CryptoError> {
        let bytes = dearmor(PUBLIC_KEY_LABEL, text).map_err(CryptoError::KeyImport)?;
        let raw: [u8; KEY_LEN] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| CryptoError::KeyImport(format!("public key must be {KEY_LEN} bytes, got {}", bytes.len())))?;
        Ok(Self(PublicKey::from(raw)))
    }

    pub fn to_armored(&self) -> String {
        armor(PUBLIC_KEY_LABEL, self.0.as_bytes())
    }

    /// Short hex digest of the key, safe to log
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.0.as_bytes());
        digest[..8].iter().map(|b| format!("{b:02X}")).collect()
    }
}

impl fmt::Debug for PayerPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PayerPublicKey({})", self.fingerprint())
    }
}

/// A passphrase-locked private key
#[derive(Clone)]
pub struct PayerPrivateKey {
    salt: [u8; SALT_LEN],
    iterations: u32,
    nonce: [u8; NONCE_LEN],
    sealed: Vec<u8>,
}

impl PayerPrivateKey {
    /// Imports an armored private key without unlocking it
    pub fn from_armored(text: &str) -> Result<Self, CryptoError> {
        let bytes = dearmor(PRIVATE_KEY_LABEL, text).map_err(CryptoError::KeyImport)?;
        let expected = 1 + SALT_LEN + 4 + NONCE_LEN + KEY_LEN + TAG_LEN;
        if bytes.len() != expected {
            return Err(CryptoError::KeyImport(format!(
                "private key must be {expected} bytes, got {}",
                bytes.len()
            )));
        }
        if bytes[0] != FORMAT_VERSION {
            return Err(CryptoError::KeyImport(format!("unsupported key version {}", bytes[0])));
        }

        let mut offset = 1;
        let mut salt = [0u8; SALT_LEN];
        salt.copy_from_slice(&bytes[offset..offset + SALT_LEN]);
        offset += SALT_LEN;

        let mut rounds = [0u8; 4];
        rounds.copy_from_slice(&bytes[offset..offset + 4]);
        let iterations = u32::from_be_bytes(rounds);
        if iterations == 0 {
            return Err(CryptoError::KeyImport("key derivation iterations must be positive".to_string()));
        }
        offset += 4;

        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&bytes[offset..offset + NONCE_LEN]);
        offset += NONCE_LEN;

        Ok(Self {
            salt,
            iterations,
            nonce,
            sealed: bytes[offset..].to_vec(),
        })
    }

    pub fn to_armored(&self) -> String {
        let mut bytes = Vec::with_capacity(1 + SALT_LEN + 4 + NONCE_LEN + self.sealed.len());
        bytes.push(FORMAT_VERSION);
        bytes.extend_from_slice(&self.salt);
        bytes.extend_from_slice(&self.iterations.to_be_bytes());
        bytes.extend_from_slice(&self.nonce);
        bytes.extend_from_slice(&self.sealed);
        armor(PRIVATE_KEY_LABEL, &bytes)
    }

    fn lock(secret: &StaticSecret, passphrase: &Passphrase, iterations: u32) -> Result<Self, CryptoError> {
        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let wrap_key = derive_passphrase_key(passphrase, &salt, iterations);
        let cipher = Aes256Gcm::new_from_slice(wrap_key.as_ref())
            .map_err(|e| CryptoError::Encryption(format!("invalid wrap key: {e}")))?;
        let secret_bytes = Zeroizing::new(secret.to_bytes());
        let sealed = cipher
            .encrypt(Nonce::from_slice(&nonce), secret_bytes.as_slice())
            .map_err(|_| CryptoError::Encryption("sealing private key failed".to_string()))?;

        Ok(Self {
            salt,
            iterations,
            nonce,
            sealed,
        })
    }

    fn unlock(&self, passphrase: &Passphrase) -> Result<StaticSecret, CryptoError> {
        let wrap_key = derive_passphrase_key(passphrase, &self.salt, self.iterations);
        let cipher = Aes256Gcm::new_from_slice(wrap_key.as_ref())
            .map_err(|e| CryptoError::Decryption(format!("invalid wrap key: {e}")))?;
        let opened = Zeroizing::new(
            cipher
                .decrypt(Nonce::from_slice(&self.nonce), self.sealed.as_slice())
                .map_err(|_| CryptoError::Decryption("bad passphrase or corrupted private key".to_string()))?,
        );
        let mut raw = Zeroizing::new([0u8; KEY_LEN]);
        if opened.len() != KEY_LEN {
            return Err(CryptoError::KeyImport("unlocked private key has the wrong length".to_string()));
        }
        raw.copy_from_slice(&opened);
        Ok(StaticSecret::from(*raw))
    }
}

impl fmt::Debug for PayerPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PayerPrivateKey")
            .field("iterations", &self.iterations)
            .finish_non_exhaustive()
    }
}

/// Both halves of a freshly generated payer key
#[derive(Debug, Clone)]
pub struct KeyPair {
    pub public: PayerPublicKey,
    pub private: PayerPrivateKey,
}

/// Generates a key pair with the private half locked under `passphrase`
pub fn generate_keypair(passphrase: &Passphrase) -> Result<KeyPair, CryptoError> {
    generate_keypair_with_iterations(passphrase, DEFAULT_KDF_ITERATIONS)
}

/// Generates a key pair with an explicit PBKDF2 round count
pub fn generate_keypair_with_iterations(passphrase: &Passphrase, iterations: u32) -> Result<KeyPair, CryptoError> {
    if iterations == 0 {
        return Err(CryptoError::Encryption("key derivation iterations must be positive".to_string()));
    }
    let secret = random_secret();
    let public = PayerPublicKey(PublicKey::from(&secret));
    let private = PayerPrivateKey::lock(&secret, passphrase, iterations)?;
    Ok(KeyPair { public, private })
}

/// Seals `plaintext` for `recipient` and returns the armored message
pub fn encrypt(plaintext: &[u8], recipient: &PayerPublicKey) -> Result<String, CryptoError> {
    let ephemeral = random_secret();
    let ephemeral_public = PublicKey::from(&ephemeral);
    let shared = ephemeral.diffie_hellman(&recipient.0);
    let key = derive_envelope_key(shared.as_bytes(), ephemeral_public.as_bytes(), recipient.0.as_bytes());

    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let cipher = Aes256Gcm::new_from_slice(key.as_ref())
        .map_err(|e| CryptoError::Encryption(format!("invalid envelope key: {e}")))?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|_| CryptoError::Encryption("sealing message failed".to_string()))?;

    let mut message = Vec::with_capacity(1 + KEY_LEN + NONCE_LEN + ciphertext.len());
    message.push(FORMAT_VERSION);
    message.extend_from_slice(ephemeral_public.as_bytes());
    message.extend_from_slice(&nonce);
    message.extend_from_slice(&ciphertext);
    Ok(armor(MESSAGE_LABEL, &message))
}

/// Opens an armored message with a locked private key
///
/// # Errors
///
/// `CryptoError::Decryption` for a wrong passphrase, a message sealed for a
/// different key, or a corrupted or truncated payload.
pub fn decrypt(armored: &str, key: &PayerPrivateKey, passphrase: &Passphrase) -> Result<Vec<u8>, CryptoError> {
    let message = dearmor(MESSAGE_LABEL, armored).map_err(CryptoError::Decryption)?;
    if message.len() < 1 + KEY_LEN + NONCE_LEN + TAG_LEN {
        return Err(CryptoError::Decryption("message is truncated".to_string()));
    }
    if message[0] != FORMAT_VERSION {
        return Err(CryptoError::Decryption(format!("unsupported message version {}", message[0])));
    }

    let mut eph = [0u8; KEY_LEN];
    eph.copy_from_slice(&message[1..1 + KEY_LEN]);
    let ephemeral_public = PublicKey::from(eph);
    let nonce = &message[1 + KEY_LEN..1 + KEY_LEN + NONCE_LEN];
    let ciphertext = &message[1 + KEY_LEN + NONCE_LEN..];

    let secret = key.unlock(passphrase)?;
    let recipient = PublicKey::from(&secret);
    let shared = secret.diffie_hellman(&ephemeral_public);
    let envelope_key = derive_envelope_key(shared.as_bytes(), ephemeral_public.as_bytes(), recipient.as_bytes());

    let cipher = Aes256Gcm::new_from_slice(envelope_key.as_ref())
        .map_err(|e| CryptoError::Decryption(format!("invalid envelope key: {e}")))?;
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| CryptoError::Decryption("message authentication failed".to_string()))
}

fn random_secret() -> StaticSecret {
    let mut bytes = Zeroizing::new([0u8; KEY_LEN]);
    OsRng.fill_bytes(bytes.as_mut());
    StaticSecret::from(*bytes)
}

fn derive_envelope_key(shared: &[u8], ephemeral: &[u8], recipient: &[u8]) -> Zeroizing<[u8; KEY_LEN]> {
    let mut hasher = Sha256::new();
    hasher.update(ENVELOPE_CONTEXT);
    hasher.update(shared);
    hasher.update(ephemeral);
    hasher.update(recipient);
    Zeroizing::new(hasher.finalize().into())
}

fn derive_passphrase_key(passphrase: &Passphrase, salt: &[u8], iterations: u32) -> Zeroizing<[u8; KEY_LEN]> {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2::pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), salt, iterations, key.as_mut());
    key
}

fn armor(label: &str, bytes: &[u8]) -> String {
    let encoded = STANDARD.encode(bytes);
    let mut out = format!("-----BEGIN {label}-----\n");
    for chunk in encoded.as_bytes().chunks(LINE_WIDTH) {
        // base64 output is ASCII
        out.push_str(&String::from_utf8_lossy(chunk));
        out.push('\n');
    }
    out.push_str(&format!("-----END {label}-----\n"));
    out
}

fn dearmor(label: &str, text: &str) -> Result<Vec<u8>, String> {
    let begin = format!("-----BEGIN {label}-----");
    let end = format!("-----END {label}-----");

    let mut lines = text.lines().map(str::trim).skip_while(|line| line.is_empty());
    if lines.next() != Some(begin.as_str()) {
        return Err(format!("missing {begin} line"));
    }

    let mut body = String::new();
    let mut closed = false;
    for line in lines {
        if line == end {
            closed = true;
            break;
        }
        body.push_str(line);
    }
    if !closed {
        return Err(format!("missing {end} line"));
    }

    STANDARD
        .decode(body.as_bytes())
        .map_err(|e| format!("invalid base64 in {label}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keypair(passphrase: &str) -> KeyPair {
        generate_keypair_with_iterations(&Passphrase::new(passphrase), 1_000).unwrap()
    }

    #[test]
    fn test_encrypt_decrypt() {
        let keys = keypair("correct horse");
        let sealed = encrypt(b"HDR*ANTHEM~", &keys.public).unwrap();
        assert!(sealed.starts_with("-----BEGIN ACCUMULATION MESSAGE-----"));

        let opened = decrypt(&sealed, &keys.private, &Passphrase::new("correct horse")).unwrap();
        assert_eq!(opened, b"HDR*ANTHEM~");
    }

    #[test]
    fn test_wrong_passphrase_is_decryption_error() {
        let keys = keypair("correct horse");
        let sealed = encrypt(b"payload", &keys.public).unwrap();
        let result = decrypt(&sealed, &keys.private, &Passphrase::new("battery staple"));
        assert!(matches!(result, Err(CryptoError::Decryption(_))));
    }

    #[test]
    fn test_other_recipient_cannot_open() {
        let alice = keypair("a");
        let bob = keypair("b");
        let sealed = encrypt(b"payload", &alice.public).unwrap();
        let result = decrypt(&sealed, &bob.private, &Passphrase::new("b"));
        assert!(matches!(result, Err(CryptoError::Decryption(_))));
    }

    #[test]
    fn test_tampered_message_is_rejected() {
        let keys = keypair("pw");
        let sealed = encrypt(b"payload", &keys.public).unwrap();
        let mut bytes = dearmor(MESSAGE_LABEL, &sealed).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        let tampered = armor(MESSAGE_LABEL, &bytes);
        let result = decrypt(&tampered, &keys.private, &Passphrase::new("pw"));
        assert!(matches!(result, Err(CryptoError::Decryption(_))));
    }

    #[test]
    fn test_key_armor_roundtrip() {
        let keys = keypair("pw");
        let public = PayerPublicKey::from_armored(&keys.public.to_armored()).unwrap();
        assert_eq!(public, keys.public);

        let private = PayerPrivateKey::from_armored(&keys.private.to_armored()).unwrap();
        let sealed = encrypt(b"x", &public).unwrap();
        assert_eq!(decrypt(&sealed, &private, &Passphrase::new("pw")).unwrap(), b"x");
    }

    #[test]
    fn test_bad_key_armor_is_import_error() {
        assert!(matches!(
            PayerPublicKey::from_armored("not a key"),
            Err(CryptoError::KeyImport(_))
        ));
        let short = armor(PRIVATE_KEY_LABEL, &[1, 2, 3]);
        assert!(matches!(
            PayerPrivateKey::from_armored(&short),
            Err(CryptoError::KeyImport(_))
        ));
    }

    #[test]
    fn test_debug_output_is_redacted() {
        let passphrase = Passphrase::new("hunter2");
        assert!(!format!("{passphrase:?}").contains("hunter2"));
    }
}
