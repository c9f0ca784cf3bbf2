//! Secure Transfer Layer
//!
//! Protects payer files at rest and in transit and moves them between the
//! pipeline and each payer's exchange point.
//!
//! # Components
//!
//! - **crypto**: X25519 + AES-256-GCM envelope encryption with ASCII armor,
//!   passphrase-protected private keys
//! - **retry**: bounded retry with randomized exponential backoff and a
//!   per-attempt timeout, applied only to transient store errors
//! - **store**: the exchange-point directory and the HTTP backup bucket
//! - **client**: [`SecureTransferClient`], the domain's `TransferPort`

pub mod error;
pub mod crypto;
pub mod retry;
pub mod store;
pub mod client;

pub use error::{CryptoError, StoreError};
pub use crypto::{decrypt, encrypt, generate_keypair, generate_keypair_with_iterations, KeyPair, Passphrase, PayerPrivateKey, PayerPublicKey};
pub use retry::{RetryFailure, RetryPolicy};
pub use store::{FileStore, HttpBucketStore, LocalDirectoryStore, MemoryFileStore};
pub use client::{PayerTransferSettings, SecureTransferClient};
