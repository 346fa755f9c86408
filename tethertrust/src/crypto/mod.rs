// Crypto module declarations

pub mod aead;
pub mod agreement;
pub mod kdf;
pub mod random;
pub mod record;
