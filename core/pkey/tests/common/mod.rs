//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::{Once, OnceLock};

use cryptoshim_pkey::AsymmetricKey;
use tracing_subscriber::EnvFilter;

/// Install a test-writer subscriber once per test binary.
pub fn init_tracing() {
    static ONCE: Once = Once::new();

    ONCE.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_test_writer()
            .try_init();
    });
}

/// Decode a hex string.
pub fn hex(s: &str) -> Vec<u8> {
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
        .collect()
}

/// 1024-bit key shared by every test in the binary.
pub fn rsa_key() -> &'static AsymmetricKey {
    static KEY: OnceLock<AsymmetricKey> = OnceLock::new();
    KEY.get_or_init(|| AsymmetricKey::generate_rsa(1024).unwrap())
}
