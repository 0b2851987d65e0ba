use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;

use crate::domain::IdempotencyKey;

const RANDOM_SUFFIX_LEN: usize = 9;
const BASE36_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Source of idempotency keys; one key is drawn per upload session.
pub trait IdempotencyKeyGenerator: Send + Sync {
    fn generate(&self) -> IdempotencyKey;
}

/// Builds `<unix millis>-<9 random base36 chars>` keys.
#[derive(Debug, Default, Clone, Copy)]
pub struct TimestampKeyGenerator;

impl IdempotencyKeyGenerator for TimestampKeyGenerator {
    fn generate(&self) -> IdempotencyKey {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis())
            .unwrap_or_default();
        let mut rng = rand::thread_rng();
        let suffix = (0..RANDOM_SUFFIX_LEN)
            .map(|_| char::from(BASE36_ALPHABET[rng.gen_range(0..BASE36_ALPHABET.len())]))
            .collect::<String>();
        IdempotencyKey::from_parts(millis, &suffix)
    }
}
