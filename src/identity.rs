//! Synthetic identities for accounts created during a run.

use rand::seq::SliceRandom;
use rand::Rng;

const FIRST_NAMES: [&str; 6] = ["Lucas", "Sofia", "Martina", "Diego", "Valentina", "Mateo"];
const LAST_NAMES: [&str; 5] = ["Perez", "Gomez", "Lopez", "Diaz", "Ruiz"];
const PASSWORD_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

const EMAIL_SUFFIX_LEN: usize = 8;

/// Unique address: `user_{user}_{rand}_{millis}@mail.com`.
pub fn random_email<R: Rng>(rng: &mut R, user_index: usize) -> String {
    let suffix: String = (0..EMAIL_SUFFIX_LEN)
        .map(|_| PASSWORD_CHARS[rng.gen_range(0..PASSWORD_CHARS.len())] as char)
        .collect();
    let millis = chrono::Utc::now().timestamp_millis();
    format!("user_{user_index}_{suffix}_{millis}@mail.com")
}

pub fn random_password<R: Rng>(rng: &mut R) -> String {
    (0..10)
        .map(|_| PASSWORD_CHARS[rng.gen_range(0..PASSWORD_CHARS.len())] as char)
        .collect()
}

pub fn random_name<R: Rng>(rng: &mut R) -> String {
    let first = FIRST_NAMES.choose(rng).copied().unwrap_or("Test");
    let last = LAST_NAMES.choose(rng).copied().unwrap_or("User");
    format!("{first} {last}")
}
