use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::constants::LOCAL_ID_PREFIX;

/// Stable identifier handed out by the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

fn to_base36(mut n: u64) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(BASE36[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

fn random_suffix(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect()
}

fn millis(now: DateTime<Utc>) -> u64 {
    now.timestamp_millis().max(0) as u64
}

/// Synthetic id for a locally published form: `local_<millis>_<random>`.
pub fn local_form_id(now: DateTime<Utc>) -> String {
    format!("{LOCAL_ID_PREFIX}{}_{}", millis(now), random_suffix(9))
}

/// Synthetic id for a locally stored response.
pub fn local_response_id(now: DateTime<Utc>) -> String {
    format!("resp_{}_{}", millis(now), random_suffix(9))
}

/// Synthetic id for the local draft slot.
pub fn local_draft_id(now: DateTime<Utc>) -> String {
    format!("draft_{}_{}", millis(now), random_suffix(9))
}

/// Public share token: base36 time component followed by a random tail.
pub fn share_token(now: DateTime<Utc>) -> String {
    format!("{}{}", to_base36(millis(now)), random_suffix(8))
}

/// Whether `id` was minted by [`local_form_id`].
pub fn is_local_id(id: &str) -> bool {
    id.starts_with(LOCAL_ID_PREFIX)
}
