//! Payment-handle (UPI id) generation and registry checks.

use rand::seq::SliceRandom;
use rand::Rng;

/// Provider aliases the platform can issue handles under.
const PROVIDER_ALIASES: [&str; 3] = ["superapp", "spapp", "myapp"];

const MIN_PREFERRED_LEN: usize = 3;
const MAX_BASE_LEN: usize = 15;

/// Decrypted identity attributes needed to derive a handle base.
#[derive(Debug, Clone)]
pub struct IdentitySnapshot {
    pub full_name: String,
    pub username: String,
}

/// External registry consulted before a handle is assigned.
pub trait HandleRegistry: Send + Sync {
    fn is_available(&self, handle: &str) -> bool;
}

/// Registry stub that accepts every handle; stands in for the real UPI
/// registry integration.
#[derive(Debug, Default, Clone)]
pub struct OpenRegistry;

impl HandleRegistry for OpenRegistry {
    fn is_available(&self, _handle: &str) -> bool {
        true
    }
}

/// Derive a payment handle from the identity, honoring a preferred alias of
/// at least three characters. The base is lowercased, stripped to
/// alphanumerics, and truncated before a random 3-digit suffix and provider
/// alias are appended.
pub fn generate(identity: &IdentitySnapshot, preferred_alias: Option<&str>) -> String {
    let base = match preferred_alias {
        Some(alias) if alias.len() >= MIN_PREFERRED_LEN => alias.to_lowercase(),
        _ => {
            let tokens: Vec<&str> = identity.full_name.split_whitespace().collect();
            if tokens.len() >= 2 {
                format!(
                    "{}{}",
                    tokens[0].to_lowercase(),
                    tokens[tokens.len() - 1].to_lowercase()
                )
            } else {
                identity.username.to_lowercase()
            }
        }
    };

    let mut base: String = base
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    base.truncate(MAX_BASE_LEN);
    if base.is_empty() {
        base.push_str("user");
    }

    let mut rng = rand::thread_rng();
    let suffix: u32 = rng.gen_range(100..1000);
    let provider = PROVIDER_ALIASES
        .choose(&mut rng)
        .copied()
        .unwrap_or(PROVIDER_ALIASES[0]);

    format!("{base}{suffix}@{provider}")
}

/// Check the `alnum+ "@" alnum+` handle shape.
pub fn validate_format(handle: &str) -> bool {
    let Some((local, provider)) = handle.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !provider.is_empty()
        && local.chars().all(|c| c.is_ascii_alphanumeric())
        && provider.chars().all(|c| c.is_ascii_alphanumeric())
}
