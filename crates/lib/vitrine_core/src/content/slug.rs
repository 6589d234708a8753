//! URL slugs for products and blog posts.

use chrono::Utc;
use rand::{Rng, rng};

/// Longest slug produced by [`slugify`], in characters.
pub const MAX_SLUG_CHARS: usize = 80;

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

fn is_slug_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || ('\u{0600}'..='\u{06FF}').contains(&c)
}

/// Lower-case, collapse every run of other characters into `-`, strip
/// leading/trailing `-`, cap at 80 characters. Arabic letters are kept.
pub fn slugify(input: &str) -> String {
    let lowered = input.trim().to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    let mut pending_dash = false;
    for c in lowered.chars() {
        if is_slug_char(c) {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c);
        } else {
            pending_dash = true;
        }
    }
    out.chars().take(MAX_SLUG_CHARS).collect()
}

/// Render `n` in base 36.
pub fn to_base36(mut n: u64) -> String {
    if n == 0 {
        return "0".into();
    }
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(BASE36[(n % 36) as usize]);
        n /= 36;
    }
    digits.reverse();
    String::from_utf8(digits).unwrap_or_default()
}

/// `<prefix>-<base36 millis>` for titles that slugify to nothing.
pub fn fallback_slug(prefix: &str) -> String {
    let millis = Utc::now().timestamp_millis().max(0) as u64;
    format!("{prefix}-{}", to_base36(millis))
}

/// `slug` with `-` and four random base-36 characters appended.
pub fn with_random_suffix(slug: &str) -> String {
    let mut r = rng();
    let suffix: String = (0..4)
        .map(|_| char::from(BASE36[r.random_range(0..BASE36.len())]))
        .collect();
    format!("{slug}-{suffix}")
}
