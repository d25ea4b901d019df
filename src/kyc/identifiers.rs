//! National identifier validation and display masking.
//!
//! The national-id check runs the Verhoeff checksum, which detects every
//! single-digit error and adjacent transposition. Masking keeps at most the
//! trailing four characters of a secret so the unmasked value never leaves
//! this module for display or logging purposes.

/// Verhoeff multiplication table (dihedral group D5).
const D: [[u8; 10]; 10] = [
    [0, 1, 2, 3, 4, 5, 6, 7, 8, 9],
    [1, 2, 3, 4, 0, 6, 7, 8, 9, 5],
    [2, 3, 4, 0, 1, 7, 8, 9, 5, 6],
    [3, 4, 0, 1, 2, 8, 9, 5, 6, 7],
    [4, 0, 1, 2, 3, 9, 5, 6, 7, 8],
    [5, 9, 8, 7, 6, 0, 4, 3, 2, 1],
    [6, 5, 9, 8, 7, 1, 0, 4, 3, 2],
    [7, 6, 5, 9, 8, 2, 1, 0, 4, 3],
    [8, 7, 6, 5, 9, 3, 2, 1, 0, 4],
    [9, 8, 7, 6, 5, 4, 3, 2, 1, 0],
];

/// Verhoeff permutation table, applied by digit position modulo 8.
const P: [[u8; 10]; 8] = [
    [0, 1, 2, 3, 4, 5, 6, 7, 8, 9],
    [1, 5, 7, 6, 2, 8, 3, 0, 9, 4],
    [5, 8, 0, 3, 7, 9, 6, 1, 4, 2],
    [8, 9, 1, 6, 0, 4, 3, 5, 2, 7],
    [9, 4, 5, 3, 1, 2, 6, 8, 7, 0],
    [4, 2, 8, 6, 5, 7, 3, 9, 0, 1],
    [2, 7, 9, 3, 8, 0, 6, 4, 1, 5],
    [7, 0, 4, 6, 9, 1, 3, 2, 5, 8],
];

fn strip_separators(value: &str) -> String {
    value.chars().filter(|c| *c != ' ' && *c != '-').collect()
}

/// Validate a 12-digit national id (spaces and hyphens ignored) against the
/// Verhoeff checksum. Valid iff the running check value reduces to zero.
pub fn validate_national_id(value: &str) -> bool {
    let clean = strip_separators(value);
    if clean.len() != 12 || !clean.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }

    let mut check = 0usize;
    for (position, digit) in clean.bytes().rev().enumerate() {
        let digit = (digit - b'0') as usize;
        let permuted = P[position % 8][digit] as usize;
        check = D[check][permuted] as usize;
    }
    check == 0
}

/// Validate a tax id: five letters, four digits, one letter, case-insensitive.
pub fn validate_tax_id(value: &str) -> bool {
    let bytes = value.as_bytes();
    if bytes.len() != 10 {
        return false;
    }
    bytes[..5].iter().all(|b| b.is_ascii_alphabetic())
        && bytes[5..9].iter().all(|b| b.is_ascii_digit())
        && bytes[9].is_ascii_alphabetic()
}

/// Kinds of secrets the masking rules distinguish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskKind {
    NationalId,
    TaxId,
    AccountNumber,
    CardNumber,
    Other,
}

/// Produce a display-safe rendering of a secret value.
pub fn mask(kind: MaskKind, value: &str) -> String {
    match kind {
        MaskKind::NationalId => {
            let clean = strip_separators(value);
            format!("XXXX XXXX {}", tail(&clean, 4))
        }
        MaskKind::TaxId => {
            let head: String = value.chars().take(3).collect();
            format!("{head}XXXXXX{}", tail(value, 1))
        }
        MaskKind::AccountNumber => format!("XXXXXXXX{}", tail(value, 4)),
        MaskKind::CardNumber => format!("XXXX XXXX XXXX {}", tail(value, 4)),
        MaskKind::Other => format!("XXXXX{}", tail(value, 4)),
    }
}

fn tail(value: &str, keep: usize) -> String {
    let chars: Vec<char> = value.chars().collect();
    chars[chars.len().saturating_sub(keep)..].iter().collect()
}
