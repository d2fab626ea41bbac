// src/manifest/permissions.rs
//! Permission bits and the legacy permission-string codec

use crate::error::{Error, Result};

pub const PERMISSION_READ: u32 = 1;
pub const PERMISSION_WRITE: u32 = 2;
pub const PERMISSION_VIEW: u32 = 4;
pub const PERMISSION_CONTROL: u32 = 8;
pub const PERMISSION_DIRECT_PUBLISH: u32 = 16;

/// ACE flag: entry applies to a group rather than a user
pub const ACE_FLAG_GROUP: u32 = 1;
/// ACE flag: entry is inherited by children
pub const ACE_FLAG_INHERIT: u32 = 2;
/// ACE flag: entry was inherited from a parent
pub const ACE_FLAG_INHERITED: u32 = 4;

/// Letter used for each bit in permission strings, in output order
const LETTERS: [(char, u32); 5] = [
    ('r', PERMISSION_READ),
    ('w', PERMISSION_WRITE),
    ('v', PERMISSION_VIEW),
    ('c', PERMISSION_CONTROL),
    ('d', PERMISSION_DIRECT_PUBLISH),
];

fn bit_for(letter: char) -> Option<u32> {
    LETTERS
        .iter()
        .find(|(c, _)| *c == letter.to_ascii_lowercase())
        .map(|(_, bit)| *bit)
}

/// Parse a permission string such as `+r+w-v` into `(allowed, denied)`
///
/// Whitespace is ignored. A letter granted and denied in the same string
/// ends up denied, since denial wins when permissions are evaluated.
pub fn parse_permission_string(s: &str) -> Result<(u32, u32)> {
    let mut allowed = 0;
    let mut denied = 0;
    let mut chars = s.chars().filter(|c| !c.is_whitespace());

    while let Some(sign) = chars.next() {
        let letter = chars
            .next()
            .ok_or_else(|| Error::Conversion(format!("truncated permission string: '{}'", s)))?;
        let bit = bit_for(letter).ok_or_else(|| {
            Error::Conversion(format!("unknown permission '{}' in '{}'", letter, s))
        })?;
        match sign {
            '+' => allowed |= bit,
            '-' => denied |= bit,
            _ => {
                return Err(Error::Conversion(format!(
                    "expected '+' or '-' before '{}' in '{}'",
                    letter, s
                )));
            }
        }
    }

    Ok((allowed & !denied, denied))
}

/// Format `(allowed, denied)` as a permission string
pub fn format_permission_string(allowed: u32, denied: u32) -> String {
    let mut out = String::new();
    for (letter, bit) in LETTERS {
        if denied & bit != 0 {
            out.push('-');
            out.push(letter);
        } else if allowed & bit != 0 {
            out.push('+');
            out.push(letter);
        }
    }
    out
}
