//! Checksummed identifiers for product links, order numbers and payment codes.
//!
//! A code is `{prefix}{YYYYMMDDhhmmss}{4 random digits}{3-4 digit sequence}{check}`.
//! The check digit is a weighted sum over every digit of the body: the digit
//! at position `i` (counting digits only) is weighted `(i % 10) + 1`, and the
//! sum is reduced mod 10.

use chrono::{DateTime, Utc};
use rand::Rng;

use crate::error::{AppError, Result};

/// Attempts before a generator gives up on finding an unused code.
pub const MAX_ATTEMPTS: u32 = 50;

/// Shape of a generated code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeFormat<'a> {
    pub prefix: &'a str,
    /// Width of the trailing random sequence (3 or 4)
    pub sequence_digits: u32,
}

impl CodeFormat<'static> {
    pub const PRODUCT_URL: Self = Self {
        prefix: "",
        sequence_digits: 4,
    };
    pub const ORDER_NUMBER: Self = Self {
        prefix: "O",
        sequence_digits: 3,
    };
    pub const PAYMENT_CODE: Self = Self {
        prefix: "P",
        sequence_digits: 3,
    };
}

impl<'a> CodeFormat<'a> {
    pub fn new(prefix: &'a str, sequence_digits: u32) -> Result<Self> {
        if !(3..=4).contains(&sequence_digits) {
            return Err(AppError::BadRequest(
                "sequence_digits must be 3 or 4".into(),
            ));
        }
        Ok(Self {
            prefix,
            sequence_digits,
        })
    }

    /// Build one candidate (without uniqueness checking).
    pub fn candidate<R: Rng + ?Sized>(&self, now: DateTime<Utc>, rng: &mut R) -> String {
        let random: u32 = rng.gen_range(0..10_000);
        let sequence: u32 = rng.gen_range(0..10u32.pow(self.sequence_digits));
        let body = format!(
            "{}{}{:04}{:0width$}",
            self.prefix,
            now.format("%Y%m%d%H%M%S"),
            random,
            sequence,
            width = self.sequence_digits as usize
        );
        let check = checksum_digit(&body);
        format!("{}{}", body, check)
    }
}

/// Weighted digit-sum mod 10 over the digit characters of `body`.
pub fn checksum_digit(body: &str) -> u32 {
    let total: u32 = body
        .chars()
        .filter_map(|c| c.to_digit(10))
        .enumerate()
        .map(|(i, d)| d * ((i as u32 % 10) + 1))
        .sum();
    total % 10
}

/// True when the last character of `code` is the check digit of the rest.
pub fn validate_code(code: &str) -> bool {
    let Some(last) = code.chars().last() else {
        return false;
    };
    let Some(expected) = last.to_digit(10) else {
        return false;
    };
    let body = &code[..code.len() - last.len_utf8()];
    if !body.chars().any(|c| c.is_ascii_digit()) {
        return false;
    }
    checksum_digit(body) == expected
}

/// Generate a code in `format` that `is_unique` accepts.
///
/// A fresh random suffix is drawn for every attempt. After [`MAX_ATTEMPTS`]
/// rejections this fails with `GenerationExhausted`. Errors from the
/// predicate (store failures) propagate unchanged.
pub fn generate_code<R, F>(
    format: CodeFormat<'_>,
    now: DateTime<Utc>,
    rng: &mut R,
    mut is_unique: F,
) -> Result<String>
where
    R: Rng + ?Sized,
    F: FnMut(&str) -> Result<bool>,
{
    for _ in 0..MAX_ATTEMPTS {
        let code = format.candidate(now, rng);
        if is_unique(&code)? {
            return Ok(code);
        }
        tracing::debug!(code = %code, "generated code already taken, retrying");
    }
    Err(AppError::GenerationExhausted {
        attempts: MAX_ATTEMPTS,
    })
}

/// [`generate_code`] with the current time and the thread-local RNG.
pub fn generate_unique_code<F>(format: CodeFormat<'_>, is_unique: F) -> Result<String>
where
    F: FnMut(&str) -> Result<bool>,
{
    generate_code(format, Utc::now(), &mut rand::thread_rng(), is_unique)
}
