//! Ingredient list splitting.
//!
//! Splits a submitted ingredient list into [`RawIngredientToken`]s, keeping
//! each token's byte range in the original text so results can be traced
//! back to the label.
//!
//! # Rules
//!
//! 1. Split on commas only. Hyphens, slashes, and spaces never split.
//! 2. A comma with an ASCII digit on both sides is part of a chemical
//!    locant (`1,4-Dioxane`) and does not split.
//! 3. Surrounding whitespace is trimmed from each piece; the byte range
//!    covers the trimmed text.
//! 4. Whitespace-only pieces are skipped. Positions stay contiguous.
//!
//! # Example
//!
//! ```rust
//! use annex_guard_core::split::split_ingredients;
//!
//! let tokens = split_ingredients("Water, 1,4-Dioxane ,Butyl-Hydroxy-Toluene");
//! let names: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
//! assert_eq!(names, ["Water", "1,4-Dioxane", "Butyl-Hydroxy-Toluene"]);
//! ```

use sha2::{Digest, Sha256};

/// One ingredient as it appeared in the submitted text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawIngredientToken {
    pub text: String,
    /// Byte offset of the first character in the submitted text.
    pub start: usize,
    /// Byte offset one past the last character.
    pub end: usize,
    /// Ordinal among non-empty tokens, starting at 0.
    pub position: usize,
}

/// Split an ingredient list into raw tokens.
pub fn split_ingredients(text: &str) -> Vec<RawIngredientToken> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut piece_start = 0;

    for (i, b) in bytes.iter().enumerate() {
        if *b != b',' {
            continue;
        }
        let digit_before = i > 0 && bytes[i - 1].is_ascii_digit();
        let digit_after = bytes.get(i + 1).is_some_and(u8::is_ascii_digit);
        if digit_before && digit_after {
            continue;
        }
        push_piece(text, piece_start, i, &mut tokens);
        piece_start = i + 1;
    }
    push_piece(text, piece_start, text.len(), &mut tokens);

    tokens
}

fn push_piece(text: &str, start: usize, end: usize, tokens: &mut Vec<RawIngredientToken>) {
    let piece = &text[start..end];
    let trimmed_start = piece.len() - piece.trim_start().len();
    let trimmed = piece.trim();
    if trimmed.is_empty() {
        return;
    }
    let abs_start = start + trimmed_start;
    tokens.push(RawIngredientToken {
        text: trimmed.to_string(),
        start: abs_start,
        end: abs_start + trimmed.len(),
        position: tokens.len(),
    });
}

/// Stable cache key for a whole submitted list: SHA-256 of the exact text.
///
/// Results carry byte ranges into the submitted text, so two lists share a
/// key only when those ranges are valid for both.
pub fn list_key(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}
