//! Compound discrete states.
//!
//! Several binary characters (e.g. presence/absence in geographic areas) can
//! be folded into one integer state. Codes are ordered by the number of set
//! characters, then lexicographically by which characters are set, so with
//! three characters the codes 0..8 read `000, 100, 010, 001, 110, 101, 011,
//! 111`.

use crate::errors::StateEncodingError;
use std::collections::HashMap;

/// Largest number of characters a compound state may fold together.
pub const MAX_CHARACTERS: usize = 16;

/// Bidirectional mapping between integer state codes and bit patterns.
#[derive(Debug, Clone)]
pub struct CompoundStateEncoding {
    n_characters: usize,
    /// Bit `i` of a mask is character `i` (position `i` of the pattern string).
    masks: Vec<u32>,
    codes: HashMap<u32, usize>,
}

impl CompoundStateEncoding {
    /// Build the encoding for `n_characters` binary characters.
    pub fn new(n_characters: usize) -> Result<Self, StateEncodingError> {
        if n_characters == 0 || n_characters > MAX_CHARACTERS {
            return Err(StateEncodingError::InvalidCharacterCount {
                n_characters,
                max: MAX_CHARACTERS,
            });
        }

        let mut masks = Vec::with_capacity(1 << n_characters);
        for n_set in 0..=n_characters {
            push_combinations(n_characters, n_set, 0, 0, &mut masks);
        }

        let codes = masks
            .iter()
            .enumerate()
            .map(|(code, &mask)| (mask, code))
            .collect();

        Ok(Self {
            n_characters,
            masks,
            codes,
        })
    }

    pub fn n_characters(&self) -> usize {
        self.n_characters
    }

    /// Total number of compound states (`2^n_characters`).
    pub fn n_states(&self) -> usize {
        self.masks.len()
    }

    /// Bit mask of a state code.
    pub fn mask(&self, code: usize) -> Result<u32, StateEncodingError> {
        self.masks
            .get(code)
            .copied()
            .ok_or(StateEncodingError::CodeOutOfRange {
                code,
                n_characters: self.n_characters,
                n_states: self.masks.len(),
            })
    }

    /// State code of a bit mask, if the mask fits in this encoding.
    pub fn code_for_mask(&self, mask: u32) -> Option<usize> {
        self.codes.get(&mask).copied()
    }

    /// Render a state code as a bit pattern string such as `"101"`.
    pub fn to_bit_pattern(&self, code: usize) -> Result<String, StateEncodingError> {
        let mask = self.mask(code)?;
        Ok((0..self.n_characters)
            .map(|i| if mask & (1 << i) != 0 { '1' } else { '0' })
            .collect())
    }

    /// Parse a bit pattern string back into its state code.
    pub fn from_bit_pattern(&self, pattern: &str) -> Result<usize, StateEncodingError> {
        let invalid = || StateEncodingError::InvalidPattern {
            pattern: pattern.to_string(),
            n_characters: self.n_characters,
        };

        if pattern.len() != self.n_characters {
            return Err(invalid());
        }

        let mut mask = 0u32;
        for (i, c) in pattern.chars().enumerate() {
            match c {
                '1' => mask |= 1 << i,
                '0' => {}
                _ => return Err(invalid()),
            }
        }

        self.code_for_mask(mask).ok_or_else(invalid)
    }

    /// All bit patterns in code order.
    pub fn bit_patterns(&self) -> Vec<String> {
        (0..self.n_states())
            .filter_map(|code| self.to_bit_pattern(code).ok())
            .collect()
    }

    /// Number of set characters (e.g. occupied areas) in a state.
    pub fn n_set(&self, code: usize) -> Result<u32, StateEncodingError> {
        Ok(self.mask(code)?.count_ones())
    }

    /// Number of characters that differ between two states.
    pub fn hamming_distance(&self, a: usize, b: usize) -> Result<u32, StateEncodingError> {
        Ok((self.mask(a)? ^ self.mask(b)?).count_ones())
    }

    /// Whether every character set in `sub` is also set in `sup`.
    pub fn is_subset(&self, sub: usize, sup: usize) -> Result<bool, StateEncodingError> {
        let sub = self.mask(sub)?;
        Ok(sub & self.mask(sup)? == sub)
    }
}

/// Push every mask with `remaining` more bits chosen from positions
/// `start..n`, in lexicographic order of the chosen positions.
fn push_combinations(n: usize, remaining: usize, start: usize, mask: u32, out: &mut Vec<u32>) {
    if remaining == 0 {
        out.push(mask);
        return;
    }
    for pos in start..=(n - remaining) {
        push_combinations(n, remaining - 1, pos + 1, mask | (1 << pos), out);
    }
}
