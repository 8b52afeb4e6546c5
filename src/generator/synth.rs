use std::ops::RangeInclusive;

use rand::Rng;
use rand::seq::SliceRandom;

use crate::generator::spec::{Constraints, Pattern};

/// Builds one input payload. Every value is drawn from `rng`, so the same
/// stream always yields the same text.
pub fn synthesize<R: Rng>(rng: &mut R, pattern: Pattern, constraints: &Constraints) -> String {
    let alphabet = constraints.charset.chars();
    let len = draw(rng, constraints.min_length..=constraints.max_length);

    let body = match pattern {
        Pattern::Random => random_string(rng, &alphabet, len),
        Pattern::Palindrome => {
            let half = random_string(rng, &alphabet, len / 2);
            let middle = if len % 2 == 1 {
                random_string(rng, &alphabet, 1)
            } else {
                String::new()
            };
            let mirror: String = half.chars().rev().collect();
            format!("{half}{middle}{mirror}")
        }
        Pattern::Repeated => {
            let unit_len = draw(rng, 1..=len.clamp(1, 3));
            let unit: Vec<char> = random_string(rng, &alphabet, unit_len).chars().collect();
            unit.iter().cycle().take(len).collect()
        }
        Pattern::Alternating => {
            let first = pick(rng, &alphabet);
            let second = if alphabet.len() > 1 {
                loop {
                    let c = pick(rng, &alphabet);
                    if c != first {
                        break c;
                    }
                }
            } else {
                first
            };
            (0..len)
                .map(|i| if i % 2 == 0 { first } else { second })
                .collect()
        }
        Pattern::Ascending | Pattern::Descending => {
            let mut picks: Vec<usize> = (0..len).map(|_| index(rng, alphabet.len())).collect();
            picks.sort_unstable();
            if pattern == Pattern::Descending {
                picks.reverse();
            }
            picks.into_iter().map(|i| alphabet[i]).collect()
        }
        Pattern::MixedCase => random_string(rng, &alphabet, len)
            .chars()
            .map(|c| {
                if rng.gen_bool(0.5) {
                    c.to_ascii_uppercase()
                } else {
                    c.to_ascii_lowercase()
                }
            })
            .collect(),
        Pattern::Words => words(rng, &alphabet, len),
        Pattern::FullCoverage => {
            // Coverage wins over max_length when the alphabet is larger.
            let mut chars = alphabet.clone();
            let extra = len.saturating_sub(chars.len());
            chars.extend((0..extra).map(|_| pick(rng, &alphabet)));
            chars.shuffle(rng);
            chars.into_iter().collect()
        }
        Pattern::Integers => {
            let values: Vec<String> = (0..len)
                .map(|_| {
                    rng.gen_range(constraints.min_value..=constraints.max_value)
                        .to_string()
                })
                .collect();
            format!("{len}\n{}", values.join(" "))
        }
    };

    format!("{body}\n")
}

/// Lengths and indices are drawn as `u64`: rand samples `usize` ranges at
/// pointer width, which would change the stream between 32- and 64-bit hosts.
fn draw<R: Rng>(rng: &mut R, range: RangeInclusive<usize>) -> usize {
    rng.gen_range(*range.start() as u64..=*range.end() as u64) as usize
}

pub(crate) fn index<R: Rng>(rng: &mut R, len: usize) -> usize {
    rng.gen_range(0..len as u64) as usize
}

fn pick<R: Rng>(rng: &mut R, alphabet: &[char]) -> char {
    alphabet[index(rng, alphabet.len())]
}

fn random_string<R: Rng>(rng: &mut R, alphabet: &[char], len: usize) -> String {
    (0..len).map(|_| pick(rng, alphabet)).collect()
}

/// Space separated words whose total length (spaces included) is `len`.
fn words<R: Rng>(rng: &mut R, alphabet: &[char], len: usize) -> String {
    let letters: Vec<char> = alphabet.iter().copied().filter(|c| !c.is_whitespace()).collect();
    if letters.is_empty() {
        return " ".repeat(len);
    }
    let mut out = String::with_capacity(len);
    while out.len() < len {
        if !out.is_empty() {
            if len - out.len() < 2 {
                out.push(pick(rng, &letters));
                continue;
            }
            out.push(' ');
        }
        let word_len = draw(rng, 1..=8).min(len - out.len());
        out.push_str(&random_string(rng, &letters, word_len));
    }
    out
}
