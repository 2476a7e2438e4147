use crate::FingerprintParseError;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

const C1: u64 = 0x87c3_7b91_1142_53d5;
const C2: u64 = 0x4cf5_ad43_2745_937f;

const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789_-";

/// Number of characters of the textual rendering.
pub const FINGERPRINT_STRING_LEN: usize = 22;

const HALF_LEN: usize = FINGERPRINT_STRING_LEN / 2;

/// A 128-bit hash used to identify values and statements.
///
/// A fingerprint is an ordered pair of 64-bit words `(high, low)`. Fingerprints are ordered by
/// `high` and then by `low`, both compared as unsigned integers.
///
/// The low word of every fingerprint computed by this crate is non-zero. Hash tables rely on this
/// and use a zero low word to mark empty slots.
///
/// # Textual Representation
///
/// A fingerprint is rendered as 22 characters drawn from `A-Z`, `a-z`, `0-9`, `_` and `-`. Each
/// character carries six bits, most significant bits first, with 11 characters per half.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint {
    high: u64,
    low: u64,
}

impl Fingerprint {
    /// Creates a fingerprint from its two words, without applying the non-zero-low rule.
    pub const fn from_words(high: u64, low: u64) -> Self {
        Self { high, low }
    }

    /// Returns the high word.
    pub const fn high(self) -> u64 {
        self.high
    }

    /// Returns the low word.
    pub const fn low(self) -> u64 {
        self.low
    }

    /// Computes the fingerprint of the concatenation of `parts`.
    ///
    /// The parts are consumed as one stream of UTF-16 code units. Four code units form a 64-bit
    /// lane, two lanes form a block that is mixed with the MurmurHash3 x64-128 rounds. The last
    /// (possibly partial) block is mixed like a full one. Splitting a string into several parts,
    /// empty ones included, therefore does not change the result.
    pub fn murmur3(parts: &[&str]) -> Self {
        let mut state = MurmurState::default();
        let mut lane1 = 0;
        let mut lane2 = 0;
        let mut index = 0_u32;
        let mut current = 0_u64;

        // The stream ends with the last code unit of the last non-empty part.
        let last_non_empty = parts.iter().rposition(|part| !part.is_empty());
        for (i, part) in parts.iter().enumerate() {
            let last_part = Some(i) == last_non_empty;
            let mut units = part.encode_utf16().peekable();
            while let Some(unit) = units.next() {
                current |= u64::from(unit) << (index % 4 * 16);
                let mut process = false;
                if last_part && units.peek().is_none() {
                    if index <= 3 {
                        lane1 = current;
                    } else {
                        lane2 = current;
                    }
                    current = 0;
                    process = true;
                } else if index == 3 {
                    lane1 = current;
                    current = 0;
                } else if index == 7 {
                    lane2 = current;
                    current = 0;
                    process = true;
                }

                if process {
                    state.mix(lane1, lane2);
                    lane1 = 0;
                    lane2 = 0;
                    index = 0;
                } else {
                    index += 1;
                }
            }
        }

        state.finish().non_zero()
    }

    /// Combines several fingerprints into one.
    ///
    /// Each fingerprint is mixed as one 128-bit block (`high`, `low`) in sequence, followed by the
    /// same finalizer as [Self::murmur3]. The result depends on the order of `parts`.
    pub fn combine(parts: &[Fingerprint]) -> Self {
        let mut state = MurmurState::default();
        for part in parts {
            state.mix(part.high, part.low);
        }
        state.finish().non_zero()
    }

    /// Remaps a zero low word to one.
    #[must_use]
    pub const fn non_zero(self) -> Self {
        if self.low == 0 {
            Self {
                high: self.high,
                low: 1,
            }
        } else {
            self
        }
    }
}

#[derive(Default)]
struct MurmurState {
    h1: u64,
    h2: u64,
    length: u64,
}

impl MurmurState {
    fn mix(&mut self, lane1: u64, lane2: u64) {
        let k1 = lane1.wrapping_mul(C1).rotate_left(31).wrapping_mul(C2);
        self.h1 ^= k1;
        self.h1 = self
            .h1
            .rotate_left(27)
            .wrapping_add(self.h2)
            .wrapping_mul(5)
            .wrapping_add(0x52dc_e729);

        let k2 = lane2.wrapping_mul(C2).rotate_left(33).wrapping_mul(C1);
        self.h2 ^= k2;
        self.h2 = self
            .h2
            .rotate_left(31)
            .wrapping_add(self.h1)
            .wrapping_mul(5)
            .wrapping_add(0x3849_5ab5);

        self.length += 16;
    }

    fn finish(self) -> Fingerprint {
        let mut h1 = self.h1 ^ self.length;
        let mut h2 = self.h2 ^ self.length;
        h1 = h1.wrapping_add(h2);
        h2 = h2.wrapping_add(h1);

        h1 = fmix64(h1);
        h2 = fmix64(h2);

        h1 = h1.wrapping_add(h2);
        h2 = h2.wrapping_add(h1);
        Fingerprint::from_words(h1, h2)
    }
}

fn fmix64(mut k: u64) -> u64 {
    k ^= k >> 33;
    k = k.wrapping_mul(0xff51_afd7_ed55_8ccd);
    k ^= k >> 33;
    k = k.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    k ^= k >> 33;
    k
}

fn write_word(f: &mut Formatter<'_>, word: u64) -> std::fmt::Result {
    for shift in (0..=60).rev().step_by(6) {
        let digit = (word >> shift) & 0x3F;
        #[allow(
            clippy::cast_possible_truncation,
            reason = "The digit has at most six bits"
        )]
        let character = char::from(ALPHABET[digit as usize]);
        write!(f, "{character}")?;
    }
    Ok(())
}

fn digit_value(character: char) -> Option<u64> {
    let value = match character {
        'A'..='Z' => u32::from(character) - u32::from('A'),
        'a'..='z' => u32::from(character) - u32::from('a') + 26,
        '0'..='9' => u32::from(character) - u32::from('0') + 52,
        '_' => 62,
        '-' => 63,
        _ => return None,
    };
    Some(u64::from(value))
}

fn parse_word(half: &[char], offset: usize) -> Result<u64, FingerprintParseError> {
    let mut word = 0_u64;
    for (i, character) in half.iter().enumerate() {
        let digit =
            digit_value(*character).ok_or(FingerprintParseError::InvalidCharacter {
                character: *character,
                position: offset + i,
            })?;
        // The leading character only carries the four most significant bits.
        if i == 0 && digit >= 16 {
            return Err(FingerprintParseError::Overflow(offset));
        }
        word = (word << 6) | digit;
    }
    Ok(word)
}

impl Display for Fingerprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write_word(f, self.high)?;
        write_word(f, self.low)
    }
}

impl FromStr for Fingerprint {
    type Err = FingerprintParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let characters = value.chars().collect::<Vec<_>>();
        if characters.len() != FINGERPRINT_STRING_LEN {
            return Err(FingerprintParseError::InvalidLength(characters.len()));
        }
        let (high, low) = characters.split_at(HALF_LEN);
        Ok(Self::from_words(
            parse_word(high, 0)?,
            parse_word(low, HALF_LEN)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const SAMPLES: u32 = 500;

    #[test]
    fn test_murmur3_matches_reference_values() {
        assert_eq!(
            Fingerprint::murmur3(&["a"]),
            Fingerprint::from_words(0xfa9b_3a08_c902_aacd, 0xb519_25c2_9e29_be56)
        );
        assert_eq!(
            Fingerprint::murmur3(&["hello world"]),
            Fingerprint::from_words(0x2f38_1872_7ce4_9ac4, 0xe720_0104_910b_72fb)
        );
        assert_eq!(
            Fingerprint::murmur3(&["abcdefghi"]),
            Fingerprint::from_words(0x26c4_9259_2ab8_5d40, 0x4d18_8e29_0f6f_9d75)
        );
    }

    #[test]
    fn test_murmur3_parts_form_one_stream() {
        assert_eq!(
            Fingerprint::murmur3(&["abcd", "efgh"]),
            Fingerprint::murmur3(&["abcdefgh"])
        );
        assert_eq!(
            Fingerprint::murmur3(&["abcdefgh"]),
            Fingerprint::from_words(0x2803_a5bc_696d_aeb2, 0xa2b1_eb75_40d6_d1fa)
        );
    }

    #[test]
    fn test_murmur3_consumes_utf16_code_units() {
        assert_eq!(
            Fingerprint::murmur3(&["\u{5}", "\u{1F600}"]),
            Fingerprint::from_words(0xb5f7_4ea4_3ad3_5e79, 0x27ea_1ef1_a4c3_9512)
        );
    }

    #[test]
    fn test_murmur3_empty_input_has_non_zero_low() {
        assert_eq!(Fingerprint::murmur3(&[]), Fingerprint::from_words(0, 1));
        assert_eq!(Fingerprint::murmur3(&[""]), Fingerprint::from_words(0, 1));
        assert_eq!(Fingerprint::murmur3(&["", ""]), Fingerprint::from_words(0, 1));
    }

    #[test]
    fn test_murmur3_empty_parts_do_not_change_the_stream() {
        let abc = Fingerprint::murmur3(&["abc"]);
        assert_ne!(abc, Fingerprint::from_words(0, 1));
        assert_eq!(Fingerprint::murmur3(&["abc", ""]), abc);
        assert_eq!(Fingerprint::murmur3(&["", "abc", "", ""]), abc);
        assert_eq!(
            Fingerprint::murmur3(&["abcd", "", "efgh", ""]),
            Fingerprint::murmur3(&["abcdefgh"])
        );
    }

    #[test]
    fn test_display_renders_22_characters() {
        let fingerprint = Fingerprint::murmur3(&["hello world"]);
        insta::assert_snapshot!(fingerprint.to_string(), @"C84GHJ85JrEOcgAQSRC3L7");
        assert_eq!(fingerprint.to_string().len(), FINGERPRINT_STRING_LEN);
    }

    #[test]
    fn test_display_extremes() {
        assert_eq!(
            Fingerprint::from_words(0, 0).to_string(),
            "AAAAAAAAAAAAAAAAAAAAAA"
        );
        assert_eq!(
            Fingerprint::from_words(u64::MAX, u64::MAX).to_string(),
            "P----------P----------"
        );
    }

    #[test]
    fn test_parse_rendering() {
        let fingerprint: Fingerprint = "PqbOgjJAqrNLUZJcKeKb5W".parse().unwrap();
        assert_eq!(fingerprint, Fingerprint::murmur3(&["a"]));
    }

    #[test]
    fn test_parse_rejects_invalid_input() {
        assert_eq!(
            "abc".parse::<Fingerprint>(),
            Err(FingerprintParseError::InvalidLength(3))
        );
        assert_eq!(
            "AAAAAAAAAAA*AAAAAAAAAA".parse::<Fingerprint>(),
            Err(FingerprintParseError::InvalidCharacter {
                character: '*',
                position: 11
            })
        );
        assert_eq!(
            "QAAAAAAAAAAAAAAAAAAAAA".parse::<Fingerprint>(),
            Err(FingerprintParseError::Overflow(0))
        );
    }

    #[test]
    fn test_order_is_unsigned_high_then_low() {
        let small = Fingerprint::from_words(1, u64::MAX);
        let large = Fingerprint::from_words(u64::MAX, 1);
        assert!(small < large);
        assert!(Fingerprint::from_words(7, 1) < Fingerprint::from_words(7, 2));
    }

    #[test]
    fn test_combine_depends_on_order() {
        let a = Fingerprint::murmur3(&["a"]);
        let b = Fingerprint::murmur3(&["b"]);
        assert_ne!(Fingerprint::combine(&[a, b]), Fingerprint::combine(&[b, a]));
        assert_eq!(Fingerprint::combine(&[a, b]), Fingerprint::combine(&[a, b]));
    }

    #[test]
    fn test_single_character_mutations_change_many_bits() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut total = 0;
        for _ in 0..SAMPLES {
            let len = rng.random_range(1..32);
            let original = (0..len)
                .map(|_| char::from(rng.random_range(b'a'..=b'z')))
                .collect::<String>();
            let position = rng.random_range(0..len);
            let mut mutated = original.clone().into_bytes();
            mutated[position] = if mutated[position] == b'z' {
                b'a'
            } else {
                mutated[position] + 1
            };
            let mutated = String::from_utf8(mutated).unwrap();

            let a = Fingerprint::murmur3(&[&original]);
            let b = Fingerprint::murmur3(&[&mutated]);
            let changed = (a.high() ^ b.high()).count_ones() + (a.low() ^ b.low()).count_ones();
            assert!(changed > 32, "only {changed} bits changed for {original} -> {mutated}");
            total += changed;
        }
        // Half of the 128 bits flip on average.
        let average = total / SAMPLES;
        assert!((58..=70).contains(&average), "average of {average} changed bits");
    }
}
