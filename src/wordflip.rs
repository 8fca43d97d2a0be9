//! C4: word flipper. Reinterprets a raw byte run as a little-endian 16-bit
//! word stream, swaps adjacent word pairs, and drops the transport layer's
//! periodic sequence-counter pair.

use byteorder::{ByteOrder, LittleEndian};

/// Every 3996 input 16-bit positions, the transport layer injects a
/// sequence-counter pair that must not appear in the logical stream.
const SEQUENCE_COUNTER_PERIOD: usize = 3996;

/// Converts a raw byte run into a word-flipped `u16` stream. Trailing bytes
/// that don't form a complete `u16` are discarded (§9's Open Question
/// resolution: the source rounds input length down at non-8-byte alignment,
/// and this crate preserves that by simply never reading past a whole word).
pub fn flip_words(data: &[u8]) -> Vec<u16> {
    let word_count = data.len() / 2;
    let mut words = Vec::with_capacity(word_count);
    for i in 0..word_count {
        words.push(LittleEndian::read_u16(&data[i * 2..i * 2 + 2]));
    }

    let mut out = Vec::with_capacity(word_count);
    let mut position_in = 0usize;
    while position_in + 1 < words.len() {
        if position_in > 0 && position_in % SEQUENCE_COUNTER_PERIOD == 0 {
            position_in += 2;
            if position_in + 1 >= words.len() {
                break;
            }
        }
        out.push(words[position_in + 1]);
        out.push(words[position_in]);
        position_in += 2;
    }
    out
}
