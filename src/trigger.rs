//! C8: trigger decoder. Parses the fixed-layout trigger-configuration word
//! block: 9 TRG-conf words (each packing several named sub-fields), 1
//! trigger-type word, 3 words of a 48-bit channel-fired mask, and 4 words of
//! two 32-bit trigger-lost counters.

use crate::error::DecodeError;
use crate::event::TriggerConfig;

const WORD_COUNT: usize = 9 + 1 + 3 + 4;

/// Decodes a trigger FEC's word stream into a `TriggerConfig`, §4.8. The
/// per-word shift/mask formulas below mirror the original TRG-conf layout:
/// conf words 8 down to 0 are read in that order, each packing the
/// sub-fields named on its line.
pub fn decode_trigger(words: &[u16]) -> Result<TriggerConfig, DecodeError> {
    if words.len() < WORD_COUNT {
        return Err(DecodeError::Truncated(format!(
            "trigger FEC needs {WORD_COUNT} words, found {}",
            words.len()
        )));
    }

    let mut position = 0usize;

    // TRG conf 8
    let mut trigger_mask = (words[position] as u32 & 0x03FF) << 16;
    position += 1;
    // TRG conf 7
    trigger_mask |= words[position] as u32 & 0xFFFF;
    position += 1;

    // TRG conf 6
    let trigger_diff1 = words[position] & 0xFFFF;
    position += 1;
    // TRG conf 5
    let trigger_diff2 = words[position] & 0xFFFF;
    position += 1;

    // TRG conf 4
    let window_a1 = words[position] & 0x003F;
    let chan_a1 = (words[position] & 0x01FC0) >> 6;
    let auto_trigger = (words[position] & 0x02000) >> 13;
    let dual_trigger = (words[position] & 0x04000) >> 14;
    let external_trigger = (words[position] & 0x08000) >> 15;
    position += 1;

    // TRG conf 3
    let window_b1 = words[position] & 0x003F;
    let chan_b1 = (words[position] & 0x01FC0) >> 6;
    let mask = (words[position] & 0x02000) >> 13;
    let trigger_b2 = (words[position] & 0x04000) >> 14;
    let trigger_b1 = (words[position] & 0x08000) >> 15;
    position += 1;

    // TRG conf 2
    let window_a2 = words[position] & 0x003F;
    let chan_a2 = (words[position] & 0x01FC0) >> 6;
    position += 1;

    // TRG conf 1
    let window_b2 = words[position] & 0x003F;
    let chan_b2 = (words[position] & 0x01FC0) >> 6;
    position += 1;

    // TRG conf 0
    let trigger_ext_n = words[position] & 0x000F;
    let trigger_int_n = (words[position] & 0x0FFF0) >> 4;
    position += 1;

    // Trigger type
    let trigger_type = (words[position] & 0xFFFF) >> 15;
    position += 1;

    let mut config = TriggerConfig {
        trigger_type,
        trigger_lost1: 0,
        trigger_lost2: 0,
        trigger_mask,
        trigger_diff1,
        trigger_diff2,
        auto_trigger,
        dual_trigger,
        external_trigger,
        mask,
        trigger_b1,
        trigger_b2,
        chan_a1,
        chan_a2,
        chan_b1,
        chan_b2,
        window_a1,
        window_a2,
        window_b1,
        window_b2,
        trigger_int_n,
        trigger_ext_n,
        fired_channels: Vec::new(),
    };

    // 3 words of a 48-bit channel-fired bitmap, scanned MSB-first from
    // channel 47 down to 0.
    let mask_words = [words[position], words[position + 1], words[position + 2]];
    position += 3;
    for (word_index, &word) in mask_words.iter().enumerate() {
        for bit in (0..16).rev() {
            if word & (1 << bit) != 0 {
                let channel = 47 - (word_index as u16 * 16 + (15 - bit));
                config.fired_channels.push(channel);
            }
        }
    }

    // Trigger lost type 2, then type 1.
    config.trigger_lost2 = ((words[position] as u32) << 16) | words[position + 1] as u32;
    position += 2;
    config.trigger_lost1 = ((words[position] as u32) << 16) | words[position + 1] as u32;

    Ok(config)
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample_words() -> Vec<u16> {
        let mut w = vec![0u16; WORD_COUNT];
        w[0] = 0x0011; // TRG conf 8: high bits of trigger_mask
        w[1] = 0x2222; // TRG conf 7: low bits of trigger_mask
        w[2] = 0x3333; // trigger_diff1
        w[3] = 0x4444; // trigger_diff2
        w[4] = 0x8000; // external_trigger bit set
        w[9] = 0x8000; // trigger type bit set
        w[10] = 0x8000; // channel 47 fired (word 0, bit 15)
        w[12] = 0x0001; // channel 32 fired (word 2, bit 0)
        w[13] = 0x0000;
        w[14] = 0x00FF; // trigger_lost2 low half
        w[15] = 0x0000;
        w[16] = 0x0010; // trigger_lost1 low half
        w
    }

    #[test]
    fn decomposes_conf_words_into_named_subfields() {
        let words = sample_words();
        let config = decode_trigger(&words).unwrap();
        assert_eq!(config.trigger_mask, (0x0011u32 << 16) | 0x2222);
        assert_eq!(config.trigger_diff1, 0x3333);
        assert_eq!(config.trigger_diff2, 0x4444);
        assert_eq!(config.external_trigger, 1);
        assert_eq!(config.trigger_type, 0x8000 >> 15);
    }

    #[test]
    fn channel_mask_scans_msb_first_from_channel_47() {
        let words = sample_words();
        let config = decode_trigger(&words).unwrap();
        assert!(config.fired_channels.contains(&47));
        assert!(config.fired_channels.contains(&32));
    }

    #[test]
    fn trigger_lost_counters_assemble_from_two_words_each() {
        let words = sample_words();
        let config = decode_trigger(&words).unwrap();
        assert_eq!(config.trigger_lost2, 0x00FF);
        assert_eq!(config.trigger_lost1, 0x0010);
    }

    #[test]
    fn trg_conf4_packs_window_chan_and_flags() {
        let mut w = sample_words();
        // window_a1 = 0x3F, chan_a1 = 0x1F, auto_trigger=1, dual_trigger=1, external_trigger=1
        w[4] = 0x003F | (0x1F << 6) | (1 << 13) | (1 << 14) | (1 << 15);
        let config = decode_trigger(&w).unwrap();
        assert_eq!(config.window_a1, 0x3F);
        assert_eq!(config.chan_a1, 0x1F);
        assert_eq!(config.auto_trigger, 1);
        assert_eq!(config.dual_trigger, 1);
        assert_eq!(config.external_trigger, 1);
    }

    #[test]
    fn truncated_stream_is_an_error_not_a_panic() {
        let words = vec![0u16; 3];
        assert!(decode_trigger(&words).is_err());
    }
}
