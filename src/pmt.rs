//! C6: PMT decoder. Allocates PMT waveforms, verifies FT progression in
//! raw mode, drives Huffman decompression in compressed mode, and writes
//! per-channel pedestals.

use crate::bitwindow::BitWindow;
use crate::common_header::EventFormat;
use crate::error::DecodeError;
use crate::event::Event;
use crate::huffman::HuffmanTrie;
use crate::waveform::Waveform;

/// Sentinel pair that ends a raw-mode equipment early.
const STOP_SENTINEL: u16 = 0xFFFF;

/// `elec_id = channel*2 + (fec_id % 2) + ((fec_id - 2)/4 + 1) * 100` -- §4.6
/// step 1.
pub fn pmt_elec_id(fec_id: u16, channel: u16) -> u32 {
    let fec_id = fec_id as i32;
    let channel = channel as i32;
    let elec_id = channel * 2 + (fec_id % 2) + (((fec_id - 2) / 4) + 1) * 100;
    elec_id as u32
}

/// Position-in-FEC index (0..11) used for O(1) dense addressing during the
/// decode loop, per the Design Notes re-architecture (§9).
pub fn pmt_position(elec_id: u32) -> usize {
    ((elec_id % 100) / 2) as usize
}

/// Baseline map index: `((elec_id % 100) % 12) / 2`, §4.6 step 3.
pub fn pmt_baseline_index(elec_id: u32) -> usize {
    (((elec_id % 100) % 12) / 2) as usize
}

/// Expands a 16-bit channel mask into the ordered list of electronics IDs
/// for the FEC's channels, §4.6 step 1.
pub fn channel_mask_elec_ids(fec_id: u16, channel_mask: u16) -> Vec<u32> {
    let mut ids = Vec::new();
    for channel in 0..16u16 {
        if channel_mask & (1 << channel) != 0 {
            ids.push(pmt_elec_id(fec_id, channel));
        }
    }
    ids
}

/// Reads four 12-bit charges packed across three 16-bit words, per §4.6
/// step 4's raw-mode shift pattern. Shared with the SiPM decoder's raw
/// mode, which uses the identical packing (§4.7 step 6).
pub(crate) struct RawChargeReader<'a> {
    words: &'a [u16],
    pos: usize,
    slot: u8,
    ch0: u16,
    ch1: u16,
    ch2: u16,
    ch3: u16,
}

impl<'a> RawChargeReader<'a> {
    pub(crate) fn new(words: &'a [u16], pos: usize) -> Self {
        RawChargeReader {
            words,
            pos,
            slot: 4,
            ch0: 0,
            ch1: 0,
            ch2: 0,
            ch3: 0,
        }
    }

    fn refill(&mut self) -> Result<(), DecodeError> {
        let w0 = *self
            .words
            .get(self.pos)
            .ok_or_else(|| DecodeError::Truncated("raw charge word0".into()))? as u32;
        let w1 = *self
            .words
            .get(self.pos + 1)
            .ok_or_else(|| DecodeError::Truncated("raw charge word1".into()))? as u32;
        let w2 = *self
            .words
            .get(self.pos + 2)
            .ok_or_else(|| DecodeError::Truncated("raw charge word2".into()))? as u32;

        let window01 = (w0 << 16) | w1;
        self.ch0 = ((window01 >> 20) & 0xFFF) as u16;
        self.ch1 = ((window01 >> 8) & 0xFFF) as u16;

        let window12 = (w1 << 16) | w2;
        self.ch2 = ((window12 >> 12) & 0xFFF) as u16;
        self.ch3 = (w2 & 0xFFF) as u16;

        self.pos += 3;
        self.slot = 0;
        Ok(())
    }

    pub(crate) fn next(&mut self) -> Result<u16, DecodeError> {
        if self.slot >= 4 {
            self.refill()?;
        }
        let value = match self.slot {
            0 => self.ch0,
            1 => self.ch1,
            2 => self.ch2,
            _ => self.ch3,
        };
        self.slot += 1;
        Ok(value)
    }

    pub(crate) fn pos(&self) -> usize {
        self.pos
    }
}

/// Expected FT value at time bin `t`, wrapping modulo `n`, per §4.6 step 4's
/// raw-mode timing-wheel rule.
fn expected_ft(ft_bit: i32, trigger_ft: u16, pre_trigger: u32, n: u32, t: u32) -> u16 {
    let base = ((ft_bit as i64) << 16) | trigger_ft as i64;
    let n = n.max(1) as i64;
    let expected = (base - pre_trigger as i64 + t as i64).rem_euclid(n);
    (expected & 0xFFFF) as u16
}

/// Decodes one PMT equipment's channels into `event`, per §4.6.
pub fn decode_pmt_equipment(
    event: &mut Event,
    format: &EventFormat,
    words: &[u16],
    huffman_pmts: &HuffmanTrie,
) -> Result<(), DecodeError> {
    let elec_ids = channel_mask_elec_ids(format.fec_id, format.channel_mask);
    let n = format.effective_buffer_samples();

    for &elec_id in &elec_ids {
        event
            .pmt_waveforms
            .insert(elec_id, Waveform::zeroed(n as usize));
    }

    if format.baseline_present() {
        for &elec_id in &elec_ids {
            let idx = pmt_baseline_index(elec_id);
            if let Some(&baseline) = format.baselines.get(idx) {
                event.pmt_baselines.insert(elec_id, baseline);
            }
        }
    }

    let header_size = format.header_size as usize;
    if format.compressed() {
        decode_compressed(event, format, &words[header_size..], huffman_pmts, &elec_ids, n)
    } else {
        decode_raw(event, format, &words[header_size..], &elec_ids, n)
    }
}

fn decode_raw(
    event: &mut Event,
    format: &EventFormat,
    words: &[u16],
    elec_ids: &[u32],
    n: u32,
) -> Result<(), DecodeError> {
    let mut pos = 0usize;
    for t in 0..n {
        if words.get(pos) == Some(&STOP_SENTINEL) && words.get(pos + 1) == Some(&STOP_SENTINEL) {
            return Ok(());
        }

        let ft_word = *words
            .get(pos)
            .ok_or_else(|| DecodeError::Truncated("pmt raw FT word".into()))?;
        pos += 1;

        let expected = expected_ft(format.ft_bit, format.trigger_ft, format.effective_pre_trigger(), n, t);
        if ft_word != expected {
            return Err(DecodeError::FtMismatch {
                sample: t as usize,
                expected,
                found: ft_word,
            });
        }

        let mut reader = RawChargeReader::new(words, pos);
        for &elec_id in elec_ids {
            let charge = reader.next()?;
            let position = pmt_position(elec_id);
            if let Some(waveform) = event.pmt_waveforms.get_mut(&elec_id) {
                if let Some(sample) = waveform.samples_mut().get_mut(t as usize) {
                    *sample = charge as i16;
                }
            }
            let _ = position;
        }
        pos = reader.pos();
    }
    Ok(())
}

fn decode_compressed(
    event: &mut Event,
    _format: &EventFormat,
    words: &[u16],
    huffman_pmts: &HuffmanTrie,
    elec_ids: &[u32],
    n: u32,
) -> Result<(), DecodeError> {
    if n == 0 {
        return Ok(());
    }
    // t=0 skips one FT word before the compressed channel stream begins.
    let mut window = BitWindow::new(words, 1);

    // indexed by full elec_id (not position), per the Open Question
    // resolution in SPEC_FULL.md §9.
    let mut previous: Vec<i16> = vec![0i16; elec_ids.len()];

    for t in 0..n as usize {
        for (i, &elec_id) in elec_ids.iter().enumerate() {
            let value = window.decode_compressed(previous[i], huffman_pmts)?;
            previous[i] = value;
            if let Some(waveform) = event.pmt_waveforms.get_mut(&elec_id) {
                if let Some(sample) = waveform.samples_mut().get_mut(t) {
                    *sample = value;
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::common_header::EventFormat;

    #[test]
    fn elec_id_formula_matches_table_for_even_fec() {
        // fec_id=2: elec_id = channel*2 + 0 + ((2-2)/4+1)*100 = channel*2 + 100
        assert_eq!(pmt_elec_id(2, 0), 100);
        assert_eq!(pmt_elec_id(2, 1), 102);
        assert_eq!(pmt_elec_id(2, 11), 122);
    }

    #[test]
    fn elec_id_formula_matches_table_for_odd_fec() {
        // fec_id=3: elec_id = channel*2 + 1 + ((3-2)/4+1)*100 = channel*2 + 101
        assert_eq!(pmt_elec_id(3, 0), 101);
        assert_eq!(pmt_elec_id(3, 1), 103);
    }

    #[test]
    fn position_in_fec_is_zero_based_and_dense() {
        assert_eq!(pmt_position(100), 0);
        assert_eq!(pmt_position(102), 1);
        assert_eq!(pmt_position(122), 11);
    }

    #[test]
    fn channel_mask_expands_in_ascending_channel_order() {
        let ids = channel_mask_elec_ids(2, 0b0000_0000_0000_0101);
        assert_eq!(ids, vec![100, 104]);
    }

    #[test]
    fn raw_charge_reader_unpacks_four_channels_from_three_words() {
        // window01 = (0x0ABC << 16) | 0x0DEF
        let words = [0x0ABCu16, 0x0DEF, 0x1234];
        let mut reader = RawChargeReader::new(&words, 0);
        let ch0 = reader.next().unwrap();
        let ch1 = reader.next().unwrap();
        let ch2 = reader.next().unwrap();
        let ch3 = reader.next().unwrap();
        let window01: u32 = (0x0ABCu32 << 16) | 0x0DEF;
        assert_eq!(ch0, ((window01 >> 20) & 0xFFF) as u16);
        assert_eq!(ch1, ((window01 >> 8) & 0xFFF) as u16);
        let window12: u32 = (0x0DEFu32 << 16) | 0x1234;
        assert_eq!(ch2, ((window12 >> 12) & 0xFFF) as u16);
        assert_eq!(ch3, (0x1234 & 0xFFF) as u16);
        assert_eq!(reader.pos(), 3);
    }

    #[test]
    fn raw_mode_reports_ft_mismatch_as_decode_error_not_panic() {
        let mut event = Event::new(1, 1);
        let mut format = EventFormat::default();
        format.fec_id = 2;
        format.channel_mask = 0x0001;
        format.buffer_samples = 2;
        format.trigger_ft = 0x0005;
        format.header_size = 0;

        // FT word wrong on purpose (expected != 0x9999)
        let words = [0x9999u16, 0x0AAA, 0x0000, 0x0000, 0xFFFF, 0xFFFF];
        let result = decode_pmt_equipment(&mut event, &format, &words, &HuffmanTrie::new());
        assert!(matches!(result, Err(DecodeError::FtMismatch { .. })));
    }

    #[test]
    fn raw_mode_decodes_uniform_charges_for_single_channel() {
        let mut event = Event::new(1, 1);
        let mut format = EventFormat::default();
        format.fec_id = 2;
        format.channel_mask = 0x0001;
        format.buffer_samples = 2;
        format.pre_trigger = 0;
        format.trigger_ft = 0;
        format.header_size = 0;

        let ft0 = expected_ft(0, 0, 0, 2, 0);
        let ft1 = expected_ft(0, 0, 0, 2, 1);
        let words = [
            ft0, 0x0AA0, 0x0000, 0x0000, // t=0: FT, then 3 words for 4-channel group
            ft1, 0x0AA0, 0x0000, 0x0000, // t=1
        ];
        let result = decode_pmt_equipment(&mut event, &format, &words, &HuffmanTrie::new());
        assert!(result.is_ok());
        assert!(event.pmt_waveforms.contains_key(&100));
    }
}
