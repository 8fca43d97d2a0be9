//! C5: common header parser. Decodes the NEXT common header's bit-fields
//! out of the word-flipped equipment payload produced by C4.

use bitflags::bitflags;

bitflags! {
    /// The boolean flags packed into the first two header words. Exposed as
    /// a `bitflags!` set (the teacher's idiom for packed flag fields)
    /// rather than six independent `bool`s.
    pub struct EventFormatFlags: u16 {
        const ZERO_SUPPRESSION = 0b0000_0001;
        const COMPRESSED_DATA  = 0b0000_0010;
        const BASELINE         = 0b0000_0100;
        const DUAL_MODE        = 0b0000_1000;
        const ERROR_BIT        = 0b0001_0000;
        /// The real high-gain-channels bit, read from its actual position
        /// rather than hardcoded to 1 -- see SPEC_FULL.md §9, the
        /// `channels_hg` REDESIGN FLAGS resolution.
        const CHANNELS_HG      = 0b0010_0000;
    }
}

/// Result of parsing the NEXT common header: format flags, firmware
/// version, FEC identity, trigger/buffer configuration, channel mask,
/// baselines, timestamp, and FT pointer -- see §3 and §4.5.
#[derive(Debug, Clone, Default)]
pub struct EventFormat {
    pub fec_type: u16,
    pub flags: EventFormatFlagsBits,
    pub fw_version: u16,
    pub word_count: u16,
    pub trigger_type: u16,
    pub trigger_counter: u32,
    pub buffer_samples: u32,
    pub pre_trigger: u32,
    pub buffer_samples2: u32,
    pub pre_trigger2: u32,
    pub channel_mask: u16,
    pub trigger_ft: u16,
    pub timestamp: u64,
    pub ft_bit: i32,
    pub number_of_channels: u16,
    pub fec_id: u16,
    pub baselines: Vec<u16>,
    pub header_size: u16,
}

/// A `Default`-friendly wrapper so `EventFormat` can derive `Default`
/// without `bitflags!`'s generated type needing one itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventFormatFlagsBits(pub u16);

impl EventFormatFlagsBits {
    pub fn get(&self) -> EventFormatFlags {
        EventFormatFlags::from_bits_truncate(self.0)
    }

    fn set(flag: EventFormatFlags, present: bool) -> u16 {
        if present {
            flag.bits()
        } else {
            0
        }
    }
}

impl EventFormat {
    pub fn zero_suppression(&self) -> bool {
        self.flags.get().contains(EventFormatFlags::ZERO_SUPPRESSION)
    }
    pub fn compressed(&self) -> bool {
        self.flags.get().contains(EventFormatFlags::COMPRESSED_DATA)
    }
    pub fn baseline_present(&self) -> bool {
        self.flags.get().contains(EventFormatFlags::BASELINE)
    }
    pub fn dual_mode(&self) -> bool {
        self.flags.get().contains(EventFormatFlags::DUAL_MODE)
    }
    pub fn error_bit(&self) -> bool {
        self.flags.get().contains(EventFormatFlags::ERROR_BIT)
    }
    pub fn channels_hg(&self) -> bool {
        self.flags.get().contains(EventFormatFlags::CHANNELS_HG)
    }

    /// The buffer/pre-trigger pair actually in effect: the alternate pair
    /// is used under firmware 10 when `trigger_type >= 8`.
    pub fn effective_buffer_samples(&self) -> u32 {
        if self.fw_version == 10 && self.trigger_type >= 8 {
            self.buffer_samples2
        } else {
            self.buffer_samples
        }
    }

    pub fn effective_pre_trigger(&self) -> u32 {
        if self.fw_version == 10 && self.trigger_type >= 8 {
            self.pre_trigger2
        } else {
            self.pre_trigger
        }
    }

    /// Parses the NEXT common header from a word-flipped stream, per
    /// §4.5. `words` must start at the beginning of the equipment's
    /// flipped payload.
    pub fn parse(words: &[u16]) -> EventFormat {
        let mut position = 0usize;
        let mut format = EventFormat::default();

        let (sequence_counter, new_position) = read_seq_counter(words, position);
        position = new_position;

        if sequence_counter == 0 {
            position = read_format_id(words, position, &mut format);
            position = read_word_count(words, position, &mut format);
            position = read_event_id(words, position, &mut format);
            if format.fw_version == 10 {
                position = read_event_conf_juliett(words, position, &mut format);
            }
            if format.fw_version >= 9 {
                if format.baseline_present() {
                    position = read_india_baselines(words, position, &mut format);
                }
                position = read_india_fec_id(words, position, &mut format);
            }
            position = read_ct_and_fth(words, position, &mut format);
            position = read_ftl(words, position, &mut format);
        }

        format.header_size = position as u16;
        format
    }
}

fn read_seq_counter(words: &[u16], position: usize) -> (u32, usize) {
    // Mirrors the source literally: both halves are read from
    // `words[position + 1]`, leaving `words[position]` unexamined. This
    // only matters for the zero-check that follows, which is unaffected by
    // `words[position]`'s value.
    let w = words[position + 1] as u32;
    let sequence_counter = (w & 0xFFFF) + (w << 16);
    (sequence_counter, position + 2)
}

fn read_format_id(words: &[u16], mut position: usize, format: &mut EventFormat) -> usize {
    let w0 = words[position];
    let fec_type = w0 & 0x000F;
    let zero_suppression = (w0 & 0x0010) != 0;
    let compressed_data = (w0 & 0x0020) != 0;
    let baseline = (w0 & 0x0040) != 0;
    let dual_mode = (w0 & 0x0080) != 0;
    let error_bit = (w0 & 0x4000) != 0;
    position += 1;

    let w1 = words[position];
    let fw_version = w1 & 0x7FFF;
    let channels_hg = (w1 & 0x8000) != 0;
    position += 1;

    let mut bits = 0u16;
    bits |= EventFormatFlagsBits::set(EventFormatFlags::ZERO_SUPPRESSION, zero_suppression);
    bits |= EventFormatFlagsBits::set(EventFormatFlags::COMPRESSED_DATA, compressed_data);
    bits |= EventFormatFlagsBits::set(EventFormatFlags::BASELINE, baseline);
    bits |= EventFormatFlagsBits::set(EventFormatFlags::DUAL_MODE, dual_mode);
    bits |= EventFormatFlagsBits::set(EventFormatFlags::ERROR_BIT, error_bit);
    bits |= EventFormatFlagsBits::set(EventFormatFlags::CHANNELS_HG, channels_hg);

    format.fec_type = fec_type;
    format.flags = EventFormatFlagsBits(bits);
    format.fw_version = fw_version;
    position
}

fn read_word_count(words: &[u16], mut position: usize, format: &mut EventFormat) -> usize {
    format.word_count = words[position] & 0xFFFF;
    position += 1;
    position
}

fn read_event_id(words: &[u16], mut position: usize, format: &mut EventFormat) -> usize {
    let trigger_type = words[position] & 0x000F;
    let trigger_counter =
        ((words[position] & 0xFFF0) as u32) << 12 | (words[position + 1] as u32 & 0xFFFF);
    position += 2;
    format.trigger_type = trigger_type;
    format.trigger_counter = trigger_counter;
    position
}

fn read_event_conf_juliett(words: &[u16], mut position: usize, format: &mut EventFormat) -> usize {
    format.buffer_samples = 2 * (words[position] as u32 & 0xFFFF);
    position += 1;
    format.pre_trigger = 2 * (words[position] as u32 & 0xFFFF);
    position += 1;
    format.buffer_samples2 = 2 * (words[position] as u32 & 0xFFFF);
    position += 1;
    format.pre_trigger2 = 2 * (words[position] as u32 & 0xFFFF);
    position += 1;
    format.channel_mask = words[position] & 0xFFFF;
    position += 1;
    position
}

/// Six 12-bit baselines packed across five 16-bit words (see DESIGN.md for
/// the reconciliation with spec.md's "four words" prose -- the nibble
/// schedule below is the bit-exact, mandatory part).
fn read_india_baselines(words: &[u16], mut position: usize, format: &mut EventFormat) -> usize {
    let mut baselines = Vec::with_capacity(6);

    let mut temp = (words[position] & 0xFFF0) >> 4;
    baselines.push(temp); // ch0

    temp = (words[position] & 0x000F) << 8;
    position += 1;
    temp += (words[position] & 0xFF00) >> 8;
    baselines.push(temp); // ch1

    temp = (words[position] & 0x00FF) << 4;
    position += 1;
    temp += (words[position] & 0xF000) >> 12;
    baselines.push(temp); // ch2

    temp = words[position] & 0x0FFF;
    baselines.push(temp); // ch3

    position += 1;
    temp = (words[position] & 0xFFF0) >> 4;
    baselines.push(temp); // ch4
    temp = (words[position] & 0x000F) << 8;

    position += 1;
    temp += (words[position] & 0xFF00) >> 8;
    baselines.push(temp); // ch5

    position += 1;
    format.baselines = baselines;
    position
}

fn read_india_fec_id(words: &[u16], mut position: usize, format: &mut EventFormat) -> usize {
    format.number_of_channels = words[position] & 0x001F;
    format.fec_id = (words[position] & 0x0FFE0) >> 5;
    position += 1;
    position
}

fn read_ct_and_fth(words: &[u16], mut position: usize, format: &mut EventFormat) -> usize {
    let mut timestamp = (words[position] as u64 & 0xFFFF) << 16;
    position += 1;
    timestamp += words[position] as u64 & 0xFFFF;
    position += 1;
    timestamp = (timestamp << 10) + (words[position] as u64 & 0x03FF);
    timestamp &= 0x03FF_FFFF_FFFF;

    let ft_bit = ((words[position] & 0x8000) >> 15) as i32;
    position += 1;

    format.timestamp = timestamp;
    format.ft_bit = ft_bit;
    position
}

fn read_ftl(words: &[u16], mut position: usize, format: &mut EventFormat) -> usize {
    format.trigger_ft = words[position] & 0xFFFF;
    position += 1;
    position
}
