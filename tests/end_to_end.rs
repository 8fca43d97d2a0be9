//! End-to-end pipeline tests: raw DATE-framed bytes in, decoded `Event` out,
//! exercising C3 (framing) through C9 (assembly) together rather than one
//! module at a time.
//!
//! Equipment payloads are built by specifying the *flipped* word stream a
//! decoder would see, then running the word-flip swap over it once more to
//! get the raw on-wire bytes: for buffers well under the 3996-word
//! sequence-counter period, the pairwise swap is its own inverse, so
//! `raw = swap_pairs(flipped)` round-trips through `flip_words` exactly.

use std::sync::Arc;

use next_raw_decoder::catalog::{Catalog, HuffmanCodeRow, InMemoryCatalog, SensorMappingRow};
use next_raw_decoder::config::Configuration;
use next_raw_decoder::date::read_event;
use next_raw_decoder::huffman::CONTROL_CODE;
use next_raw_decoder::writer::RecordingWriter;
use next_raw_decoder::{worker, DecoderContext};

const EVENT_MAGIC_NUMBER: u32 = 0xDA1E5AFE;
const EVENT_HEADER_SIZE: usize = 80;
const EQUIPMENT_HEADER_SIZE: usize = 28;

fn test_context() -> DecoderContext {
    let catalog = InMemoryCatalog::new(
        vec![
            HuffmanCodeRow { value: 0, code: "0".into(), min_run: 0, max_run: u32::MAX },
            HuffmanCodeRow { value: 1, code: "10".into(), min_run: 0, max_run: u32::MAX },
            HuffmanCodeRow { value: -1, code: "110".into(), min_run: 0, max_run: u32::MAX },
            HuffmanCodeRow { value: CONTROL_CODE, code: "111".into(), min_run: 0, max_run: u32::MAX },
        ],
        vec![HuffmanCodeRow { value: 0, code: "0".into(), min_run: 0, max_run: u32::MAX }],
        vec![SensorMappingRow { elec_id: 100, sensor_id: 5, min_run: 0, max_run: u32::MAX }],
        1000,
    );
    let (pmt, sipm, map) = catalog.load(42).unwrap();
    DecoderContext::new(Arc::new(pmt), Arc::new(sipm), Arc::new(map), Configuration::default())
}

/// Six 12-bit baselines packed into five 16-bit words, the inverse of
/// `common_header::read_india_baselines`.
fn pack_baselines(b: [u16; 6]) -> [u16; 5] {
    [
        (b[0] << 4) | (b[1] >> 8),
        ((b[1] & 0xFF) << 8) | (b[2] >> 4),
        ((b[2] & 0xF) << 12) | (b[3] & 0xFFF),
        (b[4] << 4) | (b[5] >> 8),
        (b[5] & 0xFF) << 8,
    ]
}

/// Builds a NEXT common header's word sequence for a single firmware-10
/// equipment, mirroring `common_header::EventFormat::parse`'s field-read
/// order exactly.
#[allow(clippy::too_many_arguments)]
fn next_common_header_words(
    fec_type: u16,
    zero_suppression: bool,
    compressed: bool,
    baseline_present: bool,
    error_bit: bool,
    fec_id: u16,
    trigger_type: u16,
    buffer_samples: u32,
    pre_trigger: u32,
    channel_mask: u16,
    baselines: Option<[u16; 6]>,
    trigger_ft: u16,
) -> Vec<u16> {
    let mut w = Vec::new();
    w.push(0); // seq counter word, unread half
    w.push(0); // seq counter word, read half -- zero selects the full-header path

    let mut format_id_h = fec_type & 0x000F;
    if zero_suppression {
        format_id_h |= 0x0010;
    }
    if compressed {
        format_id_h |= 0x0020;
    }
    if baseline_present {
        format_id_h |= 0x0040;
    }
    if error_bit {
        format_id_h |= 0x4000;
    }
    w.push(format_id_h);
    w.push(10); // fw_version=10, channels_hg=0

    w.push(0); // word count

    w.push(trigger_type & 0x000F); // event id high: trigger type, counter=0
    w.push(0); // event id low

    // Juliett block, fw==10.
    w.push((buffer_samples / 2) as u16);
    w.push((pre_trigger / 2) as u16);
    w.push((buffer_samples / 2) as u16);
    w.push((pre_trigger / 2) as u16);
    w.push(channel_mask);

    // fw>=9: baselines (if present) then the FEC id word, unconditionally.
    if let Some(b) = baselines {
        w.extend_from_slice(&pack_baselines(b));
    }
    w.push((fec_id << 5) | 1);

    w.push(0); // timestamp high
    w.push(0); // timestamp low
    w.push(0); // CT/FTh low word, ft_bit=0
    w.push(trigger_ft);

    w
}

fn swap_pairs(words: &[u16]) -> Vec<u16> {
    let mut out = Vec::with_capacity(words.len());
    let mut i = 0;
    while i + 1 < words.len() {
        out.push(words[i + 1]);
        out.push(words[i]);
        i += 2;
    }
    out
}

fn words_le_bytes(words: &[u16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(words.len() * 2);
    for &w in words {
        out.extend_from_slice(&w.to_le_bytes());
    }
    out
}

/// Wraps a logical (already word-flipped) equipment payload into the raw
/// on-wire equipment bytes `decode_equipment`'s own `flip_words` call will
/// turn back into `flipped_words`.
fn wrap_equipment(flipped_words: &[u16], equipment_type: u32, equipment_id: u32) -> Vec<u8> {
    let mut padded = flipped_words.to_vec();
    if padded.len() % 2 != 0 {
        padded.push(0);
    }
    let raw_words = swap_pairs(&padded);
    let payload = words_le_bytes(&raw_words);

    let mut out = Vec::with_capacity(EQUIPMENT_HEADER_SIZE + payload.len());
    out.extend_from_slice(&((EQUIPMENT_HEADER_SIZE + payload.len()) as u32).to_le_bytes());
    out.extend_from_slice(&equipment_type.to_le_bytes());
    out.extend_from_slice(&equipment_id.to_le_bytes());
    out.extend_from_slice(&[0u8; 12]); // equipment_type_attribute
    out.extend_from_slice(&[0u8; 4]); // equipment_basic_element_size
    out.extend_from_slice(&payload);
    out
}

fn event_header_bytes(event_type: u32, event_size: u32, run_nb: u32) -> Vec<u8> {
    let mut b = Vec::with_capacity(EVENT_HEADER_SIZE);
    b.extend_from_slice(&event_size.to_le_bytes());
    b.extend_from_slice(&EVENT_MAGIC_NUMBER.to_le_bytes());
    b.extend_from_slice(&(EVENT_HEADER_SIZE as u32).to_le_bytes());
    b.extend_from_slice(&1u32.to_le_bytes()); // version
    b.extend_from_slice(&event_type.to_le_bytes());
    b.extend_from_slice(&run_nb.to_le_bytes());
    b.extend_from_slice(&[0u8; 8]); // event id
    b.extend_from_slice(&[0u8; 16]); // trigger pattern
    b.extend_from_slice(&[0u8; 4]); // detector pattern
    b.extend_from_slice(&[0u8; 12]); // type attribute
    b.extend_from_slice(&[0u8; 4]); // ldc id
    b.extend_from_slice(&[0u8; 4]); // gdc id
    b.extend_from_slice(&[0u8; 4]); // timestamp sec
    b.extend_from_slice(&[0u8; 4]); // timestamp usec
    b
}

/// Wraps one LDC's concatenated equipment bytes with its own `EventHeader`.
fn wrap_ldc(equipment_bytes: &[u8], run_nb: u32) -> Vec<u8> {
    let event_size = (EVENT_HEADER_SIZE + equipment_bytes.len()) as u32;
    let mut out = event_header_bytes(7, event_size, run_nb);
    out.extend_from_slice(equipment_bytes);
    out
}

/// Wraps a single LDC's bytes with the GDC's own `EventHeader`, producing a
/// complete top-level DATE event buffer ready for `read_event`.
fn wrap_gdc_event(ldc_bytes: &[u8], run_nb: u32) -> Vec<u8> {
    let event_size = (EVENT_HEADER_SIZE + ldc_bytes.len()) as u32;
    let mut out = event_header_bytes(7, event_size, run_nb);
    out.extend_from_slice(ldc_bytes);
    out
}

#[test]
fn pmt_raw_mode_single_equipment_decodes_waveform_and_baseline() {
    let header = next_common_header_words(
        0,    // fec_type=PMT
        false, false, true, false, // zero_suppression, compressed, baseline_present, error_bit
        2,    // fec_id
        0,    // trigger_type
        8,    // buffer_samples
        2,    // pre_trigger
        0x0001, // channel_mask: channel 0 only -> elec_id 100
        Some([100, 0, 0, 0, 0, 0]),
        5, // trigger_ft
    );

    let mut payload = Vec::new();
    for t in 0u32..8 {
        let ft = (3 + t) % 8;
        payload.push(ft as u16);
        payload.push(0xAAA0); // window producing ch0=0x0AAA per the shift formula
        payload.push(0x0000);
        payload.push(0x0000);
    }

    let mut flipped = header;
    flipped.extend(payload);

    let equipment = wrap_equipment(&flipped, 0, 0);
    let ldc = wrap_ldc(&equipment, 42);
    let data = wrap_gdc_event(&ldc, 42);

    let (event_header, gdc_payload) = read_event(&data).unwrap();
    let mut ctx = test_context();
    let event = ctx.decode_event(&event_header, gdc_payload);

    assert!(!event.error);
    let waveform = event.pmt_waveforms.get(&100).expect("channel 100 present");
    assert_eq!(waveform.samples().to_vec(), vec![0x0AAAi16; 8]);
    assert_eq!(event.pmt_baselines.get(&100), Some(&100));
}

#[test]
fn pmt_compressed_mode_decodes_deltas_and_control_code_literal() {
    let header = next_common_header_words(
        0, false, true, false, false, 2, 0, 6, 0, 0x0001, None, 0,
    );
    // Hand-traced bitstream (see module comment in huffman.rs tests for the
    // code table): deltas 0, +1, -1, 0, 0 from a previous of 0, then a
    // control-code escape to the absolute literal 0x0500.
    let payload = vec![0u16, 0x58EA, 0x0000];

    let mut flipped = header;
    flipped.extend(payload);

    let equipment = wrap_equipment(&flipped, 0, 0);
    let ldc = wrap_ldc(&equipment, 42);
    let data = wrap_gdc_event(&ldc, 42);

    let (event_header, gdc_payload) = read_event(&data).unwrap();
    let mut ctx = test_context();
    let event = ctx.decode_event(&event_header, gdc_payload);

    assert!(!event.error);
    let waveform = event.pmt_waveforms.get(&100).expect("channel 100 present");
    assert_eq!(waveform.samples().to_vec(), vec![0i16, 1, 0, 0, 0, 0x0500]);
}

#[test]
fn sipm_dual_link_pairing_interleaves_and_decodes_raw_charges() {
    // Two half-link equipments (fec_id 4 and 5) whose post-header payloads
    // interleave into the same combined stream the single-FEB raw-mode
    // unit test in sipm.rs decodes directly.
    let header_a = next_common_header_words(1, false, false, false, false, 4, 0, 40, 0, 0, None, 0);
    let payload_a = vec![0x0C00u16, 0xF000, 0, 0x0ABC, 0x1234];
    let mut flipped_a = header_a;
    flipped_a.extend(payload_a);

    let header_b = next_common_header_words(1, false, false, false, false, 5, 0, 40, 0, 0, None, 0);
    let payload_b = vec![0u16, 0, 0, 0x0DEF, 0];
    let mut flipped_b = header_b;
    flipped_b.extend(payload_b);

    let equipment_a = wrap_equipment(&flipped_a, 1, 4);
    let equipment_b = wrap_equipment(&flipped_b, 1, 5);
    let mut equipments = equipment_a;
    equipments.extend(equipment_b);

    let ldc = wrap_ldc(&equipments, 42);
    let data = wrap_gdc_event(&ldc, 42);

    let (event_header, gdc_payload) = read_event(&data).unwrap();
    let mut ctx = test_context();
    let event = ctx.decode_event(&event_header, gdc_payload);

    assert!(!event.error);

    let window01: u32 = (0x0ABCu32 << 16) | 0x0DEF;
    let window12: u32 = (0x0DEFu32 << 16) | 0x1234;
    let expected_ch0 = ((window01 >> 20) & 0xFFF) as i16;
    let expected_ch1 = ((window01 >> 8) & 0xFFF) as i16;
    let expected_ch2 = ((window12 >> 12) & 0xFFF) as i16;
    let expected_ch3 = (0x1234 & 0xFFF) as i16;

    assert_eq!(event.sipm_waveforms[&3996].samples()[0], expected_ch0);
    assert_eq!(event.sipm_waveforms[&3997].samples()[0], expected_ch1);
    assert_eq!(event.sipm_waveforms[&3998].samples()[0], expected_ch2);
    assert_eq!(event.sipm_waveforms[&3999].samples()[0], expected_ch3);
}

#[test]
fn fec_error_bit_marks_the_event_as_errored_and_skips_decode() {
    let header = next_common_header_words(
        0, false, false, false, true, // error_bit=true
        2, 0, 8, 0, 0x0001, None, 0,
    );

    let equipment = wrap_equipment(&header, 0, 0);
    let ldc = wrap_ldc(&equipment, 42);
    let data = wrap_gdc_event(&ldc, 42);

    let (event_header, gdc_payload) = read_event(&data).unwrap();
    let mut ctx = test_context();
    ctx.config.discard_on_error = true;
    let event = ctx.decode_event(&event_header, gdc_payload);

    assert!(event.error);
    assert!(event.pmt_waveforms.is_empty());
}

#[test]
fn discard_on_error_drops_the_event_at_the_worker_sink() {
    // Same error-bit equipment as above, but driven through the worker
    // pool's producer/worker/sink pipeline rather than `decode_event`
    // directly: with `discard_on_error` enabled, the sink must never hand
    // the errored event to the writer.
    let header = next_common_header_words(
        0, false, false, false, true, // error_bit=true
        2, 0, 8, 0, 0x0001, None, 0,
    );

    let equipment = wrap_equipment(&header, 0, 0);
    let ldc = wrap_ldc(&equipment, 42);
    let data = wrap_gdc_event(&ldc, 42);

    let context_factory = || {
        let mut ctx = test_context();
        ctx.config.discard_on_error = true;
        ctx
    };

    let writer = RecordingWriter::new();
    let written = worker::run(&data, 1, -1, 0, context_factory, &writer);

    assert_eq!(written, 0);
    assert!(writer.is_empty());
}
