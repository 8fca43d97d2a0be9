//! C9: event assembler. The explicit `DecoderContext` replacing the
//! source's global mutable state (§9): owns the per-run catalog handles,
//! the run `Configuration`, and per-event scratch state, and orchestrates
//! C3-C8 plus the post-processing pass.

use std::sync::Arc;

use log::warn;

use crate::common_header::EventFormat;
use crate::config::Configuration;
use crate::date::{iterate_ldcs, EventHeader};
use crate::error::DecodeError;
use crate::event::{Event, SensorsMap};
use crate::huffman::HuffmanTrie;
use crate::pmt::decode_pmt_equipment;
use crate::sipm::{decode_sipm_stream, PendingSipmMap};
use crate::trigger::decode_trigger;
use crate::wordflip::flip_words;

/// FEC-kind codes carried in the common header's `fec_type` field.
/// Not given numerically in the upstream bit-layout notes available to this
/// crate; fixed here as PMT=0, SiPM=1, Trigger=2 -- see DESIGN.md.
pub mod fec_type {
    pub const PMT: u16 = 0;
    pub const SIPM: u16 = 1;
    pub const TRIGGER: u16 = 2;
}

/// Per-worker bundle of catalog handles, configuration, and per-event
/// scratch state. One `DecoderContext` per worker thread; the catalog
/// fields are `Arc`-shared, the scratch fields are private.
pub struct DecoderContext {
    pub huffman_pmts: Arc<HuffmanTrie>,
    pub huffman_sipms: Arc<HuffmanTrie>,
    pub sensors_map: Arc<SensorsMap>,
    pub config: Configuration,
    pending_sipms: PendingSipmMap,
}

impl DecoderContext {
    pub fn new(
        huffman_pmts: Arc<HuffmanTrie>,
        huffman_sipms: Arc<HuffmanTrie>,
        sensors_map: Arc<SensorsMap>,
        config: Configuration,
    ) -> Self {
        DecoderContext {
            huffman_pmts,
            huffman_sipms,
            sensors_map,
            config,
            pending_sipms: PendingSipmMap::new(),
        }
    }

    /// Decodes one top-level DATE event into a fresh `Event`, per §2's
    /// control-flow paragraph and §4.9's post-processing.
    pub fn decode_event(&mut self, header: &EventHeader, gdc_payload: &[u8]) -> Event {
        let mut event = Event::new(header.event_run_nb, header.event_id_in_run() as u64);
        event.timestamp_sec = header.timestamp_sec;
        event.timestamp_usec = header.timestamp_usec;
        event.sensors_map = Some(Arc::clone(&self.sensors_map));

        let ldcs = match iterate_ldcs(gdc_payload) {
            Ok(ldcs) => ldcs,
            Err(_) => {
                event.error = true;
                return event;
            }
        };

        for ldc in &ldcs {
            for equipment in &ldc.equipments {
                if let Err(_err) = self.decode_equipment(&mut event, equipment.bytes) {
                    event.error = true;
                    if self.config.discard_on_error {
                        continue;
                    }
                }
            }
        }

        if !self.pending_sipms.is_empty() {
            warn!(
                "run {} event {}: pending SiPM map non-empty at teardown",
                event.run_number, event.event_id
            );
        }

        post_process(&mut event, &self.config);
        event
    }

    fn decode_equipment(&mut self, event: &mut Event, bytes: &[u8]) -> Result<(), DecodeError> {
        let words = flip_words(bytes);
        let format = EventFormat::parse(&words);

        if format.error_bit() {
            return Err(DecodeError::FecErrorBit(format.fec_id));
        }

        match format.fec_type {
            fec_type::PMT if self.config.read_pmts => {
                decode_pmt_equipment(event, &format, &words, &self.huffman_pmts)
            }
            fec_type::SIPM if self.config.read_sipms => {
                let payload = words[format.header_size as usize..].to_vec();
                match self.pending_sipms.offer(format.fec_id, payload)? {
                    Some((_a, _b, combined)) => {
                        decode_sipm_stream(event, &format, &combined, &self.huffman_sipms)
                    }
                    None => Ok(()),
                }
            }
            fec_type::TRIGGER if self.config.read_trigger => {
                let config = decode_trigger(&words[format.header_size as usize..])?;
                event.trigger_config = Some(config);
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// §4.9: reclassify PMT electronics IDs into their final destinations.
fn post_process(event: &mut Event, config: &Configuration) {
    let elec_ids: Vec<u32> = event.pmt_waveforms.keys().copied().collect();
    for elec_id in elec_ids {
        if config.has_ext_trigger_channel() && elec_id == config.ext_trigger_channel as u32 {
            if let Some(waveform) = event.pmt_waveforms.remove(&elec_id) {
                event.ext_trigger_waveform = Some(waveform);
            }
            event.pmt_baselines.remove(&elec_id);
            continue;
        }
        if config.has_pmt_sum_channel() && elec_id == config.pmt_sum_channel as u32 {
            if let Some(waveform) = event.pmt_waveforms.remove(&elec_id) {
                event.pmt_sum_waveform = Some(waveform);
            }
            event.pmt_sum_baseline = event.pmt_baselines.remove(&elec_id);
            continue;
        }
        if elec_id % 100 >= 12 {
            if let Some(waveform) = event.pmt_waveforms.remove(&elec_id) {
                event.blr_waveforms.insert(elec_id - 12, waveform);
            }
            if let Some(baseline) = event.pmt_baselines.remove(&elec_id) {
                event.blr_baselines.insert(elec_id - 12, baseline);
            }
        }
    }
}
