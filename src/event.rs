//! Data model (§3): the decoded `Event`, its `TriggerConfig`, and the
//! run-scoped `SensorsMap` bijection between electronics and sensor IDs.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::waveform::Waveform;

pub type ElecId = u32;

/// The fixed-layout trigger-configuration record decoded by C8, one field
/// per TRG-conf sub-field rather than the raw conf words themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerConfig {
    pub trigger_type: u16,
    pub trigger_lost1: u32,
    pub trigger_lost2: u32,
    pub trigger_mask: u32,
    pub trigger_diff1: u16,
    pub trigger_diff2: u16,
    pub auto_trigger: u16,
    pub dual_trigger: u16,
    pub external_trigger: u16,
    pub mask: u16,
    pub trigger_b1: u16,
    pub trigger_b2: u16,
    pub chan_a1: u16,
    pub chan_a2: u16,
    pub chan_b1: u16,
    pub chan_b2: u16,
    pub window_a1: u16,
    pub window_a2: u16,
    pub window_b1: u16,
    pub window_b2: u16,
    pub trigger_int_n: u16,
    pub trigger_ext_n: u16,
    /// Up to 48 channel indices that fired, MSB-first scan order.
    pub fired_channels: Vec<u16>,
}

/// Per-run, immutable bijection between electronics-domain and
/// physics-domain sensor identifiers; shared read-only across every event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SensorsMap {
    pmt_elec_to_sensor: HashMap<ElecId, u32>,
    pmt_sensor_to_elec: HashMap<u32, ElecId>,
    sipm_elec_to_sensor: HashMap<ElecId, u32>,
    sipm_sensor_to_elec: HashMap<u32, ElecId>,
    pub pmt_id_offset: u32,
}

impl SensorsMap {
    pub fn new(pmt_id_offset: u32) -> Self {
        SensorsMap {
            pmt_id_offset,
            ..Default::default()
        }
    }

    /// Inserts one `(elec_id, sensor_id)` row, routed to the PMT or SiPM
    /// bijection per §6's `ElecID < 999 ⇒ PMT else SiPM` rule.
    pub fn insert(&mut self, elec_id: ElecId, sensor_id: u32) {
        if sensor_id < 999 {
            self.pmt_elec_to_sensor.insert(elec_id, sensor_id);
            self.pmt_sensor_to_elec.insert(sensor_id, elec_id);
        } else {
            self.sipm_elec_to_sensor.insert(elec_id, sensor_id);
            self.sipm_sensor_to_elec.insert(sensor_id, elec_id);
        }
    }

    pub fn pmt_sensor_id(&self, elec_id: ElecId) -> Option<u32> {
        self.pmt_elec_to_sensor.get(&elec_id).copied()
    }

    pub fn pmt_elec_id(&self, sensor_id: u32) -> Option<ElecId> {
        self.pmt_sensor_to_elec.get(&sensor_id).copied()
    }

    pub fn sipm_sensor_id(&self, elec_id: ElecId) -> Option<u32> {
        self.sipm_elec_to_sensor.get(&elec_id).copied()
    }

    pub fn sipm_elec_id(&self, sensor_id: u32) -> Option<ElecId> {
        self.sipm_sensor_to_elec.get(&sensor_id).copied()
    }
}

/// One fully decoded DATE event: created fresh per input event, populated
/// by the decoders, consumed by the archive writer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Event {
    pub run_number: u32,
    pub event_id: u64,
    pub timestamp_sec: u32,
    pub timestamp_usec: u32,
    pub trigger_type: u16,

    pub pmt_waveforms: HashMap<ElecId, Waveform>,
    pub pmt_baselines: HashMap<ElecId, u16>,
    pub blr_waveforms: HashMap<ElecId, Waveform>,
    pub blr_baselines: HashMap<ElecId, u16>,
    pub sipm_waveforms: HashMap<ElecId, Waveform>,

    pub ext_trigger_waveform: Option<Waveform>,
    pub pmt_sum_waveform: Option<Waveform>,
    pub pmt_sum_baseline: Option<u16>,

    pub trigger_config: Option<TriggerConfig>,

    #[serde(skip)]
    pub sensors_map: Option<std::sync::Arc<SensorsMap>>,

    pub error: bool,
}

impl Event {
    pub fn new(run_number: u32, event_id: u64) -> Self {
        Event {
            run_number,
            event_id,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn sensors_map_splits_pmt_and_sipm_by_sensor_id() {
        let mut map = SensorsMap::new(1000);
        map.insert(100, 5);
        map.insert(64000, 2000);

        assert_eq!(map.pmt_sensor_id(100), Some(5));
        assert_eq!(map.pmt_elec_id(5), Some(100));
        assert_eq!(map.sipm_sensor_id(64000), Some(2000));
        assert_eq!(map.sipm_elec_id(2000), Some(64000));
        assert_eq!(map.pmt_sensor_id(64000), None);
    }

    #[test]
    fn fresh_event_has_no_error_and_empty_maps() {
        let event = Event::new(42, 1);
        assert!(!event.error);
        assert!(event.pmt_waveforms.is_empty());
        assert!(event.trigger_config.is_none());
    }
}
