//! C3: DATE framer. Scans GDC -> LDC -> equipment framing out of a raw DATE
//! container file, classifying each top-level event by `EventType` and
//! yielding `(EquipmentHeader, flipped-word-payload)` pairs to the event
//! assembler.

use crate::error::FramingError;
use crate::raw_data::RawData;
use byteorder::LittleEndian;

pub const EVENT_MAGIC_NUMBER: u32 = 0xDA1E5AFE;

/// `EventType` codes from §6; only `PHYSICS_EVENT` and `CALIBRATION_EVENT`
/// are decoded, everything else is skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventType(pub u32);

impl EventType {
    pub const START_OF_RUN: EventType = EventType(1);
    pub const END_OF_RUN: EventType = EventType(2);
    pub const START_OF_RUN_FILES: EventType = EventType(3);
    pub const END_OF_RUN_FILES: EventType = EventType(4);
    pub const START_OF_BURST: EventType = EventType(5);
    pub const END_OF_BURST: EventType = EventType(6);
    pub const PHYSICS_EVENT: EventType = EventType(7);
    pub const CALIBRATION_EVENT: EventType = EventType(8);
    pub const EVENT_FORMAT_ERROR: EventType = EventType(9);

    pub fn is_valid(self) -> bool {
        self == EventType::PHYSICS_EVENT || self == EventType::CALIBRATION_EVENT
    }
}

/// The 80-byte DATE event header, identical for GDC top-level events and
/// each nested LDC subevent.
#[derive(Debug, Clone, Copy)]
pub struct EventHeader {
    pub event_size: u32,
    pub event_magic: u32,
    pub event_head_size: u32,
    pub event_version: u32,
    pub event_type: EventType,
    pub event_run_nb: u32,
    pub event_id: [u32; 2],
    pub trigger_pattern: [u32; 4],
    pub detector_pattern: u32,
    pub type_attribute: [u32; 3],
    pub ldc_id: u32,
    pub gdc_id: u32,
    pub timestamp_sec: u32,
    pub timestamp_usec: u32,
}

/// Byte length of `EventHeader` on the wire.
pub const EVENT_HEADER_SIZE: usize = 80;

impl EventHeader {
    pub fn parse(data: &mut RawData) -> Result<Self, FramingError> {
        let event_size = data.read_u32::<LittleEndian>()?;
        let event_magic = data.read_u32::<LittleEndian>()?;
        if event_magic != EVENT_MAGIC_NUMBER {
            return Err(FramingError::BadMagic(event_magic));
        }
        let event_head_size = data.read_u32::<LittleEndian>()?;
        let event_version = data.read_u32::<LittleEndian>()?;
        let event_type = EventType(data.read_u32::<LittleEndian>()?);
        let event_run_nb = data.read_u32::<LittleEndian>()?;
        let event_id = [
            data.read_u32::<LittleEndian>()?,
            data.read_u32::<LittleEndian>()?,
        ];
        let trigger_pattern = [
            data.read_u32::<LittleEndian>()?,
            data.read_u32::<LittleEndian>()?,
            data.read_u32::<LittleEndian>()?,
            data.read_u32::<LittleEndian>()?,
        ];
        let detector_pattern = data.read_u32::<LittleEndian>()?;
        let type_attribute = [
            data.read_u32::<LittleEndian>()?,
            data.read_u32::<LittleEndian>()?,
            data.read_u32::<LittleEndian>()?,
        ];
        let ldc_id = data.read_u32::<LittleEndian>()?;
        let gdc_id = data.read_u32::<LittleEndian>()?;
        let timestamp_sec = data.read_u32::<LittleEndian>()?;
        let timestamp_usec = data.read_u32::<LittleEndian>()?;

        Ok(EventHeader {
            event_size,
            event_magic,
            event_head_size,
            event_version,
            event_type,
            event_run_nb,
            event_id,
            trigger_pattern,
            detector_pattern,
            type_attribute,
            ldc_id,
            gdc_id,
            timestamp_sec,
            timestamp_usec,
        })
    }

    /// `EventIdGetNbInRun`: the first word of `event_id` is the event's
    /// sequence number within the run.
    pub fn event_id_in_run(&self) -> u32 {
        self.event_id[0]
    }

    pub fn is_valid(&self) -> bool {
        self.event_type.is_valid()
    }
}

/// The 28-byte per-equipment header nested inside an LDC payload.
#[derive(Debug, Clone, Copy)]
pub struct EquipmentHeader {
    pub equipment_size: u32,
    pub equipment_type: u32,
    pub equipment_id: u32,
    pub equipment_type_attribute: [u32; 3],
    pub equipment_basic_element_size: u32,
}

pub const EQUIPMENT_HEADER_SIZE: usize = 28;

impl EquipmentHeader {
    pub fn parse(data: &mut RawData) -> Result<Self, FramingError> {
        Ok(EquipmentHeader {
            equipment_size: data.read_u32::<LittleEndian>()?,
            equipment_type: data.read_u32::<LittleEndian>()?,
            equipment_id: data.read_u32::<LittleEndian>()?,
            equipment_type_attribute: [
                data.read_u32::<LittleEndian>()?,
                data.read_u32::<LittleEndian>()?,
                data.read_u32::<LittleEndian>()?,
            ],
            equipment_basic_element_size: data.read_u32::<LittleEndian>()?,
        })
    }
}

/// One decoded equipment payload ready for C4/C5 dispatch: the header plus
/// the bytes between the equipment header and the next equipment (or the
/// end of the LDC).
pub struct EquipmentPayload<'a> {
    pub header: EquipmentHeader,
    pub bytes: &'a [u8],
}

/// Iterates equipments within a single LDC's payload bytes (the bytes after
/// the LDC's own `EventHeader`).
pub fn iterate_equipments(
    ldc_payload: &[u8],
    ldc_event_size: u32,
    ldc_head_size: u32,
) -> Result<Vec<EquipmentPayload>, FramingError> {
    let mut equipments = Vec::new();
    let mut start_position = 0usize;
    loop {
        let mut cursor: RawData = ldc_payload
            .get(start_position..)
            .ok_or(FramingError::Truncated {
                needed: start_position,
                found: ldc_payload.len(),
            })?
            .into();
        let header = EquipmentHeader::parse(&mut cursor)?;
        let body_start = start_position + EQUIPMENT_HEADER_SIZE;
        let body_end = start_position + header.equipment_size as usize;
        let bytes = ldc_payload
            .get(body_start..body_end)
            .ok_or(FramingError::SizeMismatch {
                declared: header.equipment_size,
                available: ldc_payload.len().saturating_sub(body_start),
            })?;
        let equipment_size = header.equipment_size;
        equipments.push(EquipmentPayload { header, bytes });

        start_position += equipment_size as usize;
        if (start_position as u32) + ldc_head_size >= ldc_event_size {
            break;
        }
    }
    Ok(equipments)
}

/// One LDC subevent: its header plus the equipments it carries.
pub struct Ldc<'a> {
    pub header: EventHeader,
    pub equipments: Vec<EquipmentPayload<'a>>,
}

/// Iterates LDC subevents within a single GDC event's payload bytes (the
/// bytes after the GDC's own `EventHeader`, i.e. the bytes `ReadEvent`
/// would return).
pub fn iterate_ldcs(event_data: &[u8]) -> Result<Vec<Ldc>, FramingError> {
    let mut ldcs = Vec::new();
    let mut position = 0usize;
    loop {
        let mut cursor: RawData = event_data
            .get(position..)
            .ok_or(FramingError::Truncated {
                needed: position,
                found: event_data.len(),
            })?
            .into();
        let header = EventHeader::parse(&mut cursor)?;
        let ldc_payload_start = position + header.event_head_size as usize;
        let ldc_payload_end = position + header.event_size as usize;
        let ldc_payload = event_data
            .get(ldc_payload_start..ldc_payload_end)
            .ok_or(FramingError::SizeMismatch {
                declared: header.event_size,
                available: event_data.len().saturating_sub(ldc_payload_start),
            })?;
        let equipments =
            iterate_equipments(ldc_payload, header.event_size, header.event_head_size)?;
        let event_size = header.event_size;
        ldcs.push(Ldc { header, equipments });

        position += event_size as usize;
        if position >= event_data.len() {
            break;
        }
    }
    Ok(ldcs)
}

/// Reads one top-level (GDC) event: its header, and the raw bytes of its
/// payload (still containing nested LDC headers, not yet framed further).
pub fn read_event(data: &[u8]) -> Result<(EventHeader, &[u8]), FramingError> {
    if data.len() < EVENT_HEADER_SIZE {
        return Err(FramingError::Truncated {
            needed: EVENT_HEADER_SIZE,
            found: data.len(),
        });
    }
    let mut cursor: RawData = data[..EVENT_HEADER_SIZE].into();
    let header = EventHeader::parse(&mut cursor)?;
    let payload_size = header
        .event_size
        .checked_sub(EVENT_HEADER_SIZE as u32)
        .ok_or(FramingError::SizeMismatch {
            declared: header.event_size,
            available: data.len(),
        })?;
    let payload = data
        .get(EVENT_HEADER_SIZE..EVENT_HEADER_SIZE + payload_size as usize)
        .ok_or(FramingError::SizeMismatch {
            declared: header.event_size,
            available: data.len() - EVENT_HEADER_SIZE,
        })?;
    Ok((header, payload))
}

/// A pre-pass over a DATE file's top-level events: counts valid events and
/// records the run number from the first one, per §4.3.
pub struct PrePassSummary {
    pub valid_event_count: u64,
    pub run_number: Option<u32>,
}

pub fn pre_pass(mut remaining: &[u8]) -> PrePassSummary {
    let mut valid_event_count = 0;
    let mut run_number = None;
    while remaining.len() >= EVENT_HEADER_SIZE {
        let (header, _payload) = match read_event(remaining) {
            Ok(v) => v,
            Err(_) => break,
        };
        if header.is_valid() {
            valid_event_count += 1;
            if run_number.is_none() {
                run_number = Some(header.event_run_nb);
            }
        }
        let advance = header.event_size as usize;
        if advance == 0 || advance > remaining.len() {
            break;
        }
        remaining = &remaining[advance..];
    }
    PrePassSummary {
        valid_event_count,
        run_number,
    }
}

/// Iterates whole top-level DATE events out of a byte buffer, skipping
/// non-physics/calibration events by advancing past their payload.
pub struct EventIterator<'a> {
    remaining: &'a [u8],
}

impl<'a> EventIterator<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        EventIterator { remaining: data }
    }
}

impl<'a> Iterator for EventIterator<'a> {
    type Item = Result<(EventHeader, &'a [u8]), FramingError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining.len() < EVENT_HEADER_SIZE {
            return None;
        }
        match read_event(self.remaining) {
            Ok((header, payload)) => {
                let advance = header.event_size as usize;
                if advance == 0 || advance > self.remaining.len() {
                    self.remaining = &[];
                    return Some(Err(FramingError::SizeMismatch {
                        declared: header.event_size,
                        available: self.remaining.len(),
                    }));
                }
                self.remaining = &self.remaining[advance..];
                Some(Ok((header, payload)))
            }
            Err(e) => {
                self.remaining = &[];
                Some(Err(e))
            }
        }
    }
}
