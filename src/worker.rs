//! A6: worker pool. A concrete realization of §5's scheduling model over
//! `std::thread` + `std::sync::mpsc`: a producer thread drives the DATE
//! framer, N worker threads each own a private `DecoderContext`, and a sink
//! drains decoded events into the `ArchiveWriter`.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use log::{debug, info};

use crate::assembler::DecoderContext;
use crate::date::{EventHeader, EventIterator};
use crate::event::Event;
use crate::writer::ArchiveWriter;

/// One queued unit of work: a top-level event header plus its raw payload.
struct WorkItem {
    header: EventHeader,
    payload: Vec<u8>,
}

/// Runs the full pipeline: scan `data` for DATE events, fan decoding out
/// across `num_workers` threads, and write every decoded event to `writer`.
/// Returns the number of events written.
///
/// Ordering is not preserved across workers (§5): the writer must tolerate
/// out-of-order delivery, which `NullWriter`/`RecordingWriter` do.
///
/// Per §7, an event whose `error` flag is set is dropped here at the sink
/// rather than written when `Configuration::discard_on_error` is enabled.
pub fn run<'a>(
    data: &[u8],
    num_workers: usize,
    max_events: i64,
    skip: i64,
    context_factory: impl Fn() -> DecoderContext + Send + Sync + 'a,
    writer: &(dyn ArchiveWriter + 'a),
) -> usize {
    let num_workers = num_workers.max(1);
    let discard_on_error = context_factory().config.discard_on_error;
    let (work_tx, work_rx) = mpsc::sync_channel::<WorkItem>(64);
    let (result_tx, result_rx) = mpsc::channel::<Event>();
    let work_rx = Arc::new(std::sync::Mutex::new(work_rx));

    thread::scope(|scope| {
        for worker_id in 0..num_workers {
            let work_rx = Arc::clone(&work_rx);
            let result_tx = result_tx.clone();
            let mut context = context_factory();
            scope.spawn(move || {
                loop {
                    let item = {
                        let rx = work_rx.lock().expect("work queue mutex poisoned");
                        rx.recv()
                    };
                    let item = match item {
                        Ok(item) => item,
                        Err(_) => break,
                    };
                    debug!("worker {worker_id} decoding event {:?}", item.header.event_id_in_run());
                    let event = context.decode_event(&item.header, &item.payload);
                    if result_tx.send(event).is_err() {
                        break;
                    }
                }
            });
        }
        drop(result_tx);

        scope.spawn(move || {
            let mut produced = 0i64;
            let mut skipped = 0i64;
            for item in EventIterator::new(data) {
                let (header, payload) = match item {
                    Ok(v) => v,
                    Err(_) => break,
                };
                if !header.is_valid() {
                    continue;
                }
                if skipped < skip {
                    skipped += 1;
                    continue;
                }
                if max_events >= 0 && produced >= max_events {
                    break;
                }
                produced += 1;
                if work_tx
                    .send(WorkItem {
                        header,
                        payload: payload.to_vec(),
                    })
                    .is_err()
                {
                    break;
                }
            }
        });

        let mut written = 0usize;
        while let Ok(event) = result_rx.recv() {
            if event.error && discard_on_error {
                continue;
            }
            writer.write(event);
            written += 1;
        }
        info!("worker pool wrote {written} events");
        written
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::catalog::{Catalog, HuffmanCodeRow, InMemoryCatalog, SensorMappingRow};
    use crate::config::Configuration;
    use crate::date::{EventType, EVENT_HEADER_SIZE};
    use crate::writer::RecordingWriter;

    fn build_header(event_type: u32, event_size: u32, run_nb: u32) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(EVENT_HEADER_SIZE);
        bytes.extend_from_slice(&event_size.to_le_bytes());
        bytes.extend_from_slice(&crate::date::EVENT_MAGIC_NUMBER.to_le_bytes());
        bytes.extend_from_slice(&(EVENT_HEADER_SIZE as u32).to_le_bytes());
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&event_type.to_le_bytes());
        bytes.extend_from_slice(&run_nb.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 8]);
        bytes.extend_from_slice(&[0u8; 16]);
        bytes.extend_from_slice(&[0u8; 4]);
        bytes.extend_from_slice(&[0u8; 12]);
        bytes.extend_from_slice(&[0u8; 4]);
        bytes.extend_from_slice(&[0u8; 4]);
        bytes.extend_from_slice(&[0u8; 4]);
        bytes.extend_from_slice(&[0u8; 4]);
        bytes
    }

    fn context_factory() -> impl Fn() -> DecoderContext {
        move || {
            let catalog = InMemoryCatalog::new(
                vec![HuffmanCodeRow {
                    value: 0,
                    code: "0".into(),
                    min_run: 0,
                    max_run: u32::MAX,
                }],
                vec![HuffmanCodeRow {
                    value: 0,
                    code: "0".into(),
                    min_run: 0,
                    max_run: u32::MAX,
                }],
                vec![SensorMappingRow {
                    elec_id: 100,
                    sensor_id: 5,
                    min_run: 0,
                    max_run: u32::MAX,
                }],
                1000,
            );
            let (pmt, sipm, map) = catalog.load(1).unwrap();
            DecoderContext::new(
                Arc::new(pmt),
                Arc::new(sipm),
                Arc::new(map),
                Configuration::default(),
            )
        }
    }

    #[test]
    fn worker_pool_writes_only_valid_events() {
        let mut data = Vec::new();
        data.extend(build_header(EventType::PHYSICS_EVENT.0, EVENT_HEADER_SIZE as u32, 1));
        data.extend(build_header(EventType::START_OF_RUN.0, EVENT_HEADER_SIZE as u32, 1));
        data.extend(build_header(EventType::CALIBRATION_EVENT.0, EVENT_HEADER_SIZE as u32, 1));
        data.extend(build_header(EventType::END_OF_RUN.0, EVENT_HEADER_SIZE as u32, 1));
        data.extend(build_header(EventType::PHYSICS_EVENT.0, EVENT_HEADER_SIZE as u32, 1));

        let writer = RecordingWriter::new();
        let written = run(&data, 2, -1, 0, context_factory(), &writer);
        assert_eq!(written, 3);
        assert_eq!(writer.len(), 3);
    }

    #[test]
    fn single_worker_matches_multi_worker_event_count() {
        let mut data = Vec::new();
        for _ in 0..5 {
            data.extend(build_header(EventType::PHYSICS_EVENT.0, EVENT_HEADER_SIZE as u32, 1));
        }

        let writer_one = RecordingWriter::new();
        run(&data, 1, -1, 0, context_factory(), &writer_one);

        let writer_four = RecordingWriter::new();
        run(&data, 4, -1, 0, context_factory(), &writer_four);

        assert_eq!(writer_one.len(), writer_four.len());
    }
}
