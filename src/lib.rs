//! # next-raw-decoder
//!
//! Decodes DATE-framed DAQ raw event files into structured `Event`s: PMT and
//! SiPM waveforms, per-channel baselines, and trigger configuration.
//!
//! ## Example
//!
//! ```rust
//! use next_raw_decoder::catalog::{Catalog, HuffmanCodeRow, InMemoryCatalog, SensorMappingRow};
//! use next_raw_decoder::config::Configuration;
//! use next_raw_decoder::assembler::DecoderContext;
//! use std::sync::Arc;
//!
//! let catalog = InMemoryCatalog::new(
//!     vec![HuffmanCodeRow { value: 0, code: "0".into(), min_run: 0, max_run: u32::MAX }],
//!     vec![HuffmanCodeRow { value: 0, code: "0".into(), min_run: 0, max_run: u32::MAX }],
//!     vec![SensorMappingRow { elec_id: 100, sensor_id: 5, min_run: 0, max_run: u32::MAX }],
//!     1000,
//! );
//! let (pmt_trie, sipm_trie, sensors_map) = catalog.load(1).unwrap();
//! let _context = DecoderContext::new(
//!     Arc::new(pmt_trie),
//!     Arc::new(sipm_trie),
//!     Arc::new(sensors_map),
//!     Configuration::default(),
//! );
//! ```

pub mod assembler;
pub mod bitwindow;
pub mod catalog;
pub mod common_header;
pub mod config;
pub mod date;
pub mod error;
pub mod event;
pub mod huffman;
pub mod pmt;
pub mod raw_data;
pub mod sipm;
pub mod trigger;
pub mod waveform;
pub mod wordflip;
pub mod worker;
pub mod writer;

pub use assembler::DecoderContext;
pub use config::Configuration;
pub use error::{CatalogError, DecodeError, FramingError};
pub use event::Event;
pub use raw_data::RawData;
