//! Configuration surface (§6): a plain options record delivered to the core,
//! loadable from a JSON config file (`serde`) and overridable from the CLI
//! (`clap`, in the `decode` binary). The core only ever sees `Configuration`;
//! it never touches `clap` or the filesystem itself.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Blosc compression algorithm, carried through for the benefit of a real
/// `ArchiveWriter` implementation. Inert inside this crate's `NullWriter`
/// and `RecordingWriter` -- compression-format research is a Non-goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BloscAlgorithm {
    Blosclz,
    Lz4,
    Lz4hc,
    Snappy,
    Zlib,
    Zstd,
}

impl Default for BloscAlgorithm {
    fn default() -> Self {
        BloscAlgorithm::Zstd
    }
}

/// Blosc shuffle filter, see `BloscAlgorithm`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BloscShuffle {
    NoShuffle,
    ByteShuffle,
    BitShuffle,
}

impl Default for BloscShuffle {
    fn default() -> Self {
        BloscShuffle::ByteShuffle
    }
}

/// Database connection parameters. Carried on `Configuration` but never
/// dialed by this crate -- database connectivity is a Non-goal; a real
/// `Catalog` implementation elsewhere would consume these fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DbConfig {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub pass: String,
    #[serde(default)]
    pub dbname: String,
}

/// The two-code, enable-flag trigger split described in the data model's
/// `Configuration` entry.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TriggerCodes {
    #[serde(default)]
    pub split_enabled: bool,
    #[serde(default)]
    pub code1: i32,
    #[serde(default)]
    pub code2: i32,
}

/// The full configuration surface from §6, stable for the lifetime of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub max_events: i64,
    pub skip: i64,
    pub verbosity: i32,
    pub ext_trigger_channel: i32,
    pub pmt_sum_channel: i32,
    pub trigger_codes: TriggerCodes,
    pub read_pmts: bool,
    pub read_sipms: bool,
    pub read_trigger: bool,
    pub discard_on_error: bool,
    pub no_db: bool,

    pub file_in: String,
    pub file_out: String,
    pub file_out2: String,
    pub db: DbConfig,

    pub num_workers: usize,
    pub parallel: bool,
    pub write_data: bool,
    pub use_blosc: bool,
    pub compression_level: i32,
    pub blosc_algorithm: BloscAlgorithm,
    pub blosc_shuffle: BloscShuffle,
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration {
            max_events: -1,
            skip: 0,
            verbosity: 0,
            ext_trigger_channel: -1,
            pmt_sum_channel: -1,
            trigger_codes: TriggerCodes::default(),
            read_pmts: true,
            read_sipms: true,
            read_trigger: true,
            discard_on_error: false,
            no_db: false,
            file_in: String::new(),
            file_out: String::new(),
            file_out2: String::new(),
            db: DbConfig::default(),
            num_workers: 1,
            parallel: false,
            write_data: true,
            use_blosc: false,
            compression_level: 5,
            blosc_algorithm: BloscAlgorithm::default(),
            blosc_shuffle: BloscShuffle::default(),
        }
    }
}

impl Configuration {
    /// Loads a `Configuration` from a JSON file, falling back to defaults
    /// for any field the file omits.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, std::io::Error> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// `elec_id == ext_trigger_channel` is only a routing match when the
    /// channel was actually configured (a negative value means "none").
    pub fn has_ext_trigger_channel(&self) -> bool {
        self.ext_trigger_channel >= 0
    }

    pub fn has_pmt_sum_channel(&self) -> bool {
        self.pmt_sum_channel >= 0
    }
}
