//! C10 / A5: run-metadata catalog. Returns Huffman tries and the
//! sensor-identity map for a run number. A real database-backed catalog is
//! explicitly out of scope (Non-goal: database connectivity); this module
//! provides the trait boundary plus an in-memory reference implementation.

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;
use crate::event::SensorsMap;
use crate::huffman::HuffmanTrie;

/// One row of a catalog's Huffman codebook table, valid for `min_run..=max_run`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HuffmanCodeRow {
    pub value: i32,
    pub code: String,
    pub min_run: u32,
    pub max_run: u32,
}

/// One row of a catalog's sensor-mapping table, valid for `min_run..=max_run`.
/// `elec_id < 999` routes to the PMT bijection, otherwise SiPM, per §6.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SensorMappingRow {
    pub elec_id: u32,
    pub sensor_id: u32,
    pub min_run: u32,
    pub max_run: u32,
}

/// Returns the Huffman tries (PMT, SiPM) and the sensor map for a run.
pub trait Catalog {
    fn load(&self, run_number: u32) -> Result<(HuffmanTrie, HuffmanTrie, SensorsMap), CatalogError>;
}

/// Reference `Catalog` built from literal tables, the form tests and small
/// fixed-mapping deployments use. Mirrors the `MinRun ≤ run ≤ MaxRun` row
/// filter and `ElecID < 999 ⇒ PMT else SiPM` split of
/// `original_source/pkg/database.go`'s `getHuffmanCodesFromDB`/
/// `getSensorsFromDB`, minus the actual SQL.
pub struct InMemoryCatalog {
    pmt_codes: Vec<HuffmanCodeRow>,
    sipm_codes: Vec<HuffmanCodeRow>,
    sensor_rows: Vec<SensorMappingRow>,
    pmt_id_offset: u32,
}

/// On-disk shape of an `InMemoryCatalog`, loaded as a stand-in for the
/// out-of-scope database backend: one JSON file with literal Huffman and
/// sensor-mapping rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogFile {
    pub pmt_codes: Vec<HuffmanCodeRow>,
    pub sipm_codes: Vec<HuffmanCodeRow>,
    pub sensor_rows: Vec<SensorMappingRow>,
    pub pmt_id_offset: u32,
}

impl InMemoryCatalog {
    pub fn from_json_file(path: impl AsRef<std::path::Path>) -> Result<Self, CatalogError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| CatalogError::BackendUnavailable(e.to_string()))?;
        let file: CatalogFile = serde_json::from_str(&text)
            .map_err(|e| CatalogError::BackendUnavailable(e.to_string()))?;
        Ok(InMemoryCatalog::new(
            file.pmt_codes,
            file.sipm_codes,
            file.sensor_rows,
            file.pmt_id_offset,
        ))
    }

    pub fn new(
        pmt_codes: Vec<HuffmanCodeRow>,
        sipm_codes: Vec<HuffmanCodeRow>,
        sensor_rows: Vec<SensorMappingRow>,
        pmt_id_offset: u32,
    ) -> Self {
        InMemoryCatalog {
            pmt_codes,
            sipm_codes,
            sensor_rows,
            pmt_id_offset,
        }
    }

    fn build_trie(
        rows: &[HuffmanCodeRow],
        run_number: u32,
        sensor_kind: &'static str,
    ) -> Result<HuffmanTrie, CatalogError> {
        let filtered: Vec<(i32, &str)> = rows
            .iter()
            .filter(|r| r.min_run <= run_number && run_number <= r.max_run)
            .map(|r| (r.value, r.code.as_str()))
            .collect();
        if filtered.is_empty() {
            return Err(CatalogError::EmptyHuffmanTable {
                run: run_number,
                sensor_kind,
            });
        }
        HuffmanTrie::build(&filtered)
    }
}

impl Catalog for InMemoryCatalog {
    fn load(&self, run_number: u32) -> Result<(HuffmanTrie, HuffmanTrie, SensorsMap), CatalogError> {
        let pmt_trie = Self::build_trie(&self.pmt_codes, run_number, "pmt")?;
        let sipm_trie = Self::build_trie(&self.sipm_codes, run_number, "sipm")?;

        let rows: Vec<&SensorMappingRow> = self
            .sensor_rows
            .iter()
            .filter(|r| r.min_run <= run_number && run_number <= r.max_run)
            .collect();
        if rows.is_empty() {
            return Err(CatalogError::EmptySensorMap(run_number));
        }

        let mut map = SensorsMap::new(self.pmt_id_offset);
        for row in rows {
            map.insert(row.elec_id, row.sensor_id);
        }

        Ok((pmt_trie, sipm_trie, map))
    }
}
