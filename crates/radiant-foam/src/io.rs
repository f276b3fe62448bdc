//! Foam files: JSON, gzip-compressed when the path ends in `.gz`.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};

use crate::packed::{encode_harmonics, PackedPosition};
use crate::{FoamError, FoamStore, ShDegree};

/// On-disk foam. Harmonics use the packed word layout of [`crate::packed`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FoamFile {
    pub sh_degree: ShDegree,
    pub positions: Vec<[f32; 3]>,
    /// Exclusive end of each cell's range in `neighbors`.
    pub adjacency_end: Vec<u32>,
    pub neighbors: Vec<u32>,
    pub densities: Vec<f32>,
    pub harmonics: Vec<u32>,
    /// Cells forced transparent on load (unbounded hull cells).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boundary_cells: Option<Vec<u32>>,
}

impl FoamFile {
    pub fn from_store(foam: &FoamStore) -> Self {
        let degree = foam.degree();
        let mut harmonics = Vec::with_capacity(
            foam.num_cells() * crate::packed::packed_words_per_cell(degree),
        );
        for coeffs in foam.harmonics().chunks_exact(degree.num_terms()) {
            encode_harmonics(coeffs, degree, &mut harmonics);
        }

        Self {
            sh_degree: degree,
            positions: foam.positions().iter().map(|p| p.to_array()).collect(),
            adjacency_end: foam.adjacency_ends().to_vec(),
            neighbors: foam.neighbors().to_vec(),
            densities: foam.densities().to_vec(),
            harmonics,
            boundary_cells: None,
        }
    }

    /// Validate and build the store, applying `boundary_cells`.
    pub fn into_store(self) -> Result<FoamStore, FoamError> {
        check_lengths(&self)?;
        let positions: Vec<PackedPosition> = self
            .positions
            .iter()
            .zip(&self.adjacency_end)
            .map(|(&p, &end)| PackedPosition {
                xyz: p,
                adjacency_end: end,
            })
            .collect();

        let mut foam = FoamStore::from_packed(
            self.sh_degree,
            &positions,
            self.neighbors,
            self.densities,
            &self.harmonics,
        )?;

        if let Some(cells) = self.boundary_cells {
            foam.make_transparent(cells)?;
        }
        Ok(foam)
    }
}

fn check_lengths(file: &FoamFile) -> Result<(), FoamError> {
    if file.positions.len() != file.adjacency_end.len() {
        return Err(FoamError::LengthMismatch {
            what: "adjacency offsets",
            expected: file.positions.len(),
            actual: file.adjacency_end.len(),
        });
    }
    Ok(())
}

fn is_gzip(path: &Path) -> bool {
    path.extension().map(|ext| ext == "gz").unwrap_or(false)
}

/// Read a foam file, decompressing `.gz` paths.
pub fn load_foam(path: &Path) -> Result<FoamStore, FoamError> {
    let file = File::open(path)?;
    let reader: Box<dyn Read> = if is_gzip(path) {
        Box::new(GzDecoder::new(BufReader::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };
    let data: FoamFile = serde_json::from_reader(reader)?;

    log::info!(
        "Loaded {} ({} cells, {} faces, SH degree {})",
        path.display(),
        data.positions.len(),
        data.neighbors.len(),
        data.sh_degree.as_u32()
    );
    data.into_store()
}

/// Write `foam` to `path`, gzip-compressing `.gz` paths.
pub fn save_foam(foam: &FoamStore, path: &Path) -> Result<(), FoamError> {
    write_foam_file(&FoamFile::from_store(foam), path)
}

pub fn write_foam_file(data: &FoamFile, path: &Path) -> Result<(), FoamError> {
    let file = File::create(path)?;
    if is_gzip(path) {
        let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
        serde_json::to_writer(&mut encoder, data)?;
        encoder.finish()?.flush()?;
    } else {
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, data)?;
        writer.flush()?;
    }
    log::debug!("Wrote {} cells to {}", data.positions.len(), path.display());
    Ok(())
}
