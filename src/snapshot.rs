use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use log::info;
use serde::{Deserialize, Serialize};
use crate::error::{Error, Result};
use crate::geometry::{CoordTransform, Vec3};
use crate::patch::CartesianPatch;
use crate::patch_grid::PatchGrid;




/**
 * The state of one patch at one output count, as written to disk. Field
 * data is laid out as in the patch: fields, then variables, then cells in
 * row-major order.
 */
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PatchSnapshot {
    pub index: usize,
    pub count: usize,
    pub comment: String,
    pub dim: [usize; 3],
    pub lengths: Vec3,
    pub transform: CoordTransform,
    pub num_fields: usize,
    pub num_variables: usize,
    pub data: Vec<f64>,
}

impl PatchSnapshot {
    pub fn from_patch(patch: &CartesianPatch, count: usize) -> Self {
        let (ni, nj, nk) = patch.dim();
        Self {
            index: patch.index(),
            count,
            comment: patch.comment().to_string(),
            dim: [ni, nj, nk],
            lengths: patch.lengths(),
            transform: patch.transform().clone(),
            num_fields: patch.num_fields(),
            num_variables: patch.num_variables(),
            data: patch.data().to_vec(),
        }
    }

    /**
     * Return the values of one variable of one field.
     */
    pub fn variable(&self, field: usize, var: usize) -> &[f64] {
        let n = self.dim.iter().product::<usize>();
        let start = (field * self.num_variables + var) * n;
        &self.data[start..start + n]
    }
}




/**
 * Return the file name of a patch snapshot: the base name, the patch index,
 * and the output count, both zero-padded to six digits.
 */
pub fn snapshot_path(base: &str, patch: usize, count: usize) -> PathBuf {
    PathBuf::from(format!("{}_ip{:06}_{:06}.cbor", base, patch, count))
}




pub fn write_snapshot<P: AsRef<Path>>(path: P, snapshot: &PatchSnapshot) -> Result<()> {
    let file = File::create(path)?;
    let mut buffer = BufWriter::new(file);
    ciborium::ser::into_writer(snapshot, &mut buffer).map_err(|e| Error::Serialization(e.to_string()))?;
    buffer.flush()?;
    Ok(())
}




pub fn read_snapshot<P: AsRef<Path>>(path: P) -> Result<PatchSnapshot> {
    let file = File::open(path)?;
    ciborium::de::from_reader(BufReader::new(file)).map_err(|e| Error::Serialization(e.to_string()))
}




// ============================================================================
impl PatchGrid {

    /**
     * Write one snapshot file per patch, and return the paths written.
     */
    pub fn write_data(&self, base: &str, count: usize) -> Result<Vec<PathBuf>> {
        let paths = self
            .patches()
            .iter()
            .enumerate()
            .map(|(n, patch)| {
                let path = snapshot_path(base, n, count);
                write_snapshot(&path, &PatchSnapshot::from_patch(patch, count))?;
                Ok(path)
            })
            .collect::<Result<Vec<_>>>()?;

        info!("wrote {} patch snapshots to {}_ip*_{:06}.cbor", paths.len(), base, count);
        Ok(paths)
    }
}
