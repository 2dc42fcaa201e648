use serde::{Deserialize, Serialize};




/**
 * Grid-wide attributes, handed to every patch on insertion into a
 * `PatchGrid`.
 */
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSettings {
    /// Cells near each block face which may not act as interpolation donors
    pub num_protect_layers: usize,

    /// Cells near each block face which receive interpolated data
    pub num_overlap_layers: usize,

    /// Number of data fields per patch (e.g. new, old, and stage storage)
    pub num_fields: usize,

    /// Number of state variables per cell in each field
    pub num_variables: usize,

    /// Compute value-interpolation coefficients for receive cells
    pub interpolate_data: bool,

    /// Also compute boundary-normal gradient coefficients
    pub interpolate_grad1n: bool,

    /// Scale factor applied to lengths read from grid files
    pub io_scale: f64,
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            num_protect_layers: 2,
            num_overlap_layers: 2,
            num_fields: 2,
            num_variables: 5,
            interpolate_data: true,
            interpolate_grad1n: false,
            io_scale: 1.0,
        }
    }
}
