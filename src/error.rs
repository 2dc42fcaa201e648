use std::error;
use std::fmt;
use std::io;
use crate::geometry::Vec3;

/**
 * Errors that make a patch grid unusable: bad grid files, geometric queries
 * that must succeed by construction but don't, and requests for features
 * that do not exist. Misses during interpolation queries are not errors;
 * they are reported through `Option` returns and counters.
 */
#[derive(Debug)]
pub enum Error {
    Io(io::Error),
    GridFile { line: usize, message: String },
    UnknownPatchType(u32),
    OutsideHashRaster { patch: usize, point: Vec3 },
    NotInitialized(&'static str),
    StaleDependencies,
    OuterLayerCorrectionUnimplemented,
    Serialization(String),
}

pub type Result<T> = core::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Error::*;

        match self {
            Io(e) => write!(fmt, "i/o error: {}", e),
            GridFile { line, message } => write!(fmt, "grid file, line {}: {}", line, message),
            UnknownPatchType(code) => write!(fmt, "unknown patch type code {}", code),
            OutsideHashRaster { patch, point } => write!(
                fmt,
                "bounding box corner ({} {} {}) of patch {} is outside the hash raster",
                point.x, point.y, point.z, patch
            ),
            NotInitialized(what) => write!(fmt, "patch is not initialized: {}", what),
            StaleDependencies => write!(fmt, "patch dependencies are stale; run compute_dependencies first"),
            OuterLayerCorrectionUnimplemented => {
                write!(fmt, "minimum distance correction of the outer level-set layer is not implemented")
            }
            Serialization(message) => write!(fmt, "serialization error: {}", message),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}
