use thiserror::Error;

use crate::grid::Region;
use crate::terrain_data::LayerId;

/// Errors raised by the landscape editing core.
///
/// Stroke application never surfaces these to the caller; they are logged
/// and the offending apply becomes a no-op.
#[derive(Debug, Error)]
pub enum EditError {
    /// The storage backend reported valid bounds that are inverted after an
    /// interpolated fetch. This is a backend contract violation.
    #[error("invalid cache area: valid {valid} after requesting {requested}")]
    InvalidCacheArea { valid: Region, requested: Region },

    #[error("unknown weight layer {0:?}")]
    UnknownLayer(LayerId),

    #[error("tool '{tool}' cannot edit the {target} target")]
    InvalidTarget { tool: &'static str, target: &'static str },

    #[error("alpha texture is {width}x{height} but has {actual} texels")]
    AlphaTextureSize {
        width: usize,
        height: usize,
        actual: usize,
    },

    #[error("settings I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings are malformed: {0}")]
    Json(#[from] serde_json::Error),
}

pub type EditResult<T> = Result<T, EditError>;
