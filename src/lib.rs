//! Splitting of oversized tetrahedral mesh groups
//!
//! A process owns one or more groups, each holding a tetrahedral mesh together
//! with the communicators that map its interface vertices / faces to globally
//! meaningful slots. When a group holds too many elements it is split into
//! several sub-groups using an element partition, and the communicators are
//! extended so that the new interfaces between sub-groups are tracked.
use nalgebra::SVector;
use thiserror::Error;

pub mod buffer;
pub mod comm;
pub mod graph;
pub mod group;
pub mod mesh;
pub mod partition;
pub mod split;
pub mod tags;

pub use group::{Group, MemoryBudget, ParMesh};
pub use split::{SplitInfo, SplitParams};

/// Errors raised while building, partitioning or splitting groups
#[derive(Debug, Error)]
pub enum Error {
    /// A buffer could not be (re)allocated
    #[error("unable to allocate {what} ({requested} items)")]
    Allocation {
        what: &'static str,
        requested: usize,
    },
    /// The graph partitioner could not produce a valid assignment
    #[error("partitioning failed: {0}")]
    Partition(String),
    /// A freshly built group failed the consistency checks
    #[error("validation failed: {0}")]
    Validation(String),
    /// The memory ceiling does not allow the operation
    #[error("not enough memory: {required} bytes required, {available} bytes available")]
    InsufficientMemory { required: usize, available: usize },
    /// Invalid input data or parameters
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(all(feature = "32bit-tags", feature = "64bit-tags"))]
compile_error!("features `32bit-tags` and `64bit-tags` are mutually exclusive");
#[cfg(feature = "64bit-tags")]
/// Reference used for elements, faces and edges
pub type Tag = i64;
#[cfg(feature = "32bit-tags")]
/// Reference used for elements, faces and edges
pub type Tag = i32;
#[cfg(not(any(feature = "32bit-tags", feature = "64bit-tags")))]
/// Reference used for elements, faces and edges
pub type Tag = i16;

/// Vertex in 3D
pub type Vert3d = SVector<f64, 3>;

/// Assert that two floating point values are closer than a tolerance
#[macro_export]
macro_rules! assert_delta {
    ($x:expr, $y:expr, $d:expr) => {
        assert!(
            ($x - $y).abs() < $d,
            "({:.3e} - {:.3e}).abs() = {:.3e}",
            $x,
            $y,
            ($x - $y).abs()
        )
    };
}

#[cfg(test)]
pub(crate) fn init_log(level: &str) {
    use env_logger::Env;
    let _ = env_logger::Builder::from_env(Env::default().default_filter_or(level))
        .format_timestamp(None)
        .is_test(true)
        .try_init();
}
