//! Local mesh analysis and validation.
//!
//! A bounded STL reader (binary and ASCII) plus printability checks. This is
//! pure local computation: no provider is consulted, and validation findings
//! are advisory; the print service remains the authority on fabricability.

mod stl;
mod validate;

pub use stl::{analyze_stl, Dimensions, MeshInfo, StlError};
pub use validate::{
    estimate_print_size, validate_mesh, PrintSizeEstimate, ValidationReport,
};
