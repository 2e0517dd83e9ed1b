//! # semiblas: sparse matrix algebra over semirings
//!
//! semiblas multiplies, combines and assigns sparse matrices whose entries
//! are combined by user-chosen operators rather than plain `+` and `*`.
//! Any monoid can play the role of addition and any binary operator the role
//! of multiplication, so the same kernels compute shortest paths
//! (`min.plus`), reachability (`lor.land`) or ordinary products
//! (`plus.times`).
//!
//! ## Overview
//!
//! - **Four layouts**: every [`Matrix`] is held as full, bitmap, sparse or
//!   hypersparse, and moves between them automatically as its density
//!   changes
//! - **Deferred work**: deletions leave zombies and insertions queue as
//!   pending tuples; both are finished in one pass when a result is needed
//! - **Masked operations**: every operation can restrict its output to the
//!   entries of a mask, or of its complement
//! - **Parallel kernels**: work is sliced into tasks of similar cost and run
//!   on rayon thread pools
//!
//! ## Operations
//!
//! 1. [`mxm`]: `C<M> = A*B` over a semiring, by dot products or by
//!    Gustavson's method, chosen per call from the shapes and the mask
//! 2. [`emult`] and [`ewise_add`]: element-wise intersection and union
//! 3. [`assign`] and [`subassign`]: `C<M>(I,J) = accum(C(I,J), A)`
//!
//! ## Usage
//!
//! ```
//! use semiblas::{mxm, Descriptor, DupPolicy, Matrix, Semiring, NO_MASK};
//!
//! let a = Matrix::from_tuples(3, 3, &[0, 1, 2], &[0, 1, 2], &[1, 2, 3], DupPolicy::Error)?;
//! let c = mxm(NO_MASK, &Semiring::plus_times(), &a, &a, &Descriptor::default())?;
//! assert_eq!(c.extract_element(2, 2)?, Some(9));
//! # Ok::<(), semiblas::GrbError>(())
//! ```
//!
//! Algorithm choices are reported as `tracing` debug events on the
//! `semiblas::burble` target once [`config::set_burble`] is on.

pub mod assign;
pub mod config;
pub mod constants;
pub mod descriptor;
pub mod error;
pub mod ewise;
pub mod matrix;
pub mod mxm;
pub mod ops;
pub mod parallel;
pub mod partition;
pub mod types;
pub mod utils;

// Re-export primary components
pub use assign::{assign, subassign, AssignSource, IndexList};
pub use config::{AxBMethod, GrbConfig, Mode, SystemParameters};
pub use descriptor::Descriptor;
pub use error::{GrbError, Result};
pub use ewise::{emult, ewise_add, NO_MASK};
pub use matrix::{DupPolicy, ExportedMatrix, Matrix, MatrixState, Sparsity, SparsityControl};
pub use mxm::mxm;
pub use ops::{BinaryOp, Monoid, Opcode, Semiring};
pub use types::{Scalar, Type, TypeCode};

/// Version information for the semiblas library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
