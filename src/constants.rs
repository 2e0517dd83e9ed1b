//! Centralized constants for the semiblas sparse matrix engine
//!
//! This module contains all tuning constants used throughout the codebase.
//! All new constants should be added here rather than scattered throughout the code.
//! None of these are correctness contracts: every kernel produces the same
//! result whichever way a threshold tips.

// ============================================================================
// PARALLELISM CONSTANTS
// ============================================================================

/// Amount of work (entries or flops) that justifies one more thread
pub const DEFAULT_CHUNK: f64 = 64.0 * 1024.0;

/// Number of tasks created per thread when slicing work
pub const NTASKS_PER_THREAD: usize = 32;

// ============================================================================
// SPARSITY SWITCHES
// ============================================================================

/// A matrix becomes hypersparse when fewer than this fraction of its
/// vectors are non-empty
pub const HYPER_SWITCH_DEFAULT: f64 = 1.0 / 16.0;

/// A sparse matrix becomes bitmap when its density exceeds this fraction
pub const BITMAP_SWITCH_DEFAULT: f64 = 0.5;

/// Dot-product output is built as a bitmap only when it has at most this
/// many cells
pub const DOT_BITMAP_MAX_CELLS: usize = 1 << 26;

// ============================================================================
// MULTIPLY METHOD SELECTION
// ============================================================================

/// A masked dot product is preferred when `nnz(M) * ratio` is below the
/// estimated saxpy flop count
pub const DOT_SAXPY_RATIO: f64 = 4.0;

/// A saxpy vector whose flop count is at most this uses the sort-based
/// accumulator instead of the dense gather workspace
pub const SORT_ACCUMULATOR_THRESHOLD: usize = 256;

/// Initial capacity hint for sort-based accumulators
pub const DEFAULT_SORT_ACCUMULATOR_SIZE: usize = 256;

// ============================================================================
// MEMORY CONSTANTS
// ============================================================================

/// Cache line size in bytes; dense workspaces are aligned to it
pub const DEFAULT_CACHE_LINE_SIZE: usize = 64;

// ============================================================================
// DISPLAY AND DEBUG CONSTANTS
// ============================================================================

/// Maximum vectors to print in debug display
pub const MAX_DISPLAY_VECTORS: usize = 5;

/// Maximum entries per vector in debug display
pub const MAX_DISPLAY_ENTRIES_PER_VECTOR: usize = 5;

/// Tracing target used for algorithm-choice diagnostics
pub const BURBLE_TARGET: &str = "semiblas::burble";
