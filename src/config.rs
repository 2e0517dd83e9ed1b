//! Process-wide configuration
//!
//! The library reads one [`GrbConfig`] held behind a lock. It is initialized
//! at most once, explicitly with [`init`] or lazily with defaults on first
//! read, and is read-mostly afterwards. Operations take a snapshot (or a
//! [`Context`]) at the start of a call so a concurrent setter never changes
//! a call halfway through.

use std::sync::OnceLock;

use parking_lot::RwLock;

use crate::constants::{
    BITMAP_SWITCH_DEFAULT, DEFAULT_CACHE_LINE_SIZE, DEFAULT_CHUNK, DOT_SAXPY_RATIO,
    HYPER_SWITCH_DEFAULT,
};
use crate::error::{GrbError, Result};
use crate::parallel::Context;

/// System parameters for performance tuning
#[derive(Debug, Clone)]
pub struct SystemParameters {
    /// Maximum number of threads a single call may use
    pub n_threads: usize,
    /// Amount of work per additional thread
    pub chunk: f64,
    /// Size of cache line in bytes
    pub cache_line_size: usize,
}

impl Default for SystemParameters {
    fn default() -> Self {
        Self {
            n_threads: num_cpus::get(), // Use all available cores
            chunk: DEFAULT_CHUNK,
            cache_line_size: DEFAULT_CACHE_LINE_SIZE,
        }
    }
}

/// When deferred work is finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Every mutating call leaves the matrix without pending work
    Blocking,
    /// Pending tuples and zombies accumulate until a flush is required
    NonBlocking,
}

/// Matrix multiply algorithm family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxBMethod {
    /// Chosen per call from shapes, densities and the mask
    Default,
    /// Inner product, `C = A'*B`
    Dot,
    /// Outer product / Gustavson, `C = A*B`
    Saxpy,
}

/// Configuration for the engine
#[derive(Debug, Clone)]
pub struct GrbConfig {
    /// System parameters for performance tuning
    pub system_params: SystemParameters,

    /// Blocking or non-blocking execution
    pub mode: Mode,

    /// Default hypersparsity switch given to new matrices
    pub hyper_switch: f64,

    /// Default bitmap switch given to new matrices
    pub bitmap_switch: f64,

    /// Orientation of new matrices: by column if true, by row otherwise
    pub is_csc_default: bool,

    /// Multiply method used when a call does not ask for one
    pub axb_method: AxBMethod,

    /// Weight of the mask size against saxpy flops when choosing dot3
    pub dot_saxpy_ratio: f64,

    /// Emit algorithm-choice diagnostics
    pub burble: bool,
}

impl Default for GrbConfig {
    fn default() -> Self {
        Self {
            system_params: SystemParameters::default(),
            mode: Mode::NonBlocking,
            hyper_switch: HYPER_SWITCH_DEFAULT,
            bitmap_switch: BITMAP_SWITCH_DEFAULT,
            is_csc_default: false,
            axb_method: AxBMethod::Default,
            dot_saxpy_ratio: DOT_SAXPY_RATIO,
            burble: false,
        }
    }
}

impl GrbConfig {
    /// Per-call parallel context derived from this configuration
    pub fn context(&self) -> Context {
        Context::new(self.system_params.n_threads, self.system_params.chunk)
    }

    fn validate(&self) -> Result<()> {
        if self.system_params.n_threads == 0 {
            return Err(GrbError::InvalidValue("n_threads must be at least 1".into()));
        }
        if !(self.system_params.chunk > 0.0) {
            return Err(GrbError::InvalidValue("chunk must be positive".into()));
        }
        if !(self.bitmap_switch >= 0.0 && self.bitmap_switch <= 1.0) {
            return Err(GrbError::InvalidValue(format!(
                "bitmap_switch {} outside [0, 1]",
                self.bitmap_switch
            )));
        }
        if !(self.hyper_switch >= 0.0) {
            return Err(GrbError::InvalidValue(format!(
                "hyper_switch {} must be non-negative",
                self.hyper_switch
            )));
        }
        Ok(())
    }
}

static CONFIG: OnceLock<RwLock<GrbConfig>> = OnceLock::new();

fn cell() -> &'static RwLock<GrbConfig> {
    CONFIG.get_or_init(|| RwLock::new(GrbConfig::default()))
}

/// Initialize the library with `config`
///
/// Fails with [`GrbError::AlreadyInitialized`] if a configuration is already
/// installed, including one created lazily by an earlier read.
pub fn init(config: GrbConfig) -> Result<()> {
    config.validate()?;
    CONFIG
        .set(RwLock::new(config))
        .map_err(|_| GrbError::AlreadyInitialized)
}

/// Snapshot of the current configuration
pub fn global() -> GrbConfig {
    cell().read().clone()
}

/// Parallel context for one call
pub fn context() -> Context {
    cell().read().context()
}

pub fn set_nthreads(n_threads: usize) -> Result<()> {
    if n_threads == 0 {
        return Err(GrbError::InvalidValue("n_threads must be at least 1".into()));
    }
    cell().write().system_params.n_threads = n_threads;
    Ok(())
}

pub fn set_burble(burble: bool) {
    cell().write().burble = burble;
}

pub fn set_mode(mode: Mode) {
    cell().write().mode = mode;
}

pub fn set_hyper_switch(hyper_switch: f64) -> Result<()> {
    if !(hyper_switch >= 0.0) {
        return Err(GrbError::InvalidValue(format!(
            "hyper_switch {} must be non-negative",
            hyper_switch
        )));
    }
    cell().write().hyper_switch = hyper_switch;
    Ok(())
}

pub fn set_axb_method(method: AxBMethod) {
    cell().write().axb_method = method;
}

/// True if algorithm-choice diagnostics are enabled
pub(crate) fn burble_enabled() -> bool {
    cell().read().burble
}

/// Emit an algorithm-choice diagnostic when burble is on
macro_rules! burble {
    ($($arg:tt)*) => {
        if $crate::config::burble_enabled() {
            tracing::debug!(target: $crate::constants::BURBLE_TARGET, $($arg)*);
        }
    };
}
pub(crate) use burble;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = GrbConfig::default();
        assert_eq!(cfg.mode, Mode::NonBlocking);
        assert!(!cfg.is_csc_default);
        assert_eq!(cfg.axb_method, AxBMethod::Default);
        assert!(cfg.system_params.n_threads >= 1);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut cfg = GrbConfig::default();
        cfg.bitmap_switch = 1.5;
        assert!(matches!(cfg.validate(), Err(GrbError::InvalidValue(_))));

        let mut cfg = GrbConfig::default();
        cfg.system_params.n_threads = 0;
        assert!(cfg.validate().is_err());

        assert!(set_nthreads(0).is_err());
        assert!(set_hyper_switch(-1.0).is_err());
    }

    #[test]
    fn test_second_init_fails() {
        // the first read installs defaults, so any later init is rejected
        let _ = global();
        assert_eq!(init(GrbConfig::default()), Err(GrbError::AlreadyInitialized));
    }
}
