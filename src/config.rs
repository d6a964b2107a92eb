//! Runtime configuration
//!
//! Settings that pick a device and shape operator defaults. Built in code with
//! the `with_*` methods, or read from the environment:
//!
//! | Variable | Meaning |
//! |---|---|
//! | `DENSOLVE_DEVICE` | device ordinal (default 0) |
//! | `DENSOLVE_MEMORY_LIMIT` | reference-device byte limit, `k`/`m`/`g` suffixes allowed |
//! | `DENSOLVE_CHOLESKY_TRIANGLE` | `lower` (default) or `upper` |

use crate::error::{Error, Result};
use crate::runtime::cpu::CpuDevice;
use crate::solver::Triangle;

/// Environment variable selecting the device ordinal
pub const ENV_DEVICE: &str = "DENSOLVE_DEVICE";
/// Environment variable limiting reference-device memory
pub const ENV_MEMORY_LIMIT: &str = "DENSOLVE_MEMORY_LIMIT";
/// Environment variable choosing the default Cholesky factor
pub const ENV_CHOLESKY_TRIANGLE: &str = "DENSOLVE_CHOLESKY_TRIANGLE";

/// Device and operator defaults
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinalgConfig {
    /// GPU ordinal for the CUDA backend
    pub device_index: usize,
    /// Byte limit for the reference device; `None` means unlimited
    pub memory_limit: Option<usize>,
    /// Factor returned by Cholesky operators built with `from_config`
    pub cholesky_triangle: Triangle,
}

impl Default for LinalgConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            memory_limit: None,
            cholesky_triangle: Triangle::Lower,
        }
    }
}

impl LinalgConfig {
    /// Set the device ordinal
    pub fn with_device(mut self, index: usize) -> Self {
        self.device_index = index;
        self
    }

    /// Cap reference-device memory at `bytes`
    pub fn with_memory_limit(mut self, bytes: usize) -> Self {
        self.memory_limit = Some(bytes);
        self
    }

    /// Default Cholesky factor
    pub fn with_cholesky_triangle(mut self, triangle: Triangle) -> Self {
        self.cholesky_triangle = triangle;
        self
    }

    /// Read the configuration from the process environment
    ///
    /// Unset variables keep their defaults; malformed ones are an error.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_DEVICE) {
            config.device_index = raw.trim().parse().map_err(|_| Error::Config {
                key: ENV_DEVICE,
                reason: format!("expected a device ordinal, got '{raw}'"),
            })?;
        }

        if let Some(raw) = lookup(ENV_MEMORY_LIMIT) {
            config.memory_limit = Some(parse_bytes(&raw).ok_or_else(|| Error::Config {
                key: ENV_MEMORY_LIMIT,
                reason: format!("expected a byte count like 512m, got '{raw}'"),
            })?);
        }

        if let Some(raw) = lookup(ENV_CHOLESKY_TRIANGLE) {
            config.cholesky_triangle = match raw.trim().to_ascii_lowercase().as_str() {
                "lower" | "l" => Triangle::Lower,
                "upper" | "u" => Triangle::Upper,
                _ => {
                    return Err(Error::Config {
                        key: ENV_CHOLESKY_TRIANGLE,
                        reason: format!("expected 'lower' or 'upper', got '{raw}'"),
                    });
                }
            };
        }

        log::debug!("loaded {config:?}");
        Ok(config)
    }

    /// Reference device honoring `memory_limit`
    pub fn cpu_device(&self) -> CpuDevice {
        match self.memory_limit {
            Some(limit) => CpuDevice::with_memory_limit(limit),
            None => CpuDevice::new(),
        }
    }

    /// CUDA device for `device_index`
    #[cfg(feature = "cuda")]
    pub fn cuda_device(&self) -> crate::runtime::cuda::CudaDevice {
        crate::runtime::cuda::CudaDevice::new(self.device_index)
    }
}

/// `"4096"`, `"64k"`, `"512M"`, `"2g"` (binary multiples)
fn parse_bytes(raw: &str) -> Option<usize> {
    let s = raw.trim().to_ascii_lowercase();
    let (digits, shift) = match s.as_bytes().last()? {
        b'k' => (&s[..s.len() - 1], 10),
        b'm' => (&s[..s.len() - 1], 20),
        b'g' => (&s[..s.len() - 1], 30),
        _ => (s.as_str(), 0),
    };
    let value: usize = digits.trim().parse().ok()?;
    value.checked_mul(1usize << shift)
}
