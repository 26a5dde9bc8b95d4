//! Capability probe: is the native PDF engine usable in this environment?
//!
//! pdfium is a dynamic library that simply is not present on every host the
//! platform deploys to (slim containers, FIPS images, dev laptops). Rather
//! than making its absence a crash or a per-call error, the engine probes
//! once at startup and carries the answer around as a plain value:
//! every extraction call checks [`Capabilities::rendering_available`] and
//! degrades to an empty, successful-looking result when it is `false`.
//!
//! The probe result is cached process-wide in a [`OnceLock`] so repeated
//! construction of extractors neither re-binds the library nor re-logs the
//! outcome. [`Capabilities`] itself is `Copy` and injected into the
//! orchestrator explicitly — tests construct one directly instead of
//! depending on the host's pdfium install.

use pdfium_render::prelude::*;
use std::sync::OnceLock;
use tracing::{info, warn};

/// Environment variable pointing at an existing pdfium shared library file.
///
/// Checked before the working-directory and system-path fallbacks.
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

static PROBE_RESULT: OnceLock<bool> = OnceLock::new();

/// Process-wide feature availability, probed once and then read-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Whether the pdfium dynamic library bound successfully.
    ///
    /// When `false`, every extraction operation short-circuits to an empty
    /// result without touching the filesystem or any model endpoint.
    pub rendering_available: bool,
}

impl Capabilities {
    /// Probe the runtime environment for pdfium.
    ///
    /// The first call attempts a binding and logs the outcome once;
    /// subsequent calls return the cached answer.
    pub fn probe() -> Self {
        let available = *PROBE_RESULT.get_or_init(|| match bind_pdfium() {
            Ok(_) => {
                info!("pdfium bound successfully; PDF asset extraction is available");
                true
            }
            Err(e) => {
                warn!(
                    "pdfium could not be loaded ({e}); PDF asset extraction is disabled. \
                     Set {PDFIUM_LIB_PATH_ENV}=/path/to/libpdfium or install pdfium on \
                     the library search path."
                );
                false
            }
        });

        Self {
            rendering_available: available,
        }
    }

    /// A capabilities value with rendering enabled, bypassing the probe.
    ///
    /// For tests and for hosts that manage the pdfium lifecycle themselves.
    pub fn assume_available() -> Self {
        Self {
            rendering_available: true,
        }
    }

    /// A capabilities value with rendering disabled, bypassing the probe.
    pub fn unavailable() -> Self {
        Self {
            rendering_available: false,
        }
    }
}

/// Bind a fresh pdfium instance for one blocking pass.
///
/// Search order: `PDFIUM_LIB_PATH` env override → platform library name in
/// the working directory → system library paths. Each blocking pass binds
/// its own instance; documents opened from it stay on that pass's thread.
pub(crate) fn bind_pdfium() -> Result<Pdfium, PdfiumError> {
    if let Ok(explicit) = std::env::var(PDFIUM_LIB_PATH_ENV) {
        if !explicit.is_empty() {
            return Pdfium::bind_to_library(&explicit).map(Pdfium::new);
        }
    }

    Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| Pdfium::bind_to_system_library())
        .map(Pdfium::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_is_stable_across_calls() {
        // Whatever the host has installed, the cached answer never flips.
        let first = Capabilities::probe();
        let second = Capabilities::probe();
        assert_eq!(first, second);
    }

    #[test]
    fn injected_values_bypass_probe() {
        assert!(Capabilities::assume_available().rendering_available);
        assert!(!Capabilities::unavailable().rendering_available);
    }
}
