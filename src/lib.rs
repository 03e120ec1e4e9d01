// Halo Muon Selection - calorimeter halo-muon selection and calibration
// Multi-pass event selection with worker-parallel accumulation and
// file-backed tables between passes

// Module declarations
pub mod analysis;
pub mod calibration;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod error;
pub mod fixtures;
pub mod geometry;
pub mod histogram;
pub mod merge;
pub mod runner;
pub mod store;

#[cfg(any(test, feature = "test_support"))]
pub mod testing;

// Re-exports for convenience
pub use config::AppConfig;
pub use context::{PassInputs, SelectionContext, WorkerOutput};
pub use merge::{PassReport, PassSummary};
pub use runner::run_pass;
pub use store::PassStore;

use once_cell::sync::OnceCell;
use tracing::Level;

static LOGGING: OnceCell<()> = OnceCell::new();

/// Install the stderr tracing subscriber once per process
///
/// `verbosity` 0 logs warnings, 1 info, 2 debug, anything higher trace.
/// Later calls are no-ops, as is a call after another subscriber was set.
pub fn init_logging(verbosity: u8) {
    LOGGING.get_or_init(|| {
        let level = match verbosity {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        };
        let _ = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_writer(std::io::stderr)
            .try_init();
    });
}
