//! Logging setup
//!
//! Thin wrapper over `log` + `env_logger`.
//!
//! ```rust,ignore
//! use compiler::logging;
//!
//! logging::init();                                  // Warn
//! logging::init_from_env();                         // RUST_LOG, default warn
//! logging::init_with_level(log::LevelFilter::Debug);
//! ```
//!
//! Levels used across the crate:
//!
//! - `info!` - run-level progress (call sites read, classes generated, files written)
//! - `debug!` - one line per adapter class or bridge method
//! - `trace!` - individual instructions as they are emitted
//!
//! Module filters work as usual:
//!
//! ```bash
//! RUST_LOG=compiler::adapter=debug shadowgen generate sites.json --out-dir out
//! RUST_LOG=compiler::classfile=trace shadowgen generate sites.json --bundle out.adapters
//! ```

use env_logger::{Builder, Env};
use log::LevelFilter;
use std::io::Write;
use std::sync::Once;

static INIT: Once = Once::new();

/// Warn level. Only the first `init*` call in a process has any effect.
pub fn init() {
    init_with_level(LevelFilter::Warn);
}

pub fn init_with_level(level: LevelFilter) {
    INIT.call_once(|| {
        let mut builder = Builder::new();
        builder.filter_level(level);
        install(builder);
    });
}

/// Filter from `RUST_LOG`, falling back to `warn`.
pub fn init_from_env() {
    INIT.call_once(|| {
        install(Builder::from_env(Env::default().default_filter_or("warn")));
    });
}

fn install(mut builder: Builder) {
    builder
        .format(|buf, record| {
            writeln!(
                buf,
                "[{:5}] {} - {}",
                record.level(),
                record.module_path().unwrap_or("shadowgen"),
                record.args()
            )
        })
        .init();
}

/// Map the number of `-v` flags to a level: none keeps the default,
/// one is info, two debug, three or more trace.
pub fn level_for_verbosity(verbose: u8) -> Option<LevelFilter> {
    match verbose {
        0 => None,
        1 => Some(LevelFilter::Info),
        2 => Some(LevelFilter::Debug),
        _ => Some(LevelFilter::Trace),
    }
}

/// Test logger: captured by the harness, never panics on re-init.
///
/// ```rust,ignore
/// #[test]
/// fn test_something() {
///     compiler::logging::init_test();
/// }
/// ```
pub fn init_test() {
    let _ = env_logger::builder()
        .filter_level(LevelFilter::Warn)
        .parse_env(Env::default())
        .is_test(true)
        .try_init();
}

/// Whether one of the `init*` functions (other than `init_test`) ran.
pub fn is_initialized() -> bool {
    INIT.is_completed()
}
