//! sigil: generic signatures, substitution maps and pack expansion for a
//! Swift-like compiler frontend.
//!
//! The work happens in the member crates; this crate re-exports them and
//! wires up logging for binaries and tests.

pub use sigil_generics as generics;
pub use sigil_identity as identity;

pub use sigil_generics::{
    CanGenericSignature, ContextBuilder, ExistentialLayout, GenericContext, GenericSignature,
    ProtocolConformanceRef, Requirement, SubstOptions, SubstitutionMap, TypeId,
};

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::time::FormatTime;

/// A timer that writes nothing, keeping compact output free of timestamps.
struct NoTimestamp;

impl FormatTime for NoTimestamp {
    fn format_time(
        &self,
        _w: &mut tracing_subscriber::fmt::format::Writer<'_>,
    ) -> std::fmt::Result {
        Ok(())
    }
}

/// Install a stderr subscriber when `SIGIL_LOG` holds a filter.
///
/// `SIGIL_LOG_STYLE=full` adds timestamps and span open/close events.
/// Calling this more than once, or after another subscriber was installed,
/// does nothing.
pub fn init_tracing() {
    let Ok(filter) = EnvFilter::try_from_env("SIGIL_LOG") else {
        return;
    };
    let style = std::env::var("SIGIL_LOG_STYLE").unwrap_or_default();
    let installed = if style == "full" {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_level(true)
            .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
            .with_writer(std::io::stderr)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_level(true)
            .with_timer(NoTimestamp)
            .with_writer(std::io::stderr)
            .try_init()
    };
    if installed.is_ok() {
        tracing::debug!("tracing initialized");
    }
}
