mod health_check;
mod submissions;
pub use health_check::health_check;
pub use submissions::*;

/// Walk the `source` chain of an error, so that `Debug` (what ends up in the
/// logs) shows every layer, not just the outermost message.
pub fn error_chain_fmt(
    e: &impl std::error::Error,
    f: &mut std::fmt::Formatter<'_>,
) -> std::fmt::Result {
    writeln!(f, "{}\n", e)?;
    let mut current = e.source();
    while let Some(cause) = current {
        writeln!(f, "Caused by:\n\t{}", cause)?;
        current = cause.source();
    }
    Ok(())
}
