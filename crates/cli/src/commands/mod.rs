//! CLI command implementations.

pub mod migrate;
pub mod order;
pub mod quote;
pub mod seed;

use serde::Serialize;

/// Print a value as pretty JSON on stdout.
fn print_json<T: Serialize>(value: &T) -> Result<(), serde_json::Error> {
    let json = serde_json::to_string_pretty(value)?;
    #[allow(clippy::print_stdout)]
    {
        println!("{json}");
    }
    Ok(())
}
