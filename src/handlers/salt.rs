//! Handler for the `salt` command.

use crate::capacity::pseudonym::generate_salt;
use crate::error::Result;

/// Print a fresh salt suitable for `--salt` or `[anonymize] salt`.
pub fn handle_salt() -> Result<()> {
    println!("{}", generate_salt());
    Ok(())
}
