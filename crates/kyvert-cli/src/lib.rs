//! # kyvert-cli — Policy Conversion Toolchain
//!
//! Subcommand handlers for the `kyvert` binary:
//!
//! - [`convert`]: translate a legacy policy file to a `ValidatingPolicy`
//!   document (stdout or `-o` file).
//! - [`check`]: compile a legacy policy and evaluate every rule's
//!   expression against a resource document, reporting pass/fail per rule.
//!
//! Handlers return `anyhow::Result<u8>`: the `u8` is the process exit
//! code for expected outcomes (conversion rejected, resource failed a
//! rule), while `Err` is reserved for environmental failures such as
//! unreadable files.

pub mod check;
pub mod convert;
