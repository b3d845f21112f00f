//! Merge Engine & Change Tracking
//!
//! - `merge`: precedence fold of source snapshots, zero values as silence
//! - `changes`: field diff against the primary source, [`ChangeSet`]
//! - `manager`: [`ConfigurationManager`] tying both to write-back

mod changes;
mod manager;
mod merge;

pub use changes::{ChangeSet, FieldChange, changes, primary_snapshot};
pub use manager::{ConfigurationManager, ConfigurationManagerBuilder};
pub use merge::{merge, overlay, resolve_snapshot};
