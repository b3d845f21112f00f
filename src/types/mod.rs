pub mod error;
pub mod record;

pub use error::{
    ConversionError, ErrorKind, Result, ResultExt, SmartConfError, SourceError, SourceFailure,
};
pub use record::{Record, display_value, from_record, to_record};
