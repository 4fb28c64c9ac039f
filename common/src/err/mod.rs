mod decode_error;

pub use decode_error::{Needed, ReError};

pub type CResult<T> = Result<T, ReError>;
