mod column;
mod eof;
mod err;
mod ok;
mod row;

pub use column::{column_type, ColumnDefinition};
pub use eof::encode_eof;
pub use err::{encode_err, encode_err_from};
pub use ok::encode_ok;
pub use row::{encode_row_text, encode_row_null_bitmap_header};
