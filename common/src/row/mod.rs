mod table_info;
mod value;

pub use table_info::{ColumnInfo, ForeignKeyRef, TableInfo, VectorTypeInfo};
pub use value::{Row, Value};
