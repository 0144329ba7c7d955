mod data_type;
mod record;
mod schema;
mod value;

pub use data_type::DataType;
pub use record::{read_record_from_buffer, write_record_to_buffer, Record};
pub use schema::{Column, Schema, SchemaBuilder};
pub use value::{Date, Value};
