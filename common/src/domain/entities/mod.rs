pub mod cell_value;
pub mod record_point;
pub mod source_table;
