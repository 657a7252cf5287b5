// Output helpers: ranked table and diagnostic JSON dumps

pub mod table_out;
