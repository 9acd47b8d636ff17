mod schema;
mod writer;

pub use schema::{SCHEMA_VERSION, create_tables, get_meta, set_meta};
pub use writer::{
    CallEntry, SortKey, Storage, query_drain_count, query_duration_ms, query_top_calls,
    query_top_calls_since,
};
