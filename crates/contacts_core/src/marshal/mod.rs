//! Positional binary protocol for records, record lists and queries.
//!
//! # Responsibility
//! - Encode values across the IPC boundary with exact round-trip fidelity.
//!
//! # Invariants
//! - The buffer carries no field tags: fields are read in exactly the order
//!   they were written, which is the view's descriptor order.
//! - NULL and empty strings are distinct on the wire.
//! - Any failure aborts the whole value; partial results are never returned.

mod buffer;
mod query;
mod record;

pub use buffer::{MarshalReader, MarshalWriter};
pub use query::{marshal_query, unmarshal_query};
pub use record::{
    marshal_list, marshal_record, record_from_bytes, record_to_bytes, unmarshal_list,
    unmarshal_record, MAX_NESTING,
};
