//! State module for tracking row resolution
//!
//! # Components
//!
//! - `RowState`: where a listing row stands in the resolution chain
//! - `DropReason`: why a row was discarded instead of stored
//! - `TipRecord`: the durable unit handed to the store
//! - `CommentId`: a prefixed reddit comment identifier (`t1_<id>`)

mod record;
mod row_state;

pub use record::{CommentId, TipRecord};
pub use row_state::{DropReason, RowState};
