//! Data acquisition: where transactions come from and how often we ask again
//!
//! - `source`: the fetch itself (HTTP service or JSON file)
//! - `controller`: Idle → Loading → {Ready, Retrying, Empty, Failed} with a bounded retry budget

pub mod controller;
pub mod source;

pub use controller::{AcquisitionController, AcquisitionState, RetryPolicy, Step, Ticket};
pub use source::{
    decode_payload, FetchError, FileTransactionSource, HttpTransactionSource, TransactionSource,
};
