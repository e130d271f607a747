//! Records of training metrics.
//!
//! A [`Record`] is a map from keys to [`RecordValue`]s. Path collectors and the trainer
//! return records, which the [`Algorithm`](crate::algorithm::Algorithm) merges into one
//! record per epoch and hands to a [`Recorder`].
//!
//! ```rust
//! use reprel_core::record::{Record, RecordValue};
//!
//! let mut record = Record::from_scalar("exploration/returns_mean", 12.5);
//! record.insert("exploration/epsilon", RecordValue::Scalar(0.1));
//! record.insert("operators", RecordValue::String("get_mail,get_coffee".to_string()));
//! assert_eq!(record.get_scalar("exploration/epsilon").unwrap(), 0.1);
//! ```
mod base;
mod buffered_recorder;
mod null_recorder;
mod recorder;
mod storage;

pub use base::{Record, RecordValue};
pub use buffered_recorder::BufferedRecorder;
pub use null_recorder::NullRecorder;
pub use recorder::Recorder;
pub use storage::RecordStorage;
