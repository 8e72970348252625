//! Result-to-metric transformation.
//!
//! - `decode`: raw cell → transport value (LSN decoding)
//! - `sanitize`: label list → metric path segments
//! - `transducer`: tabular result → observations
//! - `filter`: null and exclusion filtering

pub mod decode;
pub mod filter;
pub mod sanitize;
pub mod transducer;

pub use decode::decode_value;
pub use filter::MetricFilter;
pub use sanitize::{sanitize_labels, sanitize_segment, sanitize_segment_strict};
pub use transducer::{ResultShape, classify, transduce};
