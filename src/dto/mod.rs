//! Wire-level data: response envelopes, record mapping, scalar coercions and
//! form validation.

/// `{status, message, data}` response decoding.
pub mod envelope;
pub mod parse;
pub mod records;
pub mod validation;
