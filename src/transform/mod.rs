//! Config-driven rewrites applied to messages in flight
//!
//! Every operation takes a message by value and returns the rewritten one.

pub mod descriptor;
pub mod rules;

pub use descriptor::{ConfigFile, DEFAULT_HEADER_NAME, DescriptorSource, TransformDescriptor};
pub use rules::{
    BLOCKED_BODY, build_blocked_response, inject_header, is_blocked, prepare_request, redact,
};
