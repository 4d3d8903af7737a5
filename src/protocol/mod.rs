//! Wire protocol for the control socket.
//!
//! Requests are one line each: fields joined with a NUL byte, terminated by
//! `\n`. The first field names the command, the rest are its arguments.
//! Responses are a `"{status:03} {length} {message}\n"` header followed by
//! exactly `length` body bytes.

pub mod request;
pub mod response;

pub use request::Request;
pub use response::Response;
