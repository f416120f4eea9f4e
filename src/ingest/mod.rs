//! Request intake.
//!
//! - `inbox`: discovery and claiming of pending documents
//! - `document`: JSON documents with key-path access
//! - `dates`: tolerant date parsing
//! - `parser`: document → validated `Request`

pub mod dates;
pub mod document;
pub mod inbox;
pub mod parser;

pub use dates::{parse_date, InvalidDate};
pub use document::{DocumentError, RequestDocument};
pub use inbox::Inbox;
pub use parser::{RequestError, RequestParser};
