// ABOUTME: Edge config route blocks: brace-aware parsing, rewriting and file storage.
// ABOUTME: Internal logic works on RouteTable; raw text only at the file boundary.

mod canonical;
mod error;
mod parse;
mod store;
mod table;

pub use canonical::CanonicalBlock;
pub use error::RouteError;
pub use parse::{EdgeConfigText, RouteBlock, Segment, brace_delta, header_names_domain};
pub use store::ConfigStore;
pub use table::RouteTable;
