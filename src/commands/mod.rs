// ABOUTME: Command module aggregator for the slotswap CLI.
// ABOUTME: Re-exports switch and status command handlers.

mod runtime_connection;
mod status;
mod switch;

pub use status::status;
pub use switch::switch;
