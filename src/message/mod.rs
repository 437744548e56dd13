//! IRC message parsing and formatting.

mod nom_parser;
mod serialize;
pub mod tags;
mod types;

pub use self::nom_parser::ParsedMessage;
pub use self::tags::Tags;
pub use self::types::Message;
