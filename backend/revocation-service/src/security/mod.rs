pub mod claims;

pub use claims::{parse_unverified, ParsedToken, TokenParseError};
