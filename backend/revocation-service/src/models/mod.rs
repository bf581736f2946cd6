pub mod token;

pub use token::{BlacklistStats, TokenRecord, TokenStatistics, TokenStatus, TokenType};
