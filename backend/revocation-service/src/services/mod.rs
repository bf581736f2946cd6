pub mod revocation;

pub use revocation::RevocationService;
