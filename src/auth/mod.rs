mod oracle;
mod password;
mod token_store;

pub use oracle::{AccessOracle, GitoliteOracle, StaticOracle};
pub use password::{generate_password, passwords_match};
pub use token_store::TokenStore;
