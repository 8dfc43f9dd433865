mod action;
mod oid;
mod repo;
mod token;

pub use action::Action;
pub use oid::Oid;
pub use repo::canonical_repo_name;
pub use token::{PrivilegeMap, Token};
