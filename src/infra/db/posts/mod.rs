mod read;
mod types;
mod write;

pub(crate) use types::PostRow;

use super::PostgresRepositories;
