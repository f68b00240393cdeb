pub mod guitars;
mod pool;
pub mod queries;
pub mod schema;
pub mod shares;

pub use pool::*;
pub use schema::init_database;
