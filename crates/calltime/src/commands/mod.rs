pub mod list;
pub mod query;
pub mod resolve;
pub mod top;
