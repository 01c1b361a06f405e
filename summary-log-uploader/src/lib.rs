pub mod appender;
pub mod cmd;
pub mod config;
pub mod context;
pub mod error;
pub mod parse;
pub mod query;
pub mod run;
pub mod source;
pub mod store;
pub mod table;
