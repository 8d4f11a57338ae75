pub mod config;
pub mod consts;
pub mod cost;
pub mod driver;
pub mod engine;
pub mod history;
pub mod item;
pub mod notify;
pub mod oracle;
pub mod prompts;
pub mod store;
pub mod telemetry;
pub mod tools;
