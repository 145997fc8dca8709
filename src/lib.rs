pub mod artifacts;
pub mod commit;
pub mod config;
pub mod detect;
pub mod errors;
pub mod init;
pub mod logging;
pub mod orchestrator;
pub mod remedy_config;
pub mod repair;
pub mod report;
pub mod tracker;
pub mod ui;
pub mod util;
