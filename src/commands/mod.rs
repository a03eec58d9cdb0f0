pub mod config;
pub mod doctor;
pub mod init;
pub mod install;
pub mod list;
pub mod mode;
pub mod sanitize;
pub mod uninstall;
