// Frameworks layer: configuration, course loading and runtime bootstrap.

pub mod config;
pub mod course_files;
pub mod server;
