// Adapters layer: concrete implementations for external systems
// (filesystem, http, s3, sftp, postgres, secrets, notifications).

pub mod archive;
pub mod database;
pub mod notify;
pub mod secrets;
pub mod sources;
pub mod staging;
