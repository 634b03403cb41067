//! CLI commands implementation

pub mod experiment;
pub mod generate;
pub mod import;
pub mod init;
pub mod playbooks;
pub mod status;
pub mod track;
pub mod variants;

pub use experiment::*;
pub use generate::*;
pub use import::*;
pub use init::*;
pub use playbooks::*;
pub use status::*;
pub use track::*;
pub use variants::*;
