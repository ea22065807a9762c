//! CLI commands

mod completions;
mod doctor;
mod fetch;
mod init;
mod list;
mod prune;
mod run;
mod targets;
mod validate;

pub use completions::CompletionsCommand;
pub use doctor::DoctorCommand;
pub use fetch::FetchCommand;
pub use init::InitCommand;
pub use list::ListCommand;
pub use prune::PruneCommand;
pub use run::RunCommand;
pub use targets::TargetsCommand;
pub use validate::ValidateCommand;
