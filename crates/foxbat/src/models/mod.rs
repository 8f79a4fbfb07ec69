//! Domain models shared by the backend and the UI side

mod file;
mod outcome;
mod remote;

pub use file::{FileRecord, FileStat};
pub use outcome::{MutationOutcome, PreviewResult, RenameOutcome};
pub use remote::RemoteFileRecord;
