//! Local filesystem access owned by the backend
//!
//! - [`inventory`] enumerates the target directory
//! - [`mutate`] renames and deletes single files

pub mod inventory;
pub mod mutate;

pub use inventory::{InventoryError, list_files, list_files_or_empty};
pub use mutate::{MutationError, delete_file, rename_destination, rename_file};
