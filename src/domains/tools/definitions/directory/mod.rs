//! Directory tools.

mod entry;
mod search;

pub use entry::{SearchDirectoryEntryParams, SearchDirectoryEntryTool};
pub use search::{SearchDirectoryParams, SearchDirectoryTool};
