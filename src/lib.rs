//! Read-only access to Compound File Binary (OLE2) containers.
//!
//! ```no_run
//! use ole_reader::Ole;
//!
//! let ole = Ole::from_path("document.doc")?;
//! for entry in ole.walk() {
//!     println!("{}", entry);
//! }
//! let word = ole.open_stream("WordDocument")?;
//! # Ok::<(), ole_reader::OleError>(())
//! ```

pub mod chain;
pub mod common;
pub mod difat;
pub mod directory;
pub mod fat;
pub mod header;
pub mod mini_fat;
pub mod ole;
pub mod tree;

#[cfg(test)]
mod test_support;

pub use common::{ErrorKind, OleError, OleResult, SectorType};
pub use directory::{Clsid, Color, ObjectType};
pub use header::Header;
pub use ole::{EntryRef, Ole};
pub use tree::{DirectoryTree, Node, NodeKind, Sid};
