//! Building blocks for platform skill services.
//!
//! [`reader::FilesReader`] turns an invocation event into file metadata and
//! content, [`writer::SkillsWriter`] turns results into metadata cards, and
//! [`server`] exposes a [`skill::Skill`] over HTTP.

pub mod api;
pub mod backoff;
pub mod cards;
pub mod config;
pub mod error;
pub mod event;
pub mod handler;
pub mod reader;
pub mod representation;
pub mod server;
pub mod skill;
pub mod thumbnail;
pub mod webhook;
pub mod writer;

pub use error::{ErrorCode, SkillsError};
pub use reader::FilesReader;
pub use skill::{Skill, SkillOutput};
pub use writer::{InvocationStatus, SkillsWriter, Usage, UsageUnit};
