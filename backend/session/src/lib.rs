//! `veil-session`: one page instance of Veil.
//!
//! Ties the picker, rule store, application engine and settings together
//! behind [`Session`], and reports outcomes as [`Notice`]s.

pub mod notice;
pub mod session;

pub use notice::{Notice, NoticeLevel};
pub use session::{
    Backup, CommitOutcome, ImportOutcome, PreviewToggle, Session, SessionOptions,
};
