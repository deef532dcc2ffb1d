//! Resumable runs.

pub mod journal;

pub use journal::{replay, usable_records, JournalRecord, Replay, ResumeSet, RunJournal};
