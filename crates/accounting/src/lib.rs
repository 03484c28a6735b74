//! Accounting module (double-entry journal, event-sourced).
//!
//! Pure domain logic only: no IO, no HTTP, no persistence concerns.

pub mod account;
pub mod journal;

pub use account::{Account, AccountType, NormalBalance};
pub use journal::{
    EntryPosted, EntryReference, Journal, JournalCommand, JournalEntry, JournalEvent, JournalLine,
    PostEntry, ReferenceKind,
};
