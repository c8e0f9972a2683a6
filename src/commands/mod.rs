pub mod check;
pub mod classify;
pub mod edit;
pub mod explore;
pub mod list;
pub mod report;
