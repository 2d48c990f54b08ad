pub mod attendance;
pub mod backup;
pub mod core;
pub mod nlp;
pub mod reports;
pub mod students;
