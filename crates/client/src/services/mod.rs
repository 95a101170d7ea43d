pub mod auth;
pub mod notes;
pub mod profile;

pub use auth::AuthService;
pub use notes::NotesService;
pub use profile::ProfileService;
