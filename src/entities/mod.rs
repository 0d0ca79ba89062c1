pub mod commerce;
pub mod session;
pub mod user;

pub use user::UserRole;
