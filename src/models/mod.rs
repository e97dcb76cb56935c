pub mod connection;
pub mod organization;
pub mod sync;
pub mod user;

pub use connection::*;
pub use organization::*;
pub use sync::*;
pub use user::*;
