pub mod connection;
pub mod media_sync;
pub mod odk_sync;
pub mod organization;

pub use connection::ConnectionService;
pub use media_sync::{MediaSyncService, OrganizationSync};
pub use odk_sync::OdkSyncService;
pub use organization::OrganizationService;
