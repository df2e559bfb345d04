pub mod error;
pub mod periods;
pub mod session;
pub mod table;
pub mod upload;

pub use error::IngestError;
pub use session::IngestSession;
