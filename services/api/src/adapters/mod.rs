pub mod blob;
pub mod db;
pub mod oauth;

pub use blob::S3BlobStore;
pub use db::DbAdapter;
pub use oauth::GoogleIdentityProvider;
