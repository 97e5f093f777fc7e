//! CDN access: transport abstraction, resource paths and the retrying,
//! decrypting downloader.

mod downloader;
mod http;
mod paths;
mod transport;

pub use downloader::{DownloadError, RetryingDownloader};
pub use http::ReqwestTransport;
pub use paths::{manifest_path, sticker_path};
pub use transport::{CdnTransport, TransportError};
