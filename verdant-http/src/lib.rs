//! HTTP layer of the Verdant client.
//!
//! [`Transport`] is the seam between the typed [`ApiClient`] endpoints and
//! the network: [`HttpTransport`] talks to the real API over `reqwest`, test
//! doubles implement the same trait.

mod api;
mod http_transport;
mod transport;
mod upload;

pub use api::ApiClient;
pub use http_transport::HttpTransport;
pub use reqwest::Method;
pub use transport::{
    ApiRequest, ApiResponse, CredentialProvider, StaticCredentials, Transport, TransportFuture,
};
pub use upload::{HostedImageUploader, ImageFile, ImageUploader, UploadFuture};

pub mod prelude {
    //! Re-exports of the most commonly used HTTP types.
    pub use crate::{ApiClient, HttpTransport, ImageFile, ImageUploader, Transport};
}
