//! Third-party source acquisition.
//!
//! Dependency archives are downloaded by [`remote`] and unpacked by
//! [`archive`] using whichever archive tools the host provides.

pub mod archive;
pub mod remote;

pub use archive::{unpack_all, ExtractorRegistry, UnpackError, UnpackOptions, UnpackOutcome};
pub use remote::{DownloadOptions, DownloadOutcome, FetchError, Fetcher, MetadataStore};
