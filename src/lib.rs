pub mod cdn;
pub mod cli;
pub mod cloudfront;
pub mod config;
pub mod deploy;
pub mod keys;
pub mod load_config;
pub mod reconcile;
pub mod s3;
pub mod store;
pub mod upload;

pub use cdn::{Cdn, CdnError};
pub use config::DeployConfig;
pub use deploy::{deploy, deploy_with, DeployError, DeployReport};
pub use store::{ObjectStore, StoreError};

#[cfg(any(test, feature = "test-export-mocks"))]
pub use cdn::MockCdn;
#[cfg(any(test, feature = "test-export-mocks"))]
pub use store::MockObjectStore;
