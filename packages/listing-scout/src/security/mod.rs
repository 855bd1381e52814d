pub mod credentials;

pub use credentials::{check_key, CredentialIssue, ModelCredentials, SecretString};
