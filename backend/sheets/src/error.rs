use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SheetsError {
    #[error("Credential file not found: {}", .0.display())]
    CredentialMissing(PathBuf),

    #[error("Spreadsheet service unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid range: {0}")]
    InvalidRange(String),

    #[error("Unexpected response from spreadsheet service: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for SheetsError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SheetsError::Decode(err.to_string())
        } else {
            SheetsError::Unavailable(err.to_string())
        }
    }
}
