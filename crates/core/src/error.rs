use thiserror::Error;

use crate::model::{ClientSettingsError, ParseIdError, UnknownTab};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    ParseId(#[from] ParseIdError),
    #[error(transparent)]
    Tab(#[from] UnknownTab),
    #[error(transparent)]
    Settings(#[from] ClientSettingsError),
}
