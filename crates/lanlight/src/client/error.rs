use std::io;

use thiserror::Error;

use crate::color::ColorError;
use crate::device::StateKey;
use crate::net::RequestError;
use crate::product::{CatalogError, Features};
use crate::protocol::{MacAddress, PayloadError};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("no device with address {0}")]
    UnknownDevice(MacAddress),
    #[error("device {mac} does not support {feature:?}")]
    Feature { mac: MacAddress, feature: Features },
    #[error("{0} cannot be watched")]
    NotWatchable(StateKey),
    #[error(transparent)]
    Payload(#[from] PayloadError),
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error("socket error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Color(#[from] ColorError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl ClientError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ClientError::Request(RequestError::Timeout { .. }))
    }

    /// The request left the encoder but no answer came back.
    pub fn is_unanswered(&self) -> bool {
        matches!(
            self,
            ClientError::Request(
                RequestError::Timeout { .. } | RequestError::Dropped | RequestError::Io(_)
            )
        )
    }
}
