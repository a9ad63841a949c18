use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid ipn service number {0} for node number 0")]
    IpnInvalidServiceNumber(u64),

    #[error("ipn:0.0 is the null endpoint, dtn:none")]
    IpnNullEndpoint,

    #[error("dtn scheme node name is empty")]
    DtnNodeNameEmpty,

    #[error("dtn scheme demux contains characters that are not printable ASCII")]
    DtnInvalidDemux,

    #[error("Unsupported EID scheme {0}")]
    UnsupportedScheme(u64),

    #[error("EID scheme {0} cannot be carried opaquely")]
    OpaqueKnownScheme(u64),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Failed to parse {field}: {source}")]
    InvalidField {
        field: &'static str,
        source: Box<dyn core::error::Error + Send + Sync>,
    },

    #[error(transparent)]
    InvalidCBOR(#[from] dtnbp_cbor::decode::Error),
}

/// Attaches the name of the field being parsed to an error.
pub trait CaptureFieldErr<T> {
    fn map_field_err(self, field: &'static str) -> Result<T, Error>;
}

impl<T, E: Into<Box<dyn core::error::Error + Send + Sync>>> CaptureFieldErr<T> for Result<T, E> {
    fn map_field_err(self, field: &'static str) -> Result<T, Error> {
        self.map_err(|e| Error::InvalidField {
            field,
            source: e.into(),
        })
    }
}
