use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("couldn't set up logging")]
    Logging,
    #[display("couldn't create the HTTP client")]
    Client,
    #[display("token is wrong or expired")]
    Unauthorized,
    #[display("couldn't write the export")]
    Storage,
    #[display("couldn't prepare the export")]
    Setup,
    #[display("export aborted")]
    Export,
}
