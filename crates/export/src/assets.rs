//! Builtin templates and stylesheet, embedded at compile time with
//! [`rust-embed`](rust_embed).

use crate::error::{ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use rust_embed::Embed;
use std::borrow::Cow;

pub const DOCUMENT_TEMPLATE: &str = "document.html";
pub const COMMENTS_TEMPLATE: &str = "comments.html";
pub const INDEX_TEMPLATE: &str = "index.html";
pub const STYLESHEET: &str = "document.css";

#[derive(Embed)]
#[folder = "../../assets/"]
pub struct Builtins;
impl Builtins {
    pub fn load(name: impl AsRef<str>) -> Result<Cow<'static, [u8]>> {
        Self::get(name.as_ref()).map(|f| f.data).ok_or_raise(|| ErrorKind::AssetNotFound(name.as_ref().to_string()))
    }

    /// Loads a text asset.
    pub fn load_str(name: impl AsRef<str>) -> Result<String> {
        let data = Self::load(name.as_ref())?;
        String::from_utf8(data.into_owned()).or_raise(|| ErrorKind::AssetNotFound(name.as_ref().to_string()))
    }

    pub fn stylesheet() -> Result<String> {
        Self::load_str(STYLESHEET)
    }
}
