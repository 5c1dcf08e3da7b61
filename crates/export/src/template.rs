//! Document wrapping with [upon] templates.
//!
//! Rendered threads are wrapped in a user-replaceable document template. The
//! template syntax follows upon's conventions (`{{ variable }}`,
//! `{% if value %}`), extended with two formatters:
//!
//! - **`escape`**: HTML-escapes a string.
//! - **`raw`**: writes a string untouched, for markup such as `body`.
//!
//! # Template Variables
//!
//! | Variable          | Type             | Description                                   |
//! |-------------------|------------------|-----------------------------------------------|
//! | `title`           | `String`         | Thread title                                  |
//! | `body`            | `String`         | Rewritten thread markup                       |
//! | `comments`        | `Option<String>` | Rendered comments block, if any               |
//! | `stylesheet`      | `Option<String>` | Inline CSS when styles are embedded           |
//! | `stylesheet_path` | `String`         | Relative path to the shared `document.css`    |
//!
//! Comments use a separate builtin template that iterates `comments`, each
//! with `id`, `author`, `created`, `html` and a `files` list of `name`/`href`.
//! The index-only listing has its own builtin template too, iterating `items`
//! with `title`, `href`, `folder` and `indent`.

use crate::assets::{Builtins, COMMENTS_TEMPLATE, DOCUMENT_TEMPLATE, INDEX_TEMPLATE};
use crate::error::{Error, ErrorKind, Result};
use crate::naming::escape_html;
use exn::ResultExt;
use quipx_api::models::Message;
use serde::Serialize;
use std::str::FromStr;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use upon::{Engine, Template};

/// Values exposed to the document template.
#[derive(Debug, Serialize)]
pub struct DocumentContext<'a> {
    pub title: &'a str,
    pub body: &'a str,
    pub comments: Option<&'a str>,
    pub stylesheet: Option<&'a str>,
    pub stylesheet_path: &'a str,
}

/// Values exposed to the listing template.
#[derive(Debug, Serialize)]
pub struct ListingContext<'a> {
    pub title: &'a str,
    pub stylesheet: Option<&'a str>,
    pub stylesheet_path: &'a str,
    pub items: Vec<ListingItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingItem {
    pub title: String,
    pub href: String,
    pub folder: bool,
    /// Nesting depth, in em.
    pub indent: usize,
}

#[derive(Serialize)]
struct CommentsContext<'a> {
    comments: Vec<CommentContext<'a>>,
}

#[derive(Serialize)]
struct CommentContext<'a> {
    id: &'a str,
    author: &'a str,
    created: String,
    html: String,
    files: Vec<FileContext>,
}

#[derive(Serialize)]
struct FileContext {
    name: String,
    href: String,
}

/// A compiled document template, plus the builtin comments template.
///
/// Constructed via [`FromStr`], which compiles eagerly so syntax errors
/// surface before the export starts.
pub struct DocumentTemplate {
    engine: Engine<'static>,
    document: Template<'static>,
    comments: Template<'static>,
    listing: Template<'static>,
}
impl FromStr for DocumentTemplate {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut engine = Engine::new();
        addons::configure(&mut engine);
        let document = engine.compile(s.to_string()).or_raise(|| ErrorKind::Template)?;
        let comments = engine.compile(Builtins::load_str(COMMENTS_TEMPLATE)?).or_raise(|| ErrorKind::Template)?;
        let listing = engine.compile(Builtins::load_str(INDEX_TEMPLATE)?).or_raise(|| ErrorKind::Template)?;
        Ok(Self { engine, document, comments, listing })
    }
}
impl DocumentTemplate {
    /// The template shipped with the binary.
    pub fn builtin() -> Result<Self> {
        Builtins::load_str(DOCUMENT_TEMPLATE)?.parse()
    }

    pub fn render(&self, context: &DocumentContext<'_>) -> Result<String> {
        self.document.render(&self.engine, context).to_string().or_raise(|| ErrorKind::Template)
    }

    pub fn render_listing(&self, context: &ListingContext<'_>) -> Result<String> {
        self.listing.render(&self.engine, context).to_string().or_raise(|| ErrorKind::Template)
    }

    /// Renders `messages`, in the given order, into a comments block.
    ///
    /// Attached files become `/blob/{thread}/{hash}?name=…` links so the block
    /// can go through the same blob rewriting as the document body.
    pub fn render_comments(&self, thread_id: &str, messages: &[Message]) -> Result<String> {
        let comments = messages
            .iter()
            .map(|message| CommentContext {
                id: &message.id,
                author: &message.author_name,
                created: format_usec(message.created_usec),
                html: message_html(message),
                files: message
                    .files
                    .iter()
                    .map(|file| FileContext {
                        name: file.name.clone(),
                        href: format!("/blob/{thread_id}/{}?name={}", file.hash, urlencoding::encode(&file.name)),
                    })
                    .collect(),
            })
            .collect();
        self.comments.render(&self.engine, &CommentsContext { comments }).to_string().or_raise(|| ErrorKind::Template)
    }
}

fn message_html(message: &Message) -> String {
    if message.parts.is_empty() {
        return escape_html(&message.text).replace('\n', "<br>");
    }
    message.parts.iter().map(|(_, html)| html.as_str()).collect()
}

fn format_usec(usec: i64) -> String {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(usec) * 1_000)
        .ok()
        .and_then(|at| at.format(&Rfc3339).ok())
        .unwrap_or_default()
}

mod addons {
    use crate::naming::escape_html;
    use std::fmt::Write;
    use upon::{Engine, Value, fmt as upon_fmt};

    fn escape_formatter(f: &mut upon_fmt::Formatter<'_>, value: &Value) -> upon_fmt::Result {
        match value {
            Value::String(s) => write!(f, "{}", escape_html(s))?,
            v => upon_fmt::default(f, v)?,
        };
        Ok(())
    }

    fn raw_formatter(f: &mut upon_fmt::Formatter<'_>, value: &Value) -> upon_fmt::Result {
        match value {
            Value::String(s) => write!(f, "{s}")?,
            v => upon_fmt::default(f, v)?,
        };
        Ok(())
    }

    pub(crate) fn configure(engine: &mut Engine<'_>) {
        engine.add_formatter("escape", escape_formatter);
        engine.add_formatter("raw", raw_formatter);
    }
}
