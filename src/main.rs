//! Command line entry point: loads the configuration, checks the token, then
//! exports the selected folders into `<destination>/quip-export`, or into
//! `<destination>/quip-export.zip` with `--zip`.

mod error;

use crate::error::{ErrorKind, Result};
use clap::Parser;
use exn::ResultExt;
use quipx_api::{Gateway, ReqwestTransport};
use quipx_config::{Config, ExportFormat, Overrides};
use quipx_export::assets::STYLESHEET;
use quipx_export::{Builtins, ExportOptions, ExportSummary, Exporter, LogObserver, StorageSaver};
use quipx_storage::BackendHandle;
use quipx_storage::backend::{LocalBackend, ZipBackend};
use std::fs::{File, create_dir_all};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Name of the log file written when `--log-file` is set.
const LOG_FILE_NAME: &str = "export.log";

/// Export folders and documents from a Quip account
#[derive(Debug, Parser)]
#[command(name = "quipx", version, about, long_about = None)]
struct Cli {
    /// Personal access token
    #[arg(short, long)]
    token: Option<String>,

    /// Directory that receives the `quip-export` folder
    #[arg(short, long)]
    destination: Option<PathBuf>,

    /// Inline the stylesheet in every document
    #[arg(long)]
    embedded_styles: bool,

    /// Inline images as data URIs
    #[arg(long)]
    embedded_images: bool,

    /// Append comments to exported documents
    #[arg(long)]
    comments: bool,

    /// Export documents as .docx and spreadsheets as .xlsx
    #[arg(long, conflicts_with = "pdf")]
    docx: bool,

    /// Export threads as .pdf
    #[arg(long)]
    pdf: bool,

    /// Leave links between documents untouched
    #[arg(long)]
    no_references: bool,

    /// Include group folders in the default folder set
    #[arg(long)]
    group_folders: bool,

    /// Comma separated root folder ids
    #[arg(long, value_delimiter = ',')]
    folders: Option<Vec<String>>,

    /// Skip export paths matching this regular expression
    #[arg(long)]
    exclude: Option<String>,

    /// Write a single quip-export.zip instead of a directory
    #[arg(short, long)]
    zip: bool,

    /// Only write index.html listing folders and documents
    #[arg(long)]
    only_index: bool,

    /// Debug logging
    #[arg(long)]
    debug: bool,

    /// Also write the log to export.log in the export directory, or next to the archive
    #[arg(long)]
    log_file: bool,

    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl Cli {
    /// Flags that weren't passed stay unset so lower configuration layers apply.
    fn overrides(&self) -> Overrides {
        let format = if self.docx {
            Some(ExportFormat::Native)
        } else if self.pdf {
            Some(ExportFormat::Pdf)
        } else {
            None
        };
        Overrides {
            token: self.token.clone(),
            destination: self.destination.clone(),
            embedded_styles: self.embedded_styles.then_some(true),
            embedded_images: self.embedded_images.then_some(true),
            comments: self.comments.then_some(true),
            format,
            references: self.no_references.then_some(false),
            group_folders: self.group_folders.then_some(true),
            folders: self.folders.clone(),
            exclude: self.exclude.clone(),
            zip: self.zip.then_some(true),
            only_index: self.only_index.then_some(true),
            debug: self.debug.then_some(true),
            log_file: self.log_file.then_some(true),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = match quipx_config::load(cli.config.as_deref(), &cli.overrides()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("quipx: {err:?}");
            return ExitCode::from(2);
        },
    };
    if let Err(err) = init_logging(&config) {
        eprintln!("quipx: {err:?}");
        return ExitCode::from(2);
    }

    match run(&config).await {
        Ok(summary) => {
            tracing::debug!(?summary, "Done");
            ExitCode::SUCCESS
        },
        Err(err) => {
            tracing::error!("{err:?}");
            ExitCode::FAILURE
        },
    }
}

fn init_logging(config: &Config) -> Result<()> {
    let level = if config.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("quipx={level},quipx_api={level},quipx_export={level},quipx_storage={level}"))
    });
    let file_layer = if config.log_file {
        let dir = config.log_dir();
        create_dir_all(&dir).or_raise(|| ErrorKind::Logging)?;
        let file = File::create(dir.join(LOG_FILE_NAME)).or_raise(|| ErrorKind::Logging)?;
        Some(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(Arc::new(file)))
    } else {
        None
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(file_layer)
        .try_init()
        .or_raise(|| ErrorKind::Logging)
}

async fn run(config: &Config) -> Result<ExportSummary> {
    let transport = ReqwestTransport::new().or_raise(|| ErrorKind::Client)?;
    let gateway = Gateway::new(Arc::new(transport), config.token()).with_base_url(&config.api_url);
    if !gateway.check_user().await {
        exn::bail!(ErrorKind::Unauthorized);
    }

    let backend = open_backend(config)?;
    let options = export_options(config)?;
    if options.stylesheet.is_none() {
        let css = Builtins::stylesheet().or_raise(|| ErrorKind::Setup)?;
        backend.write(Path::new(STYLESHEET), css.as_bytes()).await.or_raise(|| ErrorKind::Storage)?;
    }

    let exporter = Exporter::new(Arc::new(gateway), Arc::new(StorageSaver::new(backend.clone())), options)
        .or_raise(|| ErrorKind::Setup)?
        .with_observer(Arc::new(LogObserver));
    let exported = exporter.start_export(config.root_folders()).await.or_raise(|| ErrorKind::Export);
    // Finished whatever the outcome.
    let finished = backend.finish().await.or_raise(|| ErrorKind::Storage);
    let summary = exported?;
    finished?;
    let files = backend.list(None).await.or_raise(|| ErrorKind::Storage)?;
    tracing::info!(target = backend.name(), files = files.len(), "Export written");
    Ok(summary)
}

fn open_backend(config: &Config) -> Result<BackendHandle> {
    let backend: BackendHandle = if config.zip {
        let path = config.archive_path();
        tracing::info!(destination = %path.display(), "Exporting");
        Arc::new(ZipBackend::new("zip", &path).or_raise(|| ErrorKind::Storage)?)
    } else {
        let dir = config.export_dir();
        tracing::info!(destination = %dir.display(), "Exporting");
        Arc::new(LocalBackend::new("local", &dir).or_raise(|| ErrorKind::Storage)?)
    };
    Ok(backend)
}

fn export_options(config: &Config) -> Result<ExportOptions> {
    let mut options = ExportOptions::builtin().or_raise(|| ErrorKind::Setup)?;
    if config.embedded_styles {
        options.stylesheet = Some(Builtins::stylesheet().or_raise(|| ErrorKind::Setup)?);
    }
    options.embed_images = config.embedded_images;
    options.comments = config.comments;
    options.format = config.format;
    options.references = config.references;
    options.group_folders = config.group_folders;
    options.site_host = config.site_host.clone();
    options.only_index = config.only_index;
    match &config.exclude {
        Some(pattern) => options.with_exclude(pattern).or_raise(|| ErrorKind::Setup),
        None => Ok(options),
    }
}
