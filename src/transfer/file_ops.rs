//! Module `file_ops`
//!
//! Byte pumps between data channels and local sources/sinks, with progress
//! reporting. Every handle opened here is owned by the calling operation and
//! closed when it goes out of scope, on success and on every error path.

use std::io::{self, Cursor};
use std::path::{Path, PathBuf};

use log::{debug, error, info};
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::client::events::{ClientEvent, EventBus, TransferAction, TransferProgress};
use crate::error::FtpError;

/// Where the bytes of an upload come from.
pub enum PutSource {
    /// In-memory contents.
    Bytes(Vec<u8>),
    /// A local file, opened when the upload starts.
    Path(PathBuf),
    /// An already open byte stream, read until EOF.
    Reader(Box<dyn AsyncRead + Send + Unpin>),
}

impl From<Vec<u8>> for PutSource {
    fn from(bytes: Vec<u8>) -> Self {
        PutSource::Bytes(bytes)
    }
}

impl From<&[u8]> for PutSource {
    fn from(bytes: &[u8]) -> Self {
        PutSource::Bytes(bytes.to_vec())
    }
}

impl From<PathBuf> for PutSource {
    fn from(path: PathBuf) -> Self {
        PutSource::Path(path)
    }
}

impl From<&Path> for PutSource {
    fn from(path: &Path) -> Self {
        PutSource::Path(path.to_path_buf())
    }
}

/// An upload source ready to be pumped.
pub(crate) struct OpenSource {
    pub(crate) reader: Box<dyn AsyncRead + Send + Unpin>,
    pub(crate) total_bytes: u64,
    pub(crate) label: PathBuf,
}

impl PutSource {
    /// Opens the source. Local files are checked for existence first.
    pub(crate) async fn open(self) -> Result<OpenSource, FtpError> {
        match self {
            PutSource::Bytes(bytes) => Ok(OpenSource {
                total_bytes: bytes.len() as u64,
                reader: Box::new(Cursor::new(bytes)),
                label: PathBuf::from("<buffer>"),
            }),
            PutSource::Path(path) => {
                let exists = tokio::fs::try_exists(&path)
                    .await
                    .map_err(|e| FtpError::local_io(&path, e))?;
                if !exists {
                    return Err(FtpError::local_io(
                        &path,
                        io::Error::new(io::ErrorKind::NotFound, "Local file doesn't exist."),
                    ));
                }
                let file = File::open(&path)
                    .await
                    .map_err(|e| FtpError::local_io(&path, e))?;
                let total_bytes = file.metadata().await.map(|m| m.len()).unwrap_or(0);
                Ok(OpenSource {
                    reader: Box::new(file),
                    total_bytes,
                    label: path,
                })
            }
            PutSource::Reader(reader) => Ok(OpenSource {
                reader,
                total_bytes: 0,
                label: PathBuf::from("<stream>"),
            }),
        }
    }
}

/// Which side of a pump failed.
#[derive(Debug)]
pub(crate) enum PumpError {
    Read(io::Error),
    Write(io::Error),
}

/// Publishes progress events for one transfer.
pub(crate) struct ProgressReporter {
    events: EventBus,
    progress: TransferProgress,
}

impl ProgressReporter {
    pub(crate) fn new(
        events: EventBus,
        filename: &str,
        action: TransferAction,
        total_bytes: u64,
    ) -> Self {
        Self {
            events,
            progress: TransferProgress {
                filename: filename.to_string(),
                action,
                total_bytes,
                transferred_bytes: 0,
            },
        }
    }

    fn advance(&mut self, n: usize) {
        self.progress.transferred_bytes += n as u64;
        self.events
            .emit(ClientEvent::TransferProgress(self.progress.clone()));
    }
}

/// Copies everything from `reader` into `writer` and flushes the writer.
///
/// Returns the number of bytes moved.
pub(crate) async fn pump<R, W>(
    reader: &mut R,
    writer: &mut W,
    buffer_size: usize,
    progress: &mut ProgressReporter,
) -> Result<u64, PumpError>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut buffer = vec![0u8; buffer_size.max(1)];
    let mut total = 0u64;

    loop {
        let n = reader.read(&mut buffer).await.map_err(PumpError::Read)?;
        if n == 0 {
            break;
        }
        writer
            .write_all(&buffer[..n])
            .await
            .map_err(PumpError::Write)?;
        total += n as u64;
        progress.advance(n);
    }

    writer.flush().await.map_err(PumpError::Write)?;
    debug!("Pumped {} bytes", total);
    Ok(total)
}

/// Streams a data channel into a newly created local file.
pub(crate) async fn download_to_file<R>(
    data: &mut R,
    destination: &Path,
    buffer_size: usize,
    progress: &mut ProgressReporter,
) -> Result<u64, FtpError>
where
    R: AsyncRead + Unpin,
{
    let mut file = File::create(destination).await.map_err(|e| {
        error!("Failed to create {}: {}", destination.display(), e);
        FtpError::local_io(destination, e)
    })?;

    let total = match pump(data, &mut file, buffer_size, progress).await {
        Ok(total) => total,
        Err(PumpError::Read(e)) => return Err(e.into()),
        Err(PumpError::Write(e)) => return Err(FtpError::local_io(destination, e)),
    };

    file.sync_all()
        .await
        .map_err(|e| FtpError::local_io(destination, e))?;
    info!(
        "Download completed: {} ({} bytes)",
        destination.display(),
        total
    );
    Ok(total)
}

/// Streams an upload source into a data channel, then half-closes the
/// channel so the server sees the end of the file.
pub(crate) async fn upload<W>(
    source: &mut OpenSource,
    data: &mut W,
    buffer_size: usize,
    progress: &mut ProgressReporter,
) -> Result<u64, FtpError>
where
    W: AsyncWrite + Unpin,
{
    let total = match pump(&mut *source.reader, data, buffer_size, progress).await {
        Ok(total) => total,
        Err(PumpError::Read(e)) => return Err(FtpError::local_io(&source.label, e)),
        Err(PumpError::Write(e)) => return Err(e.into()),
    };
    data.shutdown().await?;
    info!(
        "Upload completed: {} ({} bytes)",
        source.label.display(),
        total
    );
    Ok(total)
}
