//! Traits at the two seams of the pipeline: byte formats on disk and the
//! remote corpus the entries come from.

use std::{
    fs::File,
    io::{BufRead, BufReader, BufWriter, Cursor, Write},
    path::Path,
};

use async_trait::async_trait;

use crate::{
    error::Error,
    types::{RemoteEntry, SourceFile},
};

/// A trait for parsing and writing one local artifact (rendered `.ini`,
/// JSON snapshot) from/to one file.
///
/// # Example
///
/// ```rust,no_run
/// use inisync::traits::Parser;
/// let document = inisync::formats::IniDocument::read_from("global.ini")?;
/// document.write_to("global_copy.ini")?;
/// Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub trait Parser {
    /// Parse from any reader.
    fn from_reader<R: BufRead>(reader: R) -> Result<Self, Error>
    where
        Self: Sized;

    /// Parse from file path. A missing or unreadable file is reported as
    /// malformed local state, since later stages depend on it.
    fn read_from<P: AsRef<Path>>(path: P) -> Result<Self, Error>
    where
        Self: Sized,
    {
        let path = path.as_ref();
        let file =
            File::open(path).map_err(|e| Error::malformed_local_state(path, e.to_string()))?;
        let reader = BufReader::new(file);
        Self::from_reader(reader).map_err(|e| match e {
            Error::Parse(inner) => Error::malformed_local_state(path, inner.to_string()),
            other => other,
        })
    }

    /// Write to any writer (file, memory, etc.).
    fn to_writer<W: Write>(&self, writer: W) -> Result<(), Error>;

    /// Write to file path.
    fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        self.to_writer(&mut writer)?;
        writer.flush().map_err(Error::Io)
    }

    /// Parse from a string.
    fn from_str(s: &str) -> Result<Self, Error>
    where
        Self: Sized,
    {
        Self::from_reader(Cursor::new(s))
    }

    /// Parse from bytes.
    fn from_bytes(bytes: &[u8]) -> Result<Self, Error>
    where
        Self: Sized,
    {
        Self::from_reader(Cursor::new(bytes))
    }
}

/// Read access to the remote translation corpus.
///
/// Implementations own their credential; callers never look it up.
/// Every failure must surface as [`Error::RemoteFetch`].
#[async_trait]
pub trait CorpusReader: Send + Sync {
    /// Lists every file of the project.
    async fn list_files(&self) -> Result<Vec<SourceFile>, Error>;

    /// Fetches all entries of one file.
    async fn get_entries(&self, file_id: i64) -> Result<Vec<RemoteEntry>, Error>;
}
