use crate::error::IngestError;
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

const READ_BUFFER_SIZE: usize = 256 * 1024;

/// Lazily decompresses a gzip dataset and yields one line at a time.
///
/// Only the current line is held in memory. A decompression failure is yielded
/// once as [`IngestError::CorruptDataset`] and ends the iteration; lines already
/// handed out stay valid.
pub struct DatasetReader {
    path: PathBuf,
    reader: BufReader<MultiGzDecoder<File>>,
    buf: Vec<u8>,
    failed: bool,
}

impl DatasetReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, IngestError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| IngestError::io(&path, e))?;
        let reader = BufReader::with_capacity(READ_BUFFER_SIZE, MultiGzDecoder::new(file));

        Ok(Self {
            path,
            reader,
            buf: Vec::with_capacity(512),
            failed: false,
        })
    }
}

impl Iterator for DatasetReader {
    type Item = Result<String, IngestError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => None,
            Ok(_) => {
                if self.buf.last() == Some(&b'\n') {
                    self.buf.pop();
                }
                if self.buf.last() == Some(&b'\r') {
                    self.buf.pop();
                }
                Some(Ok(String::from_utf8_lossy(&self.buf).into_owned()))
            }
            Err(source) => {
                self.failed = true;
                Some(Err(IngestError::CorruptDataset {
                    path: self.path.clone(),
                    source,
                }))
            }
        }
    }
}
