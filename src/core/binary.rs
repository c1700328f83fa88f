//! Lazily read binary field values
//!
//! Binary columns are not copied into entity fields as plain values. The
//! mapper hands out a [`BinaryStream`] instead, which must be opened before
//! reading and is closed again when the caller is done with it.

use super::error::{DatabaseError, Result};
use std::io::{self, Read};
use std::sync::Arc;

/// Lifecycle state of a [`BinaryStream`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Closed,
    Open,
}

/// A byte stream over a binary column value
///
/// The underlying buffer is shared, so cloning a stream is cheap and each
/// clone keeps its own read position.
#[derive(Debug, Clone)]
pub struct BinaryStream {
    data: Arc<[u8]>,
    position: usize,
    state: StreamState,
}

impl BinaryStream {
    /// Wrap a column payload; the stream starts closed
    pub fn new(data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            data: data.into(),
            position: 0,
            state: StreamState::Closed,
        }
    }

    /// Open the stream for reading from the start
    pub fn open(&mut self) -> Result<()> {
        if self.state == StreamState::Open {
            return Err(DatabaseError::invalid_operation("binary stream is already open"));
        }
        self.position = 0;
        self.state = StreamState::Open;
        Ok(())
    }

    /// Close the stream; closing a closed stream is a no-op
    pub fn close(&mut self) {
        self.state = StreamState::Closed;
        self.position = 0;
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == StreamState::Open
    }

    /// Total payload size in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether every byte has been read since the stream was opened
    pub fn is_drained(&self) -> bool {
        self.position >= self.data.len()
    }

    /// Open the stream, hand it to `f`, and close it on every exit path
    pub fn with_open<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.open()?;
        let result = f(self);
        self.close();
        result
    }

    /// Read the whole payload in one scoped acquisition
    pub fn read_all(&mut self) -> Result<Vec<u8>> {
        self.with_open(|stream| {
            let mut buf = Vec::with_capacity(stream.len());
            stream.read_to_end(&mut buf)?;
            Ok(buf)
        })
    }
}

impl Read for BinaryStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.state != StreamState::Open {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                DatabaseError::invalid_operation("binary stream is closed"),
            ));
        }
        let remaining = &self.data[self.position..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.position += n;
        Ok(n)
    }
}

impl PartialEq for BinaryStream {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}
