//! Buffered byte feeder over the solver's stdout pipe.
//!
//! The two decode protocols consume the stream differently: the legacy
//! decoder reads up to the solution separator, the JSON decoder reads lines.
//! [`ByteFeeder`] provides both on top of one retained buffer. A message
//! larger than the internal read size is accumulated across reads rather
//! than truncated, and an abrupt close of the pipe mid-message surfaces the
//! buffered remainder once as a final unterminated chunk instead of an
//! error.

use tokio::io::{AsyncRead, AsyncReadExt};

/// One chunk of solver output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Raw bytes, including the delimiter when `terminated`.
    pub bytes: Vec<u8>,
    /// Whether the requested delimiter was actually seen. `false` means the
    /// stream ended mid-message and this is the final partial chunk.
    pub terminated: bool,
}

/// Incremental reader with read-until-delimiter and read-line modes.
///
/// Reads are cancellation-safe: bytes are moved into the retained buffer
/// immediately after every successful pipe read, so a caller that abandons
/// a pending read (e.g. on deadline expiry) can still recover everything
/// received so far via [`ByteFeeder::drain_remaining`].
#[derive(Debug)]
pub struct ByteFeeder<R> {
    reader: R,
    buf: Vec<u8>,
    chunk_size: usize,
    eof: bool,
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

impl<R: AsyncRead + Unpin> ByteFeeder<R> {
    /// Creates a feeder reading at most `chunk_size` bytes per pipe read.
    pub fn new(reader: R, chunk_size: usize) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            chunk_size: chunk_size.max(1),
            eof: false,
        }
    }

    /// Reads until `delim` is seen (inclusive), or until end of stream.
    ///
    /// Returns `None` once the stream is exhausted and no buffered bytes
    /// remain. The unterminated remainder of a closed stream is returned
    /// exactly once.
    pub async fn read_until(&mut self, delim: &[u8]) -> std::io::Result<Option<Chunk>> {
        let mut search_from = 0usize;
        loop {
            if let Some(pos) = find(&self.buf[search_from..], delim) {
                let end = search_from + pos + delim.len();
                let bytes = self.buf.drain(..end).collect();
                return Ok(Some(Chunk {
                    bytes,
                    terminated: true,
                }));
            }
            if self.eof {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                let bytes = std::mem::take(&mut self.buf);
                return Ok(Some(Chunk {
                    bytes,
                    terminated: false,
                }));
            }
            // Re-scan only the tail that could straddle the read boundary.
            search_from = self.buf.len().saturating_sub(delim.len() - 1);
            let mut tmp = vec![0u8; self.chunk_size];
            let n = self.reader.read(&mut tmp).await?;
            if n == 0 {
                self.eof = true;
            } else {
                self.buf.extend_from_slice(&tmp[..n]);
            }
        }
    }

    /// Reads one line, newline inclusive.
    pub async fn read_line(&mut self) -> std::io::Result<Option<Chunk>> {
        self.read_until(b"\n").await
    }

    /// Takes everything left: the retained buffer plus whatever the stream
    /// still yields. Used to salvage output after the process was killed.
    pub async fn drain_remaining(&mut self) -> std::io::Result<Vec<u8>> {
        let mut out = std::mem::take(&mut self.buf);
        if !self.eof {
            self.reader.read_to_end(&mut out).await?;
            self.eof = true;
        }
        Ok(out)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ChunkedReader;
    use super::*;

    const SEP: &[u8] = b"----------\n";

    #[tokio::test]
    async fn test_read_until_single_chunk() {
        let reader = ChunkedReader::new([b"{\"x\":1}\n----------\n" as &[u8]]);
        let mut feeder = ByteFeeder::new(reader, 1024);

        let chunk = feeder.read_until(SEP).await.unwrap().unwrap();
        assert!(chunk.terminated);
        assert_eq!(chunk.bytes, b"{\"x\":1}\n----------\n");
        assert!(feeder.read_until(SEP).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delimiter_split_across_reads() {
        let reader = ChunkedReader::new([b"{\"x\":1}\n-----" as &[u8], b"-----\nrest"]);
        let mut feeder = ByteFeeder::new(reader, 1024);

        let chunk = feeder.read_until(SEP).await.unwrap().unwrap();
        assert!(chunk.terminated);
        assert_eq!(chunk.bytes, b"{\"x\":1}\n----------\n");

        let tail = feeder.read_until(SEP).await.unwrap().unwrap();
        assert!(!tail.terminated);
        assert_eq!(tail.bytes, b"rest");
    }

    #[tokio::test]
    async fn test_eof_mid_message_returns_partial_once() {
        let reader = ChunkedReader::new([b"=====UNSATISFIABLE=====\n" as &[u8]]);
        let mut feeder = ByteFeeder::new(reader, 1024);

        let chunk = feeder.read_until(SEP).await.unwrap().unwrap();
        assert!(!chunk.terminated);
        assert_eq!(chunk.bytes, b"=====UNSATISFIABLE=====\n");
        assert!(feeder.read_until(SEP).await.unwrap().is_none());
        assert!(feeder.read_until(SEP).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_message_larger_than_read_buffer() {
        // One long line, forced through a tiny read buffer: the partial
        // reads must be retained and concatenated.
        let reader = ChunkedReader::new([b"{\"xs\":[1,2,3,4,5,6,7,8,9,10]}\n" as &[u8]]);
        let mut feeder = ByteFeeder::new(reader, 4);

        let chunk = feeder.read_line().await.unwrap().unwrap();
        assert!(chunk.terminated);
        assert_eq!(chunk.bytes, b"{\"xs\":[1,2,3,4,5,6,7,8,9,10]}\n");
    }

    #[tokio::test]
    async fn test_read_line_sequence() {
        let reader = ChunkedReader::new([b"one\ntw" as &[u8], b"o\nthree"]);
        let mut feeder = ByteFeeder::new(reader, 1024);

        assert_eq!(feeder.read_line().await.unwrap().unwrap().bytes, b"one\n");
        assert_eq!(feeder.read_line().await.unwrap().unwrap().bytes, b"two\n");
        let last = feeder.read_line().await.unwrap().unwrap();
        assert!(!last.terminated);
        assert_eq!(last.bytes, b"three");
        assert!(feeder.read_line().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_drain_remaining_takes_buffer_and_stream() {
        let reader = ChunkedReader::new([b"abc\ndef" as &[u8], b"ghi"]);
        let mut feeder = ByteFeeder::new(reader, 1024);

        // Consume the first line; "def" stays in the retained buffer.
        assert_eq!(feeder.read_line().await.unwrap().unwrap().bytes, b"abc\n");
        let rest = feeder.drain_remaining().await.unwrap();
        assert_eq!(rest, b"defghi");
        assert!(feeder.read_line().await.unwrap().is_none());
    }
}
