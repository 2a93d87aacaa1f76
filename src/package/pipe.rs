//! Bounded in-memory byte pipe between a package producer and its consumer
//!
//! The writer half accumulates bytes into fixed-size chunks and sends them
//! over a bounded channel, so a slow consumer throttles the producer once the
//! window is full. The stream only ends cleanly when the writer calls
//! [`PipeWriter::finish`]; any other way of ending the producer (an explicit
//! [`PipeCloser::abort`], dropping the writer, a panic) reaches the reader as
//! an error.

use crossbeam_channel::{bounded, Receiver, Sender};
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Size of a single chunk sent through the pipe
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Default window of buffered bytes between producer and consumer
pub const DEFAULT_CAPACITY: usize = 1024 * 1024;

enum Frame {
    Data(Vec<u8>),
    Failed(io::ErrorKind, String),
    End,
}

struct Shared {
    sender: Sender<Frame>,
    closed: AtomicBool,
}

impl Shared {
    /// Deliver a terminal frame once; later calls are ignored
    fn terminate(&self, frame: Frame) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            // A disconnected reader no longer cares how the stream ended
            let _ = self.sender.send(frame);
        }
    }
}

/// Create a pipe buffering up to `capacity` bytes
pub fn pipe(capacity: usize) -> (PipeWriter, PipeReader) {
    let frames = (capacity / CHUNK_SIZE).max(1);
    let (sender, receiver) = bounded(frames);
    let shared = Arc::new(Shared {
        sender,
        closed: AtomicBool::new(false),
    });
    (
        PipeWriter {
            shared,
            buffer: Vec::with_capacity(CHUNK_SIZE),
        },
        PipeReader {
            receiver,
            current: Vec::new(),
            position: 0,
            state: ReaderState::Open,
        },
    )
}

/// Producer half of the pipe
pub struct PipeWriter {
    shared: Arc<Shared>,
    buffer: Vec<u8>,
}

impl PipeWriter {
    /// Handle able to fail the stream while the writer is owned elsewhere
    pub fn closer(&self) -> PipeCloser {
        PipeCloser {
            shared: Arc::clone(&self.shared),
        }
    }

    fn send_buffer(&mut self) -> io::Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let chunk = std::mem::replace(&mut self.buffer, Vec::with_capacity(CHUNK_SIZE));
        self.shared
            .sender
            .send(Frame::Data(chunk))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "package reader went away"))
    }

    fn ensure_open(&self) -> io::Result<()> {
        if self.shared.closed.load(Ordering::SeqCst) {
            Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "package stream already closed",
            ))
        } else {
            Ok(())
        }
    }

    /// Flush buffered bytes and end the stream successfully
    pub fn finish(mut self) -> io::Result<()> {
        self.ensure_open()?;
        self.send_buffer()?;
        self.shared.terminate(Frame::End);
        Ok(())
    }
}

impl Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.ensure_open()?;
        let room = CHUNK_SIZE - self.buffer.len();
        let n = room.min(buf.len());
        self.buffer.extend_from_slice(&buf[..n]);
        if self.buffer.len() == CHUNK_SIZE {
            self.send_buffer()?;
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.ensure_open()?;
        self.send_buffer()
    }
}

impl Drop for PipeWriter {
    fn drop(&mut self) {
        self.shared.terminate(Frame::Failed(
            io::ErrorKind::UnexpectedEof,
            "package producer stopped before completing the stream".to_string(),
        ));
    }
}

/// Fails the stream from outside the writer
#[derive(Clone)]
pub struct PipeCloser {
    shared: Arc<Shared>,
}

impl PipeCloser {
    /// End the stream with `error`; subsequent writes fail immediately
    pub fn abort(&self, error: &dyn std::error::Error) {
        self.shared
            .terminate(Frame::Failed(io::ErrorKind::Other, error.to_string()));
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }
}

enum ReaderState {
    Open,
    Finished,
    Failed(io::ErrorKind, String),
}

/// Consumer half of the pipe
pub struct PipeReader {
    receiver: Receiver<Frame>,
    current: Vec<u8>,
    position: usize,
    state: ReaderState,
}

impl Read for PipeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            if self.position < self.current.len() {
                let n = (self.current.len() - self.position).min(buf.len());
                buf[..n].copy_from_slice(&self.current[self.position..self.position + n]);
                self.position += n;
                return Ok(n);
            }

            match &self.state {
                ReaderState::Finished => return Ok(0),
                ReaderState::Failed(kind, message) => {
                    return Err(io::Error::new(*kind, message.clone()))
                }
                ReaderState::Open => {}
            }

            match self.receiver.recv() {
                Ok(Frame::Data(chunk)) => {
                    self.current = chunk;
                    self.position = 0;
                }
                Ok(Frame::End) => self.state = ReaderState::Finished,
                Ok(Frame::Failed(kind, message)) => self.state = ReaderState::Failed(kind, message),
                Err(_) => {
                    self.state = ReaderState::Failed(
                        io::ErrorKind::UnexpectedEof,
                        "package stream ended without completing".to_string(),
                    )
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_bytes_arrive_in_order() {
        let (mut writer, mut reader) = pipe(DEFAULT_CAPACITY);
        let data: Vec<u8> = (0..300_000u32).map(|i| (i % 251) as u8).collect();
        let expected = data.clone();

        let producer = thread::spawn(move || {
            writer.write_all(&data).unwrap();
            writer.finish().unwrap();
        });

        let mut received = Vec::new();
        reader.read_to_end(&mut received).unwrap();
        producer.join().unwrap();
        assert_eq!(received, expected);
    }

    #[test]
    fn test_abort_surfaces_as_read_error() {
        let (mut writer, mut reader) = pipe(DEFAULT_CAPACITY);
        let closer = writer.closer();

        writer.write_all(b"partial").unwrap();
        writer.flush().unwrap();
        let failure = io::Error::new(io::ErrorKind::Other, "disk on fire");
        closer.abort(&failure);

        let mut received = Vec::new();
        let err = reader.read_to_end(&mut received).unwrap_err();
        assert!(err.to_string().contains("disk on fire"));
        assert_eq!(received, b"partial");

        // Writes after an abort fail instead of blocking
        assert!(writer.write(b"more").is_err());
    }

    #[test]
    fn test_dropped_writer_is_an_error() {
        let (writer, mut reader) = pipe(DEFAULT_CAPACITY);
        drop(writer);

        let mut received = Vec::new();
        let err = reader.read_to_end(&mut received).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_slow_consumer_applies_backpressure() {
        let (mut writer, mut reader) = pipe(2 * CHUNK_SIZE);
        let written = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let progress = Arc::clone(&written);

        let producer = thread::spawn(move || {
            let chunk = vec![1u8; CHUNK_SIZE];
            for _ in 0..8 {
                writer.write_all(&chunk).unwrap();
                progress.fetch_add(CHUNK_SIZE, Ordering::SeqCst);
            }
            writer.finish().unwrap();
        });

        thread::sleep(Duration::from_millis(200));
        // Two frames fit in the channel and one more blocks inside send
        assert!(written.load(Ordering::SeqCst) <= 3 * CHUNK_SIZE);

        let mut received = Vec::new();
        reader.read_to_end(&mut received).unwrap();
        producer.join().unwrap();
        assert_eq!(received.len(), 8 * CHUNK_SIZE);
    }

    #[test]
    fn test_dropped_reader_breaks_the_writer() {
        let (mut writer, reader) = pipe(CHUNK_SIZE);
        drop(reader);
        let result = writer.write_all(&vec![0u8; 4 * CHUNK_SIZE]);
        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::BrokenPipe);
    }
}
