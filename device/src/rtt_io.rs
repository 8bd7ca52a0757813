//! RTT channels wrapped as embedded-io-async streams

use embedded_io_async::{ErrorType, Read, Write};
use rtt_target::{DownChannel, UpChannel};

/// Error type for RTT I/O operations
#[derive(Debug, Clone, Copy)]
pub struct RttError;

impl embedded_io_async::Error for RttError {
    fn kind(&self) -> embedded_io_async::ErrorKind {
        embedded_io_async::ErrorKind::Other
    }
}

/// Host -> device stream. Reads never wait; 0 means nothing pending.
pub struct RttReader {
    down: &'static mut DownChannel,
}

impl RttReader {
    pub fn new(down: &'static mut DownChannel) -> Self {
        Self { down }
    }
}

impl ErrorType for RttReader {
    type Error = RttError;
}

impl Read for RttReader {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        Ok(self.down.read(buf))
    }
}

/// Device -> host stream
pub struct RttWriter {
    up: &'static mut UpChannel,
}

impl RttWriter {
    pub fn new(up: &'static mut UpChannel) -> Self {
        Self { up }
    }
}

impl ErrorType for RttWriter {
    type Error = RttError;
}

impl Write for RttWriter {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        // NoBlockSkip: a frame that does not fit is dropped whole
        let written = self.up.write(buf);
        if written == 0 && !buf.is_empty() {
            return Err(RttError);
        }
        Ok(written)
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
