use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::net::{Shutdown, TcpStream};

use super::{Closeable, CloseableStrategy};
use crate::resolve::{Shape, Shaped, Shapes};
use crate::resource::Managed;

impl Closeable for File {
    type Error = io::Error;

    /// Flushes file contents and metadata to disk before the handle drops.
    ///
    /// Handles that cannot be synced (special files, and read-only handles
    /// on some platforms) have nothing to flush and close cleanly.
    fn close(self) -> io::Result<()> {
        match self.sync_all() {
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::InvalidInput | io::ErrorKind::PermissionDenied
                ) =>
            {
                Ok(())
            }
            other => other,
        }
    }
}

crate::managed!(File: Closeable);

impl Closeable for TcpStream {
    type Error = io::Error;

    fn close(self) -> io::Result<()> {
        match self.shutdown(Shutdown::Both) {
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            other => other,
        }
    }
}

crate::managed!(TcpStream: Closeable);

impl<W: Write> Closeable for BufWriter<W> {
    type Error = io::Error;

    fn close(self) -> io::Result<()> {
        self.into_inner()
            .map(drop)
            .map_err(io::IntoInnerError::into_error)
    }

    /// Drops buffered output without writing it.
    fn abandon(self) -> io::Result<()> {
        let (_inner, _unwritten) = self.into_parts();
        Ok(())
    }
}

impl<W: Write> Shaped for BufWriter<W> {
    const SHAPES: Shapes = Shapes::EMPTY.with(Shape::Closeable);
}

impl<W: Write> Managed for BufWriter<W> {
    type Strategy = CloseableStrategy;
    const SHAPE: Shape = Shape::Closeable;
}
