//! Frame transports between `IpcClient` and `IpcServer`.

use super::server::IpcServer;
use super::MAX_FRAME_BYTES;
use crate::error::{ContactsError, ContactsResult};

/// Carries one request frame to a server and returns its reply frame.
pub trait IpcTransport {
    fn call(&mut self, frame: &[u8]) -> ContactsResult<Vec<u8>>;
}

/// In-process transport that hands frames straight to a server.
pub struct LoopbackTransport {
    server: IpcServer,
}

impl LoopbackTransport {
    pub fn new(server: IpcServer) -> Self {
        Self { server }
    }

    pub fn server(&self) -> &IpcServer {
        &self.server
    }
}

impl IpcTransport for LoopbackTransport {
    fn call(&mut self, frame: &[u8]) -> ContactsResult<Vec<u8>> {
        Ok(self.server.handle_frame(frame))
    }
}

fn io_error(action: &str, err: std::io::Error) -> ContactsError {
    ContactsError::Ipc(format!("{action} failed: {err}"))
}

/// Reads one length-prefixed frame, prefix included.
///
/// Returns `Ok(None)` when the peer closed the stream between frames.
fn read_frame(stream: &mut impl std::io::Read) -> ContactsResult<Option<Vec<u8>>> {
    let mut prefix = [0_u8; 4];
    match stream.read_exact(&mut prefix) {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(io_error("frame read", err)),
    }
    let len = u32::from_le_bytes(prefix) as usize;
    if len > MAX_FRAME_BYTES {
        return Err(ContactsError::Ipc(format!(
            "incoming frame of {len} bytes exceeds limit {MAX_FRAME_BYTES}"
        )));
    }

    let mut frame = Vec::new();
    frame
        .try_reserve_exact(prefix.len() + len)
        .map_err(|_| ContactsError::OutOfMemory)?;
    frame.extend_from_slice(&prefix);
    frame.resize(prefix.len() + len, 0);
    stream
        .read_exact(&mut frame[prefix.len()..])
        .map_err(|err| io_error("frame read", err))?;
    Ok(Some(frame))
}

fn write_frame(stream: &mut impl std::io::Write, frame: &[u8]) -> ContactsResult<()> {
    stream
        .write_all(frame)
        .and_then(|()| stream.flush())
        .map_err(|err| io_error("frame write", err))
}

#[cfg(unix)]
mod unix {
    use super::{io_error, read_frame, write_frame, IpcTransport};
    use crate::error::{ContactsError, ContactsResult};
    use crate::ipc::server::IpcServer;
    use log::{info, warn};
    use std::os::unix::net::{UnixListener, UnixStream};
    use std::path::Path;

    /// Client transport over a unix domain socket.
    pub struct UnixSocketTransport {
        stream: UnixStream,
    }

    impl UnixSocketTransport {
        pub fn connect(path: impl AsRef<Path>) -> ContactsResult<Self> {
            let stream = UnixStream::connect(path).map_err(|err| io_error("connect", err))?;
            Ok(Self { stream })
        }

        pub fn from_stream(stream: UnixStream) -> Self {
            Self { stream }
        }
    }

    impl IpcTransport for UnixSocketTransport {
        fn call(&mut self, frame: &[u8]) -> ContactsResult<Vec<u8>> {
            write_frame(&mut self.stream, frame)?;
            read_frame(&mut self.stream)?
                .ok_or_else(|| ContactsError::Ipc("server closed the connection".to_string()))
        }
    }

    /// Serves request frames from one connection until the peer hangs up.
    pub fn serve_unix_stream(server: &IpcServer, mut stream: UnixStream) -> ContactsResult<()> {
        let mut calls = 0_u64;
        while let Some(frame) = read_frame(&mut stream)? {
            let reply = server.handle_frame(&frame);
            write_frame(&mut stream, &reply)?;
            calls += 1;
        }
        info!("event=ipc_session module=ipc status=ok calls={calls}");
        Ok(())
    }

    /// Accepts connections one after another and serves each to completion.
    ///
    /// A broken connection is logged and dropped; the listener keeps going.
    pub fn serve_unix_listener(server: &IpcServer, listener: &UnixListener) -> ContactsResult<()> {
        for stream in listener.incoming() {
            let stream = stream.map_err(|err| io_error("accept", err))?;
            if let Err(err) = serve_unix_stream(server, stream) {
                warn!(
                    "event=ipc_session module=ipc status=error error_code={} error={err}",
                    err.code().as_i32()
                );
            }
        }
        Ok(())
    }
}

#[cfg(unix)]
pub use unix::{serve_unix_listener, serve_unix_stream, UnixSocketTransport};
