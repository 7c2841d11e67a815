//! Ephemeral host port allocation.

use std::net::{Ipv4Addr, TcpListener};

/// Ask the OS for a free loopback port and release it again.
///
/// The port is only reserved while the listener is alive, so another process
/// can take it before the container binds it.
///
/// # Errors
///
/// Returns the underlying I/O error if binding fails.
pub fn allocate_port() -> std::io::Result<u16> {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(port)
}
