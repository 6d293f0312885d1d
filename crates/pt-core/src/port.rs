//! Local port availability check
//!
//! Advisory only: the answer can be stale by the time a tunnel binds, so
//! callers warn on a busy port but never refuse to continue.

use std::net::TcpListener;

/// Returns true if nothing is listening on `port` on any local interface
pub fn is_port_free(port: u16) -> bool {
    TcpListener::bind(("0.0.0.0", port)).is_ok()
}
