use socket2::{Domain, Protocol, Socket, Type};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::net::TcpListener;

/// Binds the HTTP listener.
///
/// `host == "*"` listens on all interfaces: IPv6 dual-stack when available,
/// IPv4 otherwise. Returns the bound address for logging.
pub async fn create_listener(host: &str, port: u16) -> std::io::Result<(String, TcpListener)> {
    if host == "*" {
        return bind_wildcard(port);
    }

    let addr = format!("{}:{}", host, port);
    tracing::info!("Attempting to bind server to {}...", addr);
    let listener = TcpListener::bind(&addr).await?;
    let bound = listener.local_addr().map(|a| a.to_string()).unwrap_or(addr);
    Ok((bound, listener))
}

fn bind_wildcard(port: u16) -> std::io::Result<(String, TcpListener)> {
    let ipv6 = SocketAddr::from((Ipv6Addr::UNSPECIFIED, port));
    tracing::info!("Attempting to bind server to {}... (IPv6 + IPv4 dual-stack)", ipv6);
    match bind_socket(Domain::IPV6, ipv6) {
        Ok(listener) => return Ok((ipv6.to_string(), listener)),
        Err(e) => tracing::warn!("Failed to bind IPv6 listener: {}. Attempting IPv4 only.", e),
    }

    let ipv4 = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    tracing::info!("Attempting to bind server to {}... (IPv4)", ipv4);
    Ok((ipv4.to_string(), bind_socket(Domain::IPV4, ipv4)?))
}

fn bind_socket(domain: Domain, addr: SocketAddr) -> std::io::Result<TcpListener> {
    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;

    if domain == Domain::IPV6 {
        // Some systems refuse dual-stack; IPv6-only still works there.
        if let Err(e) = socket.set_only_v6(false) {
            tracing::warn!("Failed to enable dual-stack mode: {}. Continuing anyway.", e);
        }
    }

    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(1024)?;
    socket.set_nonblocking(true)?;

    TcpListener::from_std(socket.into())
}
