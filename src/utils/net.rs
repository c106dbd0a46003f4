use std::net::IpAddr;
use std::net::Ipv4Addr;
use std::net::UdpSocket;

const LOOPBACK: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// Best-effort discovery of the address other hosts would reach us on.
///
/// Connecting a UDP socket sends no packets; it only asks the kernel which
/// local interface routes to the probe address. Falls back to loopback when
/// there is no route.
pub fn local_ip() -> IpAddr {
    probe_local_ip("8.8.8.8:80").unwrap_or_else(|e| {
        tracing::debug!("local ip probe failed, using loopback: {:?}", e);
        LOOPBACK
    })
}

pub(crate) fn probe_local_ip(target: &str) -> std::io::Result<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0")?;
    socket.connect(target)?;
    Ok(socket.local_addr()?.ip())
}
