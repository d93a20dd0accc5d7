//! ICMP echo transport over operating system sockets
//!
//! A raw socket is preferred; when the process lacks the privilege for one,
//! an unprivileged ICMP datagram socket is tried instead. Two sockets are
//! kept open: one for ordinary probes and one with the don't-fragment bit
//! forced on for path MTU discovery.

#[cfg(unix)]
pub use unix::IcmpTransport;

#[cfg(not(unix))]
pub use unsupported::IcmpTransport;

#[cfg(unix)]
mod unix {
    use crate::{
        error::{AppError, Result},
        probe::{
            packet::{self, IcmpMessage},
            ProbeReply, ProbeStatus, ProbeTransport,
        },
        types::Target,
    };
    use async_trait::async_trait;
    use socket2::{Domain, Protocol, SockAddr, Socket, Type};
    use std::collections::HashMap;
    use std::io::{self, Read};
    use std::net::SocketAddr;
    use std::os::fd::AsRawFd;
    use std::sync::atomic::{AtomicU16, AtomicU64, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::io::unix::AsyncFd;
    use tokio::sync::{oneshot, Mutex};
    use tokio::task::JoinHandle;
    use tokio::time::Instant;

    const RECV_BUFFER_SIZE: usize = 65_536;

    type PendingProbes = Arc<Mutex<HashMap<u16, oneshot::Sender<Arrival>>>>;

    #[derive(Debug, Clone, Copy)]
    enum Arrival {
        Reply(Instant),
        FragmentationNeeded(Option<u32>),
    }

    struct Channel {
        socket: Arc<AsyncFd<Socket>>,
        listener: JoinHandle<()>,
    }

    /// Probe transport backed by ICMP sockets.
    ///
    /// Every probe gets a transport-wide wire sequence number, so concurrent
    /// streams never confuse each other's replies.
    pub struct IcmpTransport {
        ipv6: bool,
        raw: bool,
        identifier: u16,
        standard: Channel,
        dont_fragment: Option<Channel>,
        pending: PendingProbes,
        next_sequence: AtomicU16,
        sent: AtomicU64,
    }

    impl IcmpTransport {
        /// Open the probe channel for the target's address family.
        ///
        /// Must be called from within a Tokio runtime.
        pub fn open(target: &Target) -> Result<Self> {
            let ipv6 = target.is_ipv6();
            let (socket, raw) = new_socket(ipv6).map_err(|err| {
                AppError::transport(format!(
                    "cannot open an ICMP socket: {}. Raw sockets need root or CAP_NET_RAW; \
                     unprivileged ICMP needs net.ipv4.ping_group_range to include your group",
                    err
                ))
            })?;

            let identifier = random_identifier();
            let pending: PendingProbes = Arc::new(Mutex::new(HashMap::new()));

            let standard = Channel::spawn(socket, ipv6, raw, identifier, pending.clone())?;

            // Without don't-fragment support the MTU metric fails on its own;
            // the other probe metrics still work.
            let dont_fragment = new_dont_fragment_socket(ipv6, raw)
                .ok()
                .map(|socket| Channel::spawn(socket, ipv6, raw, identifier, pending.clone()))
                .transpose()?;

            Ok(Self {
                ipv6,
                raw,
                identifier,
                standard,
                dont_fragment,
                pending,
                next_sequence: AtomicU16::new(0),
                sent: AtomicU64::new(0),
            })
        }

        pub fn supports_dont_fragment(&self) -> bool {
            self.dont_fragment.is_some()
        }
    }

    /// A registered pending probe. Dropping it unregisters the probe, so a
    /// wait cut short by a metric timeout leaves nothing behind.
    struct PendingEntry {
        pending: PendingProbes,
        wire_sequence: u16,
        answered: bool,
    }

    impl PendingEntry {
        async fn register(pending: &PendingProbes, wire_sequence: u16, tx: oneshot::Sender<Arrival>) -> Self {
            pending.lock().await.insert(wire_sequence, tx);
            Self {
                pending: pending.clone(),
                wire_sequence,
                answered: false,
            }
        }

        /// The listener already removed the entry when it delivered
        fn answered(mut self) {
            self.answered = true;
        }
    }

    impl Drop for PendingEntry {
        fn drop(&mut self) {
            if self.answered {
                return;
            }

            let wire_sequence = self.wire_sequence;
            match self.pending.try_lock() {
                Ok(mut pending) => {
                    pending.remove(&wire_sequence);
                }
                Err(_) => {
                    // The listener holds the lock; remove once it lets go
                    if let Ok(handle) = tokio::runtime::Handle::try_current() {
                        let pending = self.pending.clone();
                        handle.spawn(async move {
                            pending.lock().await.remove(&wire_sequence);
                        });
                    }
                }
            }
        }
    }

    impl Drop for IcmpTransport {
        fn drop(&mut self) {
            self.standard.listener.abort();
            if let Some(channel) = &self.dont_fragment {
                channel.listener.abort();
            }
        }
    }

    #[async_trait]
    impl ProbeTransport for IcmpTransport {
        async fn send_and_wait(
            &self,
            target: &Target,
            sequence: u16,
            payload_size: usize,
            dont_fragment: bool,
            deadline: Duration,
        ) -> Result<ProbeReply> {
            if target.is_ipv6() != self.ipv6 {
                return Err(AppError::transport(format!(
                    "target {} does not match the address family of the probe channel",
                    target.address
                )));
            }

            let channel = if dont_fragment {
                self.dont_fragment.as_ref().ok_or_else(|| {
                    AppError::transport("don't-fragment probes are not supported on this platform")
                })?
            } else {
                &self.standard
            };

            let wire_sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
            let (tx, rx) = oneshot::channel();
            let entry = PendingEntry::register(&self.pending, wire_sequence, tx).await;

            let request = packet::echo_request(self.ipv6, self.identifier, wire_sequence, payload_size);
            let destination = SockAddr::from(SocketAddr::new(target.address, 0));
            let sent_at = Instant::now();

            match send_to(&channel.socket, &request, &destination).await {
                Ok(_) => {
                    self.sent.fetch_add(1, Ordering::Relaxed);
                }
                Err(err) if err.raw_os_error() == Some(libc::EMSGSIZE) => {
                    // The local interface MTU already rules this size out
                    return Ok(ProbeReply {
                        sequence,
                        sent_at,
                        status: ProbeStatus::FragmentationNeeded { next_hop_mtu: None },
                    });
                }
                Err(err) => {
                    return Err(AppError::transport(format!(
                        "failed to send probe to {}: {}",
                        target.address, err
                    )));
                }
            }

            let status = match tokio::time::timeout(deadline, rx).await {
                Ok(Ok(arrival)) => {
                    entry.answered();
                    match arrival {
                        Arrival::Reply(received_at) => ProbeStatus::Received {
                            received_at,
                            rtt: received_at.saturating_duration_since(sent_at),
                        },
                        Arrival::FragmentationNeeded(next_hop_mtu) => {
                            ProbeStatus::FragmentationNeeded { next_hop_mtu }
                        }
                    }
                }
                Ok(Err(_)) => return Err(AppError::transport("probe listener stopped unexpectedly")),
                Err(_) => ProbeStatus::TimedOut,
            };

            Ok(ProbeReply { sequence, sent_at, status })
        }

        fn probes_sent(&self) -> u64 {
            self.sent.load(Ordering::Relaxed)
        }

        fn describe(&self) -> String {
            format!(
                "{} ICMPv{} socket{}",
                if self.raw { "raw" } else { "datagram" },
                if self.ipv6 { 6 } else { 4 },
                if self.supports_dont_fragment() { "" } else { " (no don't-fragment support)" }
            )
        }
    }

    impl Channel {
        fn spawn(socket: Socket, ipv6: bool, raw: bool, identifier: u16, pending: PendingProbes) -> Result<Self> {
            socket.set_nonblocking(true)?;
            let socket = Arc::new(AsyncFd::new(socket)?);
            let listener = tokio::spawn(listen(socket.clone(), ipv6, raw, identifier, pending));
            Ok(Self { socket, listener })
        }
    }

    /// Read replies until the socket fails, completing matching pending probes
    async fn listen(socket: Arc<AsyncFd<Socket>>, ipv6: bool, raw: bool, identifier: u16, pending: PendingProbes) {
        let mut buf = vec![0u8; RECV_BUFFER_SIZE];

        loop {
            let mut guard = match socket.readable().await {
                Ok(guard) => guard,
                Err(_) => break,
            };

            let len = match guard.try_io(|inner| {
                let mut socket: &Socket = inner.get_ref();
                socket.read(&mut buf)
            }) {
                Ok(Ok(len)) => len,
                Ok(Err(err)) if is_transient(&err) => continue,
                Ok(Err(_)) => break,
                Err(_would_block) => continue,
            };
            let received_at = Instant::now();

            let message = if ipv6 {
                packet::parse_icmpv6(&buf[..len])
            } else {
                packet::parse_icmpv4(&buf[..len])
            };
            let Some(message) = message else { continue };

            // Datagram sockets rewrite the identifier; the kernel already
            // filters replies for us
            if raw && message.identifier() != identifier {
                continue;
            }

            let arrival = match message {
                IcmpMessage::EchoReply { .. } => Arrival::Reply(received_at),
                IcmpMessage::FragmentationNeeded { next_hop_mtu, .. } => Arrival::FragmentationNeeded(next_hop_mtu),
            };

            if let Some(tx) = pending.lock().await.remove(&message.sequence()) {
                let _ = tx.send(arrival);
            }
        }

        // Fail everything still waiting instead of letting it time out
        pending.lock().await.clear();
    }

    async fn send_to(socket: &AsyncFd<Socket>, packet: &[u8], destination: &SockAddr) -> io::Result<usize> {
        loop {
            let mut guard = socket.writable().await?;
            match guard.try_io(|inner| inner.get_ref().send_to(packet, destination)) {
                Ok(result) => return result,
                Err(_would_block) => continue,
            }
        }
    }

    fn is_transient(err: &io::Error) -> bool {
        matches!(
            err.kind(),
            io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::ConnectionRefused
        )
    }

    fn new_socket(ipv6: bool) -> io::Result<(Socket, bool)> {
        let (domain, protocol) = if ipv6 {
            (Domain::IPV6, Protocol::ICMPV6)
        } else {
            (Domain::IPV4, Protocol::ICMPV4)
        };

        match Socket::new(domain, Type::RAW, Some(protocol)) {
            Ok(socket) => Ok((socket, true)),
            Err(raw_err) => Socket::new(domain, Type::DGRAM, Some(protocol))
                .map(|socket| (socket, false))
                .map_err(|_| raw_err),
        }
    }

    fn new_dont_fragment_socket(ipv6: bool, raw: bool) -> io::Result<Socket> {
        let (domain, protocol) = if ipv6 {
            (Domain::IPV6, Protocol::ICMPV6)
        } else {
            (Domain::IPV4, Protocol::ICMPV4)
        };
        let ty = if raw { Type::RAW } else { Type::DGRAM };

        let socket = Socket::new(domain, ty, Some(protocol))?;
        set_dont_fragment(&socket, ipv6)?;
        Ok(socket)
    }

    /// Force the DF bit and bypass the kernel's cached path MTU
    #[cfg(any(target_os = "linux", target_os = "android"))]
    fn set_dont_fragment(socket: &Socket, ipv6: bool) -> io::Result<()> {
        if ipv6 {
            setsockopt_int(socket, libc::IPPROTO_IPV6, libc::IPV6_MTU_DISCOVER, libc::IPV6_PMTUDISC_PROBE)
        } else {
            setsockopt_int(socket, libc::IPPROTO_IP, libc::IP_MTU_DISCOVER, libc::IP_PMTUDISC_PROBE)
        }
    }

    #[cfg(target_os = "macos")]
    fn set_dont_fragment(socket: &Socket, ipv6: bool) -> io::Result<()> {
        if ipv6 {
            setsockopt_int(socket, libc::IPPROTO_IPV6, libc::IPV6_DONTFRAG, 1)
        } else {
            setsockopt_int(socket, libc::IPPROTO_IP, libc::IP_DONTFRAG, 1)
        }
    }

    #[cfg(not(any(target_os = "linux", target_os = "android", target_os = "macos")))]
    fn set_dont_fragment(_socket: &Socket, _ipv6: bool) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "don't-fragment is not supported on this platform",
        ))
    }

    #[cfg(any(target_os = "linux", target_os = "android", target_os = "macos"))]
    fn setsockopt_int(socket: &Socket, level: libc::c_int, name: libc::c_int, value: libc::c_int) -> io::Result<()> {
        // SAFETY: the fd is owned by `socket` and outlives the call; the
        // option value points at a live c_int of the advertised length.
        let rc = unsafe {
            libc::setsockopt(
                socket.as_raw_fd(),
                level,
                name,
                &value as *const libc::c_int as *const libc::c_void,
                std::mem::size_of::<libc::c_int>() as libc::socklen_t,
            )
        };
        if rc == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    fn random_identifier() -> u16 {
        let id = uuid::Uuid::new_v4();
        let bytes = id.as_bytes();
        u16::from_be_bytes([bytes[0], bytes[1]])
    }

}

#[cfg(not(unix))]
mod unsupported {
    use crate::{
        error::{AppError, Result},
        probe::{ProbeReply, ProbeTransport},
        types::Target,
    };
    use async_trait::async_trait;
    use std::time::Duration;

    /// Placeholder on platforms without ICMP socket support
    pub struct IcmpTransport {
        _private: (),
    }

    impl IcmpTransport {
        pub fn open(_target: &Target) -> Result<Self> {
            Err(AppError::transport("ICMP probing is only supported on Unix platforms"))
        }

        pub fn supports_dont_fragment(&self) -> bool {
            false
        }
    }

    #[async_trait]
    impl ProbeTransport for IcmpTransport {
        async fn send_and_wait(
            &self,
            _target: &Target,
            _sequence: u16,
            _payload_size: usize,
            _dont_fragment: bool,
            _deadline: Duration,
        ) -> Result<ProbeReply> {
            Err(AppError::transport("ICMP probing is only supported on Unix platforms"))
        }

        fn probes_sent(&self) -> u64 {
            0
        }
    }
}
