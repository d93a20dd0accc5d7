//! ICMP echo packet construction and reply parsing

/// Size of the ICMP echo header
pub const ICMP_HEADER_LEN: usize = 8;

const ICMPV4_ECHO_REPLY: u8 = 0;
const ICMPV4_DEST_UNREACHABLE: u8 = 3;
const ICMPV4_FRAGMENTATION_NEEDED: u8 = 4;
const ICMPV4_ECHO_REQUEST: u8 = 8;
const ICMPV6_PACKET_TOO_BIG: u8 = 2;
const ICMPV6_ECHO_REQUEST: u8 = 128;
const ICMPV6_ECHO_REPLY: u8 = 129;

const IPV4_PROTO_ICMP: u8 = 1;
const IPV6_HEADER_LEN: usize = 40;
const IPV6_NEXT_HEADER_ICMPV6: u8 = 58;

/// An inbound ICMP message relevant to an outstanding probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IcmpMessage {
    EchoReply {
        identifier: u16,
        sequence: u16,
    },
    /// A router refused to forward one of our echo requests because it was
    /// too large and don't-fragment was set
    FragmentationNeeded {
        identifier: u16,
        sequence: u16,
        next_hop_mtu: Option<u32>,
    },
}

impl IcmpMessage {
    pub fn sequence(&self) -> u16 {
        match self {
            IcmpMessage::EchoReply { sequence, .. } => *sequence,
            IcmpMessage::FragmentationNeeded { sequence, .. } => *sequence,
        }
    }

    pub fn identifier(&self) -> u16 {
        match self {
            IcmpMessage::EchoReply { identifier, .. } => *identifier,
            IcmpMessage::FragmentationNeeded { identifier, .. } => *identifier,
        }
    }
}

/// Build an echo request with `payload_size` bytes of payload.
///
/// The ICMPv4 checksum is filled in; ICMPv6 checksums cover a pseudo header
/// and are computed by the kernel.
pub fn echo_request(ipv6: bool, identifier: u16, sequence: u16, payload_size: usize) -> Vec<u8> {
    let mut packet = vec![0u8; ICMP_HEADER_LEN + payload_size];
    packet[0] = if ipv6 { ICMPV6_ECHO_REQUEST } else { ICMPV4_ECHO_REQUEST };
    packet[4..6].copy_from_slice(&identifier.to_be_bytes());
    packet[6..8].copy_from_slice(&sequence.to_be_bytes());

    for (i, byte) in packet[ICMP_HEADER_LEN..].iter_mut().enumerate() {
        *byte = (i % 256) as u8;
    }

    if !ipv6 {
        let sum = checksum(&packet);
        packet[2..4].copy_from_slice(&sum.to_be_bytes());
    }

    packet
}

/// Parse an ICMPv4 datagram, with or without a leading IPv4 header
pub fn parse_icmpv4(datagram: &[u8]) -> Option<IcmpMessage> {
    let icmp = if datagram.first()? >> 4 == 4 {
        ipv4_payload(datagram)?
    } else {
        datagram
    };

    if icmp.len() < ICMP_HEADER_LEN {
        return None;
    }

    match (icmp[0], icmp[1]) {
        (ICMPV4_ECHO_REPLY, 0) => Some(IcmpMessage::EchoReply {
            identifier: read_u16(icmp, 4)?,
            sequence: read_u16(icmp, 6)?,
        }),
        (ICMPV4_DEST_UNREACHABLE, ICMPV4_FRAGMENTATION_NEEDED) => {
            let next_hop_mtu = match read_u16(icmp, 6)? {
                0 => None,
                mtu => Some(u32::from(mtu)),
            };

            let original = &icmp[ICMP_HEADER_LEN..];
            if original.len() < 20 || original[9] != IPV4_PROTO_ICMP {
                return None;
            }
            let inner = ipv4_payload(original)?;
            if inner.first() != Some(&ICMPV4_ECHO_REQUEST) {
                return None;
            }

            Some(IcmpMessage::FragmentationNeeded {
                identifier: read_u16(inner, 4)?,
                sequence: read_u16(inner, 6)?,
                next_hop_mtu,
            })
        }
        _ => None,
    }
}

/// Parse an ICMPv6 message; the kernel never delivers the IPv6 header
pub fn parse_icmpv6(icmp: &[u8]) -> Option<IcmpMessage> {
    if icmp.len() < ICMP_HEADER_LEN {
        return None;
    }

    match (icmp[0], icmp[1]) {
        (ICMPV6_ECHO_REPLY, 0) => Some(IcmpMessage::EchoReply {
            identifier: read_u16(icmp, 4)?,
            sequence: read_u16(icmp, 6)?,
        }),
        (ICMPV6_PACKET_TOO_BIG, 0) => {
            let mtu = u32::from_be_bytes(icmp.get(4..8)?.try_into().ok()?);

            let original = &icmp[ICMP_HEADER_LEN..];
            if original.len() < IPV6_HEADER_LEN + ICMP_HEADER_LEN
                || original[6] != IPV6_NEXT_HEADER_ICMPV6
            {
                return None;
            }
            let inner = &original[IPV6_HEADER_LEN..];
            if inner[0] != ICMPV6_ECHO_REQUEST {
                return None;
            }

            Some(IcmpMessage::FragmentationNeeded {
                identifier: read_u16(inner, 4)?,
                sequence: read_u16(inner, 6)?,
                next_hop_mtu: (mtu > 0).then_some(mtu),
            })
        }
        _ => None,
    }
}

/// Internet checksum (RFC 1071) over `data`
pub fn checksum(data: &[u8]) -> u16 {
    let mut sum: u32 = data
        .chunks(2)
        .map(|chunk| match chunk {
            [hi, lo] => u32::from(u16::from_be_bytes([*hi, *lo])),
            [hi] => u32::from(u16::from_be_bytes([*hi, 0])),
            _ => 0,
        })
        .sum();

    while sum >> 16 != 0 {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    !(sum as u16)
}

fn ipv4_payload(datagram: &[u8]) -> Option<&[u8]> {
    let header_len = usize::from(datagram.first()? & 0x0f) * 4;
    if header_len < 20 || datagram.len() < header_len {
        return None;
    }
    Some(&datagram[header_len..])
}

fn read_u16(data: &[u8], offset: usize) -> Option<u16> {
    let bytes = data.get(offset..offset + 2)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}
