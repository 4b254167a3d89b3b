//! Packet <-> frame conversion through a type resolver.

use bytes::Bytes;

use crate::error::{Result, WspError};
use crate::packet::Packet;
use crate::protocol::envelope::Envelope;
use crate::resolver::TypeResolver;

/// Resolve the packet's wire name, serialize it, and build one frame.
pub fn encode_packet(resolver: &dyn TypeResolver, packet: &Packet) -> Result<Bytes> {
    let name = resolver
        .name_of(packet.type_id())
        .ok_or(WspError::UnregisteredType(packet.type_name()))?;
    let codec = resolver
        .resolve(name)
        .ok_or_else(|| WspError::UnknownPacket(name.to_string()))?;
    let payload = codec.encode(packet)?;
    Envelope::new(name, payload).encode()
}

/// Decode one frame and materialize its payload as the registered type.
pub fn decode_packet(resolver: &dyn TypeResolver, frame: Bytes) -> Result<Packet> {
    let env = Envelope::decode(frame)?;
    let codec = resolver
        .resolve(&env.name)
        .ok_or_else(|| WspError::UnknownPacket(env.name.clone()))?;
    codec.decode(&env.payload)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::resolver::PacketRegistry;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Ping {
        seq: u64,
    }

    #[derive(Debug, Serialize)]
    struct Stray;

    fn registry() -> PacketRegistry {
        let mut reg = PacketRegistry::new();
        reg.register::<Ping>().unwrap();
        reg
    }

    #[test]
    fn packet_survives_the_wire() {
        let reg = registry();
        let frame = encode_packet(&reg, &Packet::new(Ping { seq: 9 })).unwrap();
        assert_eq!(&frame[..], b"\x04\x00\x00\x00Ping\x09\x00\x00\x00{\"seq\":9}");

        let back = decode_packet(&reg, frame).unwrap();
        assert_eq!(back.downcast_ref::<Ping>(), Some(&Ping { seq: 9 }));
    }

    #[test]
    fn unregistered_outbound_type_fails() {
        let err = encode_packet(&registry(), &Packet::new(Stray)).unwrap_err();
        assert_eq!(err.code(), "UNREGISTERED_TYPE");
    }

    #[test]
    fn unknown_inbound_name_fails() {
        let frame = Envelope::new("Nope", "{}").encode().unwrap();
        let err = decode_packet(&registry(), frame).unwrap_err();
        assert!(matches!(err, WspError::UnknownPacket(name) if name == "Nope"));
    }
}
