//! Type resolution boundary: wire name <-> payload shape.
//!
//! The application fills a `PacketRegistry` at startup. Each entry is a
//! tagged variant: a wire name plus a JSON decode/encode function pair
//! monomorphized for one Rust type. Lookups never reflect over types at
//! runtime.

use std::any::TypeId;
use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Result, WspError};
use crate::packet::{short_type_name, Packet};

/// Mapping consulted by the connection engine for every packet.
pub trait TypeResolver: Send + Sync + 'static {
    /// Codec for an inbound wire name, `None` if unknown.
    fn resolve(&self, name: &str) -> Option<&PacketCodec>;

    /// Wire name for an outbound value type, `None` if unregistered.
    fn name_of(&self, type_id: TypeId) -> Option<&str>;
}

type DecodeFn = fn(&[u8]) -> serde_json::Result<Packet>;
type EncodeFn = fn(&Packet) -> Option<serde_json::Result<Vec<u8>>>;

/// JSON codec for one registered packet type.
pub struct PacketCodec {
    name: String,
    type_id: TypeId,
    decode: DecodeFn,
    encode: EncodeFn,
}

impl PacketCodec {
    fn of<T>(name: String) -> Self
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        Self {
            name,
            type_id: TypeId::of::<T>(),
            decode: decode_json::<T>,
            encode: encode_json::<T>,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn decode(&self, payload: &[u8]) -> Result<Packet> {
        (self.decode)(payload).map_err(|e| WspError::Codec {
            name: self.name.clone(),
            reason: e.to_string(),
        })
    }

    pub fn encode(&self, packet: &Packet) -> Result<Vec<u8>> {
        match (self.encode)(packet) {
            Some(Ok(bytes)) => Ok(bytes),
            Some(Err(e)) => Err(WspError::Codec {
                name: self.name.clone(),
                reason: e.to_string(),
            }),
            None => Err(WspError::UnregisteredType(packet.type_name())),
        }
    }
}

impl std::fmt::Debug for PacketCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketCodec").field("name", &self.name).finish()
    }
}

fn decode_json<T>(payload: &[u8]) -> serde_json::Result<Packet>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    serde_json::from_slice::<T>(payload).map(Packet::new)
}

fn encode_json<T>(packet: &Packet) -> Option<serde_json::Result<Vec<u8>>>
where
    T: Serialize + Send + Sync + 'static,
{
    packet.downcast_ref::<T>().map(serde_json::to_vec)
}

/// Registration table of packet types known to one application.
#[derive(Debug, Default)]
pub struct PacketRegistry {
    by_name: HashMap<String, PacketCodec>,
    by_type: HashMap<TypeId, String>,
}

impl PacketRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T` under its short type name (`app::packets::Ping` -> `Ping`).
    pub fn register<T>(&mut self) -> Result<&mut Self>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        self.register_as::<T>(short_type_name::<T>())
    }

    /// Register `T` under an explicit wire name.
    pub fn register_as<T>(&mut self, name: impl Into<String>) -> Result<&mut Self>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        let name = name.into();
        if self.by_name.contains_key(&name) {
            return Err(WspError::DuplicatePacket(name));
        }
        let type_id = TypeId::of::<T>();
        if self.by_type.contains_key(&type_id) {
            return Err(WspError::DuplicatePacket(std::any::type_name::<T>().to_string()));
        }

        tracing::debug!(packet = %name, rust_type = std::any::type_name::<T>(), "packet registered");
        self.by_type.insert(type_id, name.clone());
        self.by_name.insert(name.clone(), PacketCodec::of::<T>(name));
        Ok(self)
    }

    /// Registered wire names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.by_name.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

impl TypeResolver for PacketRegistry {
    fn resolve(&self, name: &str) -> Option<&PacketCodec> {
        self.by_name.get(name)
    }

    fn name_of(&self, type_id: TypeId) -> Option<&str> {
        self.by_type.get(&type_id).map(String::as_str)
    }
}
