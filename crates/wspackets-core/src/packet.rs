//! Type-erased packet value.
//!
//! A `Packet` is what flows through queues and handlers. It wraps any
//! application value behind an `Arc`, so fanning one inbound packet out to
//! several observers never copies the payload.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// One typed application message.
#[derive(Clone)]
pub struct Packet {
    value: Arc<dyn Any + Send + Sync>,
    type_id: TypeId,
    type_name: &'static str,
}

impl Packet {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            value: Arc::new(value),
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// `TypeId` of the wrapped value (not of the `Arc`).
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Full Rust type name, for diagnostics only.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn is<T: Any>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Recover the shared value, or give the packet back if `T` does not match.
    pub fn downcast<T: Any + Send + Sync>(self) -> std::result::Result<Arc<T>, Self> {
        let Packet {
            value,
            type_id,
            type_name,
        } = self;
        value.downcast::<T>().map_err(|value| Packet {
            value,
            type_id,
            type_name,
        })
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packet").field("type", &self.type_name).finish()
    }
}

/// Wire-friendly short name of `T`: module path and generic arguments stripped.
///
/// `my_app::packets::Ping` becomes `Ping`.
pub fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
