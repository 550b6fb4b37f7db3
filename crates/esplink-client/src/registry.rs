//! Callback registry for routing asynchronous notifications.
//!
//! The module cannot call into the host directly. Instead, the host sends a
//! slot index as a callback parameter (for example in `MQTT_SETUP`) and the
//! module later sends `CMD_RESP_CB` packets carrying that index in the value
//! field. The registry maps indices back to handlers.
//!
//! # Example
//!
//! ```
//! use esplink_client::CallbackRegistry;
//!
//! let mut registry = CallbackRegistry::new();
//! let slot = registry
//!     .register(|packet: &esplink_protocol::Packet<'_>| println!("notified: {}", packet.value))
//!     .expect("registry has room");
//! assert_eq!(slot.index(), 0);
//! ```

use esplink_protocol::Packet;
use tracing::trace;

use crate::error::RegistryFull;

/// Number of callback slots.
pub const CALLBACK_SLOTS: usize = 8;

/// Something that can be invoked with a decoded notification packet.
pub trait Callback {
    /// Handle one notification.
    fn invoke(&mut self, packet: &Packet<'_>);
}

impl<F> Callback for F
where
    F: FnMut(&Packet<'_>),
{
    fn invoke(&mut self, packet: &Packet<'_>) {
        self(packet)
    }
}

/// Index of a registered callback, as sent to the module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallbackSlot(u8);

impl CallbackSlot {
    /// The slot index.
    pub fn index(self) -> u8 {
        self.0
    }

    /// The slot as a request argument.
    pub fn as_arg(self) -> esplink_protocol::Arg<'static> {
        esplink_protocol::Arg::Callback(self.0)
    }
}

/// Fixed-capacity table of notification handlers.
///
/// Slots are handed out in order and are never freed.
pub struct CallbackRegistry {
    slots: [Option<Box<dyn Callback>>; CALLBACK_SLOTS],
}

impl Default for CallbackRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("registered", &self.len())
            .field("capacity", &CALLBACK_SLOTS)
            .finish()
    }
}

impl CallbackRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        CallbackRegistry {
            slots: Default::default(),
        }
    }

    /// Store a handler in the first free slot.
    pub fn register(
        &mut self,
        callback: impl Callback + 'static,
    ) -> Result<CallbackSlot, RegistryFull> {
        let index = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(RegistryFull {
                capacity: CALLBACK_SLOTS,
            })?;
        self.slots[index] = Some(Box::new(callback));
        trace!("registered callback in slot {}", index);
        // CALLBACK_SLOTS fits in a u8
        Ok(CallbackSlot(index as u8))
    }

    /// Run the handler named by the packet's value field.
    ///
    /// Returns whether a handler ran. Out-of-range and empty slots are
    /// ignored: the module may refer to slots from a previous session.
    pub fn dispatch(&mut self, packet: &Packet<'_>) -> bool {
        let handler = usize::try_from(packet.value)
            .ok()
            .and_then(|index| self.slots.get_mut(index))
            .and_then(Option::as_mut);
        match handler {
            Some(handler) => {
                handler.invoke(packet);
                true
            }
            None => {
                trace!("no callback in slot {}", packet.value);
                false
            }
        }
    }

    /// Whether `index` holds a handler.
    pub fn is_registered(&self, index: usize) -> bool {
        matches!(self.slots.get(index), Some(Some(_)))
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Whether no handler is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether every slot is taken.
    pub fn is_full(&self) -> bool {
        self.len() == CALLBACK_SLOTS
    }
}
