//! The board-level collaborator that grants physical resources to modules.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};

/// A granted physical resource (pin group, clock input, bus).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceHandle {
    pub name: String,
    pub index: u32,
    /// Platform-assigned identifier, unique within one platform.
    pub token: u64,
}

impl fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]#{}", self.name, self.index, self.token)
    }
}

/// Why a platform refused a resource request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResourceDenied {
    #[error("no resource named '{name}'")]
    Unknown { name: String },

    #[error("index {index} out of range ({available} available)")]
    OutOfRange { name: String, index: u32, available: u32 },

    #[error("already granted")]
    AlreadyGranted { name: String, index: u32 },
}

/// Grants physical resources during assembly.
pub trait Platform {
    /// Board name, recorded in the system image.
    fn name(&self) -> &str;

    /// Claim resource `name` instance `index`.
    fn request_resource(&mut self, name: &str, index: u32)
        -> Result<ResourceHandle, ResourceDenied>;

    /// Return a handle granted during an assembly that was later abandoned.
    fn release(&mut self, _handle: &ResourceHandle) {}
}

/// An in-memory platform built from a fixed resource inventory.
///
/// Each `(name, index)` can be granted once.
#[derive(Debug, Clone, Default)]
pub struct BoardPlatform {
    name: String,
    available: BTreeMap<String, u32>,
    granted: BTreeSet<(String, u32)>,
    next_token: u64,
}

impl BoardPlatform {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Add `count` instances of resource `name`.
    pub fn with_resource(mut self, name: impl Into<String>, count: u32) -> Self {
        *self.available.entry(name.into()).or_insert(0) += count;
        self
    }

    /// Number of instances of `name` on the board.
    pub fn capacity(&self, name: &str) -> u32 {
        self.available.get(name).copied().unwrap_or(0)
    }

    pub fn is_granted(&self, name: &str, index: u32) -> bool {
        self.granted.contains(&(name.to_string(), index))
    }

    pub fn granted_count(&self) -> usize {
        self.granted.len()
    }
}

impl Platform for BoardPlatform {
    fn name(&self) -> &str {
        &self.name
    }

    fn request_resource(
        &mut self,
        name: &str,
        index: u32,
    ) -> Result<ResourceHandle, ResourceDenied> {
        let available = *self
            .available
            .get(name)
            .ok_or_else(|| ResourceDenied::Unknown { name: name.into() })?;
        if index >= available {
            return Err(ResourceDenied::OutOfRange {
                name: name.into(),
                index,
                available,
            });
        }
        if !self.granted.insert((name.to_string(), index)) {
            return Err(ResourceDenied::AlreadyGranted {
                name: name.into(),
                index,
            });
        }

        let token = self.next_token;
        self.next_token += 1;
        debug!("platform '{}': granted {name}[{index}] as #{token}", self.name);
        Ok(ResourceHandle {
            name: name.into(),
            index,
            token,
        })
    }

    fn release(&mut self, handle: &ResourceHandle) {
        if self.granted.remove(&(handle.name.clone(), handle.index)) {
            debug!("platform '{}': released {handle}", self.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atlys() -> BoardPlatform {
        BoardPlatform::new("atlys")
            .with_resource("ddram", 1)
            .with_resource("hdmi_in", 2)
    }

    #[test]
    fn grants_each_index_once() {
        let mut p = atlys();
        let a = p.request_resource("hdmi_in", 0).unwrap();
        let b = p.request_resource("hdmi_in", 1).unwrap();
        assert_ne!(a.token, b.token);
        assert_eq!(
            p.request_resource("hdmi_in", 0),
            Err(ResourceDenied::AlreadyGranted {
                name: "hdmi_in".into(),
                index: 0
            })
        );
    }

    #[test]
    fn unknown_and_out_of_range() {
        let mut p = atlys();
        assert!(matches!(
            p.request_resource("eth", 0),
            Err(ResourceDenied::Unknown { .. })
        ));
        assert!(matches!(
            p.request_resource("ddram", 1),
            Err(ResourceDenied::OutOfRange { available: 1, .. })
        ));
    }

    #[test]
    fn release_makes_resource_available_again() {
        let mut p = atlys();
        let h = p.request_resource("ddram", 0).unwrap();
        assert!(p.is_granted("ddram", 0));
        p.release(&h);
        assert!(!p.is_granted("ddram", 0));
        assert!(p.request_resource("ddram", 0).is_ok());
    }

    #[test]
    fn counts_accumulate() {
        let p = BoardPlatform::new("x")
            .with_resource("user_led", 2)
            .with_resource("user_led", 2);
        assert_eq!(p.capacity("user_led"), 4);
        assert_eq!(p.capacity("missing"), 0);
    }

    #[test]
    fn default_release_is_a_no_op() {
        struct Fixed;
        impl Platform for Fixed {
            fn name(&self) -> &str {
                "fixed"
            }
            fn request_resource(
                &mut self,
                name: &str,
                index: u32,
            ) -> Result<ResourceHandle, ResourceDenied> {
                Ok(ResourceHandle {
                    name: name.to_string(),
                    index,
                    token: 0,
                })
            }
        }

        let mut p = Fixed;
        let h = p.request_resource("clk100", 0).unwrap();
        p.release(&h);
        assert_eq!(p.request_resource("clk100", 0), Ok(h));
    }
}
