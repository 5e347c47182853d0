//! The immutable result of a completed assembly.
//!
//! A [`SystemImage`] is everything the hardware generator needs: who owns
//! which slot, line and region, how the synthesizer is programmed, the order
//! in which domains leave reset, and the resources each module was granted.
//! Images are content-addressed with SHA-256 over their JSON encoding so two
//! runs can be compared without diffing the whole structure.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use socmap_clock::ClockPlan;
use socmap_registry::{AddressMap, MemoryRegion, ModuleId};

use crate::error::Result;
use crate::platform::ResourceHandle;

/// A 32-byte SHA-256 image digest.
pub type ImageDigest = [u8; 32];

/// A module with every assignment resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedModule {
    pub id: ModuleId,
    /// Composition layer that declared the module.
    pub layer: String,
    pub control_slot: Option<u32>,
    pub interrupt: Option<u32>,
    pub memory: Option<MemoryRegion>,
    pub resources: Vec<ResourceHandle>,
    pub config: Option<serde_json::Value>,
}

/// A fully assembled system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemImage {
    pub board: String,
    pub platform: String,
    pub address_map: AddressMap,
    pub clock_plan: ClockPlan,
    pub reset_order: Vec<String>,
    /// Modules in composition order, deepest layer first.
    pub modules: Vec<ResolvedModule>,
}

impl SystemImage {
    pub fn module(&self, id: &str) -> Option<&ResolvedModule> {
        self.modules.iter().find(|m| m.id.as_str() == id)
    }

    /// SHA-256 over the canonical JSON encoding.
    pub fn digest(&self) -> Result<ImageDigest> {
        let json = serde_json::to_vec(self)?;
        let mut hasher = Sha256::new();
        hasher.update(&json);
        Ok(hasher.finalize().into())
    }

    pub fn digest_hex(&self) -> Result<String> {
        Ok(self.digest()?.iter().map(|b| format!("{b:02x}")).collect())
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl fmt::Display for SystemImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== System image: {} ===", self.board)?;
        writeln!(f, "Platform: {}", self.platform)?;
        writeln!(f)?;

        writeln!(f, "--- Clocks ---")?;
        write!(f, "{}", self.clock_plan)?;
        writeln!(f, "  reset order: {}", self.reset_order.join(" -> "))?;
        writeln!(f)?;

        writeln!(f, "--- Address map ---")?;
        for (slot, owner) in &self.address_map.control_slots {
            writeln!(f, "  csr {slot:>3}  {owner}")?;
        }
        for (line, owner) in &self.address_map.interrupts {
            writeln!(f, "  irq {line:>3}  {owner}")?;
        }
        for m in &self.address_map.memory {
            writeln!(f, "  mem {}  {}", m.region, m.module)?;
        }
        writeln!(f)?;

        writeln!(f, "--- Modules ---")?;
        for m in &self.modules {
            write!(f, "  {:<16} [{}]", m.id.as_str(), m.layer)?;
            if !m.resources.is_empty() {
                let names: Vec<String> = m.resources.iter().map(|r| r.to_string()).collect();
                write!(f, " {}", names.join(", "))?;
            }
            if m.config.is_some() {
                write!(f, " (config)")?;
            }
            writeln!(f)?;
            let keys = self.address_map.keys_of(&m.id);
            if !keys.is_empty() {
                let keys: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
                writeln!(f, "    owns {}", keys.join(", "))?;
            }
        }
        Ok(())
    }
}
