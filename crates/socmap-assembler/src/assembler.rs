//! The one-way assembly state machine.
//!
//! ```text
//! Empty -> PlatformBound -> ClockPlanned -> ModulesRegistered -> Resolved
//!   \__________\_______________\__________________\___> Failed
//! ```
//!
//! Every error moves the assembler to `Failed`, which accepts no further
//! calls. `Resolved` is also terminal but keeps answering `finish()` with the
//! same image.

use std::fmt;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use socmap_clock::{ClockDomain, ClockPlanner, ClockTree, SynthesizerLimits};
use socmap_registry::{AddressSpaceRegistry, CompositionLayer};

use crate::error::{AssemblyError, Result};
use crate::image::{ResolvedModule, SystemImage};
use crate::platform::{Platform, ResourceHandle};

/// Stage of an assembly run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssemblyState {
    Empty,
    PlatformBound,
    ClockPlanned,
    ModulesRegistered,
    Resolved,
    /// A step failed; the run is abandoned.
    Failed,
}

impl AssemblyState {
    /// States reachable from this one.
    pub fn valid_transitions(&self) -> &'static [AssemblyState] {
        use AssemblyState::*;
        match self {
            Empty => &[PlatformBound, Failed],
            PlatformBound => &[ClockPlanned, Failed],
            ClockPlanned => &[ModulesRegistered, Failed],
            ModulesRegistered => &[Resolved, Failed],
            Resolved => &[],
            Failed => &[],
        }
    }

    pub fn can_transition_to(&self, target: AssemblyState) -> bool {
        self.valid_transitions().contains(&target)
    }

    pub fn is_terminal(&self) -> bool {
        self.valid_transitions().is_empty()
    }
}

impl fmt::Display for AssemblyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssemblyState::Empty => write!(f, "empty"),
            AssemblyState::PlatformBound => write!(f, "platform-bound"),
            AssemblyState::ClockPlanned => write!(f, "clock-planned"),
            AssemblyState::ModulesRegistered => write!(f, "modules-registered"),
            AssemblyState::Resolved => write!(f, "resolved"),
            AssemblyState::Failed => write!(f, "failed"),
        }
    }
}

/// Drives one board variant from an empty description to a [`SystemImage`].
pub struct SocAssembler {
    board: String,
    planner: ClockPlanner,
    state: AssemblyState,
    platform: Option<Box<dyn Platform>>,
    clock: Option<ClockTree>,
    registry: AddressSpaceRegistry,
    modules: Vec<ResolvedModule>,
    granted: Vec<ResourceHandle>,
    image: Option<SystemImage>,
}

impl fmt::Debug for SocAssembler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocAssembler")
            .field("board", &self.board)
            .field("state", &self.state)
            .field("platform", &self.platform.as_ref().map(|p| p.name()))
            .field("modules", &self.modules.len())
            .finish()
    }
}

impl SocAssembler {
    pub fn new(board: impl Into<String>, limits: SynthesizerLimits) -> Self {
        Self {
            board: board.into(),
            planner: ClockPlanner::new(limits),
            state: AssemblyState::Empty,
            platform: None,
            clock: None,
            registry: AddressSpaceRegistry::new(),
            modules: Vec::new(),
            granted: Vec::new(),
            image: None,
        }
    }

    pub fn board(&self) -> &str {
        &self.board
    }

    pub fn state(&self) -> AssemblyState {
        self.state
    }

    /// The planned clock tree, once `plan_clocks` has succeeded.
    pub fn clock_tree(&self) -> Option<&ClockTree> {
        self.clock.as_ref()
    }

    /// The completed image, once `finish` has succeeded.
    pub fn image(&self) -> Option<&SystemImage> {
        self.image.as_ref()
    }

    /// Attach the platform that will grant physical resources.
    pub fn bind_platform(&mut self, platform: impl Platform + 'static) -> Result<()> {
        self.require_state(AssemblyState::Empty, "bind platform")?;
        debug!("assembler '{}': binding platform '{}'", self.board, platform.name());
        self.platform = Some(Box::new(platform));
        self.advance(AssemblyState::PlatformBound);
        Ok(())
    }

    /// Plan the clock tree for `domains` from the board reference clock.
    pub fn plan_clocks(&mut self, reference_hz: u64, domains: &[ClockDomain]) -> Result<&ClockTree> {
        self.require_state(AssemblyState::PlatformBound, "plan clocks")?;
        let tree = match self.planner.plan(reference_hz, domains) {
            Ok(tree) => tree,
            Err(e) => return Err(self.fail(e.into())),
        };
        self.advance(AssemblyState::ClockPlanned);
        Ok(self.clock.insert(tree))
    }

    /// Register every module of `layer`'s chain and claim their platform resources.
    ///
    /// Nothing is committed unless every module registers and every resource
    /// is granted; resources granted before a failure are released.
    pub fn register_modules(&mut self, layer: &CompositionLayer) -> Result<()> {
        self.require_state(AssemblyState::ClockPlanned, "register modules")?;

        let mut granted = Vec::new();
        let staged = match self.platform.as_deref_mut() {
            Some(platform) => stage_modules(platform, layer, &mut granted),
            None => Err(AssemblyError::Sequence {
                operation: "register modules",
                expected: AssemblyState::PlatformBound,
                actual: self.state,
            }),
        };

        match staged {
            Ok((registry, modules)) => {
                debug!(
                    "assembler '{}': staged {} modules from layer '{}', {} resources granted",
                    self.board,
                    modules.len(),
                    layer.name(),
                    granted.len()
                );
                self.registry = registry;
                self.modules = modules;
                self.granted = granted;
                self.advance(AssemblyState::ModulesRegistered);
                Ok(())
            }
            Err(e) => {
                self.release(&granted);
                Err(self.fail(e))
            }
        }
    }

    /// Freeze the address map and build the system image.
    ///
    /// Calling `finish` again returns the same image.
    pub fn finish(&mut self) -> Result<&SystemImage> {
        if self.state != AssemblyState::Resolved {
            self.require_state(AssemblyState::ModulesRegistered, "finish")?;
            let image = match self.build_image() {
                Ok(image) => image,
                Err(e) => return Err(self.fail(e)),
            };
            self.image = Some(image);
            self.advance(AssemblyState::Resolved);
        }
        self.image.as_ref().ok_or(AssemblyError::Sequence {
            operation: "finish",
            expected: AssemblyState::Resolved,
            actual: self.state,
        })
    }

    fn build_image(&mut self) -> Result<SystemImage> {
        let clock = self.clock.clone().ok_or(AssemblyError::Sequence {
            operation: "finish",
            expected: AssemblyState::ClockPlanned,
            actual: self.state,
        })?;
        let platform = self
            .platform
            .as_ref()
            .map(|p| p.name().to_string())
            .unwrap_or_default();

        Ok(SystemImage {
            board: self.board.clone(),
            platform,
            address_map: self.registry.resolve(),
            clock_plan: clock.plan,
            reset_order: clock.reset_order,
            modules: std::mem::take(&mut self.modules),
        })
    }

    fn require_state(&mut self, expected: AssemblyState, operation: &'static str) -> Result<()> {
        if self.state == expected {
            return Ok(());
        }
        let err = AssemblyError::Sequence {
            operation,
            expected,
            actual: self.state,
        };
        if self.state == AssemblyState::Resolved {
            // A finished image stays valid.
            return Err(err);
        }
        Err(self.fail(err))
    }

    fn advance(&mut self, next: AssemblyState) {
        debug_assert!(self.state.can_transition_to(next));
        info!("assembler '{}': {} -> {}", self.board, self.state, next);
        self.state = next;
    }

    /// Abandon the run: discard staged work and return `err` for propagation.
    fn fail(&mut self, err: AssemblyError) -> AssemblyError {
        if self.state != AssemblyState::Failed {
            warn!("assembler '{}' aborted while {}: {err}", self.board, self.state);
        }
        let granted = std::mem::take(&mut self.granted);
        self.release(&granted);
        self.clock = None;
        self.registry = AddressSpaceRegistry::new();
        self.modules.clear();
        self.image = None;
        self.state = AssemblyState::Failed;
        err
    }

    fn release(&mut self, handles: &[ResourceHandle]) {
        if let Some(platform) = self.platform.as_deref_mut() {
            for handle in handles {
                platform.release(handle);
            }
        }
    }
}

/// Register `layer`'s chain into a fresh registry and claim each module's resources.
fn stage_modules(
    platform: &mut dyn Platform,
    layer: &CompositionLayer,
    granted: &mut Vec<ResourceHandle>,
) -> Result<(AddressSpaceRegistry, Vec<ResolvedModule>)> {
    let mut registry = AddressSpaceRegistry::new();
    let mut modules = Vec::new();

    for (declared_in, module) in layer.modules_with_layer() {
        let pinned = registry.register_module(module)?;

        let mut resources = Vec::with_capacity(pinned.resources.len());
        for request in &pinned.resources {
            let handle = platform
                .request_resource(&request.name, request.index)
                .map_err(|denied| AssemblyError::ResourceUnavailable {
                    module: pinned.id.clone(),
                    resource: request.name.clone(),
                    index: request.index,
                    reason: denied.to_string(),
                })?;
            granted.push(handle.clone());
            resources.push(handle);
        }

        modules.push(ResolvedModule {
            control_slot: pinned.fixed_control_slot(),
            interrupt: pinned.interrupt,
            memory: pinned.memory,
            config: pinned.config.clone(),
            layer: declared_in.to_string(),
            resources,
            id: pinned.id,
        });
    }
    Ok((registry, modules))
}
