//! TOML board descriptions.
//!
//! A board file (`*.board.toml`) declares the reference clock, the
//! synthesizer limits, the clock domains, the platform's resource inventory
//! and an ordered list of composition layers. Each layer names its parent,
//! which must be declared earlier in the file.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use socmap_clock::{ClockDomain, Phase, Ratio, SynthesizerLimits};
use socmap_registry::{CompositionLayer, Module, ResourceRequest, SlotRequest};

use crate::assembler::SocAssembler;
use crate::error::{AssemblyError, Result};
use crate::image::SystemImage;
use crate::platform::BoardPlatform;

/// A board description as written in a `.board.toml` file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BoardConfig {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Frequency of the board's reference oscillator in Hz.
    pub reference_hz: u64,
    #[serde(default)]
    pub synthesizer: SynthesizerLimits,
    /// Layer to assemble. Defaults to the last declared layer.
    #[serde(default)]
    pub top: Option<String>,
    #[serde(default, rename = "resource")]
    pub resources: Vec<ResourceDecl>,
    #[serde(default, rename = "domain")]
    pub domains: Vec<DomainDecl>,
    #[serde(default, rename = "layer")]
    pub layers: Vec<LayerDecl>,
}

/// A platform resource and how many instances the board has.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ResourceDecl {
    pub name: String,
    #[serde(default = "default_count")]
    pub count: u32,
}

fn default_count() -> u32 {
    1
}

/// Reset gate of a declared domain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GateDecl {
    #[default]
    Source,
    Primary,
    PllLock,
    PowerOnSettle,
}

/// A phase written either as whole degrees or as an exact `"N/D"` string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PhaseDecl {
    Degrees(u64),
    Exact(String),
}

impl PhaseDecl {
    pub fn to_phase(&self) -> Result<Phase> {
        match self {
            PhaseDecl::Degrees(deg) => Ok(Phase::degrees(*deg)),
            PhaseDecl::Exact(text) => text
                .parse::<Ratio>()
                .map(Phase::from_ratio)
                .map_err(|e| AssemblyError::Validation {
                    detail: format!("phase: {e}"),
                }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DomainDecl {
    pub name: String,
    pub frequency_hz: u64,
    #[serde(default)]
    pub gate: GateDecl,
    /// Counter length for `power-on-settle` domains.
    #[serde(default)]
    pub settle_cycles: Option<u32>,
    #[serde(default)]
    pub asynchronous: bool,
    #[serde(default)]
    pub phase: Option<PhaseDecl>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub shares_tap_with: Option<String>,
}

impl DomainDecl {
    pub fn to_domain(&self) -> Result<ClockDomain> {
        let mut domain = ClockDomain::new(self.name.clone(), self.frequency_hz);
        domain = match self.gate {
            GateDecl::Source => domain,
            GateDecl::Primary => domain.primary(),
            GateDecl::PllLock => domain.pll_lock_gated(),
            GateDecl::PowerOnSettle => {
                let cycles = self.settle_cycles.ok_or_else(|| AssemblyError::Validation {
                    detail: format!("domain '{}' is power-on-settle but has no settle-cycles", self.name),
                })?;
                domain.power_on_settle(cycles)
            }
        };
        if self.asynchronous {
            domain = domain.asynchronous();
        }
        if let Some(phase) = &self.phase {
            domain = domain.with_phase(phase.to_phase()?);
        }
        for dep in &self.depends_on {
            domain = domain.depends_on(dep.clone());
        }
        if let Some(other) = &self.shares_tap_with {
            domain = domain.sharing_tap_with(other.clone());
        }
        Ok(domain)
    }
}

/// A control-slot request: a number, or the keyword `"next"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SlotDecl {
    Fixed(u32),
    Keyword(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ModuleDecl {
    pub id: String,
    #[serde(default)]
    pub control_slot: Option<SlotDecl>,
    #[serde(default)]
    pub interrupt: Option<u32>,
    #[serde(default)]
    pub memory_base: Option<u64>,
    #[serde(default)]
    pub memory_size: Option<u64>,
    #[serde(default)]
    pub resources: Vec<ResourceRequest>,
    /// Opaque configuration, carried into the system image as JSON.
    #[serde(default)]
    pub config: Option<toml::Value>,
}

impl ModuleDecl {
    pub fn to_module(&self) -> Result<Module> {
        let mut module = Module::new(self.id.as_str());
        module.control_slot = match &self.control_slot {
            None => None,
            Some(SlotDecl::Fixed(slot)) => Some(SlotRequest::Fixed(*slot)),
            Some(SlotDecl::Keyword(word)) if word == "next" => Some(SlotRequest::Next),
            Some(SlotDecl::Keyword(word)) => {
                return Err(AssemblyError::Validation {
                    detail: format!(
                        "module '{}': control-slot must be a number or \"next\", got \"{word}\"",
                        self.id
                    ),
                })
            }
        };
        module.interrupt = self.interrupt;
        match (self.memory_base, self.memory_size) {
            (Some(base), Some(size)) => module = module.with_memory(base, size),
            (None, None) => {}
            _ => {
                return Err(AssemblyError::Validation {
                    detail: format!(
                        "module '{}': memory-base and memory-size must be given together",
                        self.id
                    ),
                })
            }
        }
        module.resources = self.resources.clone();
        if let Some(config) = &self.config {
            module = module.with_config(serde_json::to_value(config)?);
        }
        Ok(module)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LayerDecl {
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default, rename = "module")]
    pub modules: Vec<ModuleDecl>,
}

impl BoardConfig {
    /// Name of the layer to assemble.
    pub fn top_layer(&self) -> Option<&str> {
        self.top
            .as_deref()
            .or_else(|| self.layers.last().map(|l| l.name.as_str()))
    }
}

/// A validation issue found in a board description.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Severity: "error" or "warning".
    pub severity: &'static str,
    pub message: String,
}

impl ValidationIssue {
    fn error(message: impl Into<String>) -> Self {
        Self {
            severity: "error",
            message: message.into(),
        }
    }

    fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: "warning",
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == "error"
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.message)
    }
}

/// Load a board from a `.board.toml` file.
pub fn load_board(path: &Path) -> Result<BoardConfig> {
    if !path.exists() {
        return Err(AssemblyError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let content = std::fs::read_to_string(path)?;
    parse_board(&content)
}

/// Parse a board from a TOML string.
pub fn parse_board(toml_str: &str) -> Result<BoardConfig> {
    let board: BoardConfig = toml::from_str(toml_str)?;
    Ok(board)
}

/// Validate a board description for structural correctness.
///
/// Returns `Ok(())` if there is nothing to report, or `Err(issues)` with
/// every error and warning found.
pub fn validate_board(board: &BoardConfig) -> std::result::Result<(), Vec<ValidationIssue>> {
    let mut issues = Vec::new();

    if board.reference_hz == 0 {
        issues.push(ValidationIssue::error("reference-hz must be non-zero"));
    }

    // Resources
    let mut resource_names = BTreeSet::new();
    for r in &board.resources {
        if !resource_names.insert(r.name.as_str()) {
            issues.push(ValidationIssue::error(format!(
                "resource '{}' is declared more than once",
                r.name
            )));
        }
        if r.count == 0 {
            issues.push(ValidationIssue::warning(format!(
                "resource '{}' has count 0 and can never be granted",
                r.name
            )));
        }
    }

    // Clock domains
    if board.domains.is_empty() {
        issues.push(ValidationIssue::error("board declares no clock domains"));
    }
    let domain_names: BTreeSet<&str> = board.domains.iter().map(|d| d.name.as_str()).collect();
    if domain_names.len() != board.domains.len() {
        issues.push(ValidationIssue::error("clock domain names are not unique"));
    }
    let primaries = board
        .domains
        .iter()
        .filter(|d| d.gate == GateDecl::Primary)
        .count();
    match primaries {
        0 if !board.domains.is_empty() => issues.push(ValidationIssue::warning(format!(
            "no primary domain; '{}' defines the system clock",
            board.domains[0].name
        ))),
        n if n > 1 => issues.push(ValidationIssue::warning(format!(
            "{n} primary domains; only the first defines the system clock"
        ))),
        _ => {}
    }
    for d in &board.domains {
        if d.frequency_hz == 0 {
            issues.push(ValidationIssue::error(format!(
                "domain '{}' has frequency 0",
                d.name
            )));
        }
        match (d.gate, d.settle_cycles) {
            (GateDecl::PowerOnSettle, None) => issues.push(ValidationIssue::error(format!(
                "domain '{}' is power-on-settle but has no settle-cycles",
                d.name
            ))),
            (GateDecl::PowerOnSettle, Some(_)) | (_, None) => {}
            (_, Some(_)) => issues.push(ValidationIssue::warning(format!(
                "domain '{}' sets settle-cycles but is not power-on-settle",
                d.name
            ))),
        }
        if let Some(phase) = &d.phase {
            if let Err(e) = phase.to_phase() {
                issues.push(ValidationIssue::error(format!("domain '{}': {e}", d.name)));
            }
        }
        for dep in &d.depends_on {
            if !domain_names.contains(dep.as_str()) {
                issues.push(ValidationIssue::error(format!(
                    "domain '{}' depends on unknown domain '{dep}'",
                    d.name
                )));
            }
        }
        if let Some(other) = &d.shares_tap_with {
            if !domain_names.contains(other.as_str()) {
                issues.push(ValidationIssue::error(format!(
                    "domain '{}' shares the tap of unknown domain '{other}'",
                    d.name
                )));
            }
        }
    }

    // Layers
    if board.layers.is_empty() {
        issues.push(ValidationIssue::error("board declares no layers"));
    }
    let mut seen_layers = BTreeSet::new();
    for layer in &board.layers {
        if let Some(parent) = &layer.parent {
            if !seen_layers.contains(parent.as_str()) {
                issues.push(ValidationIssue::error(format!(
                    "layer '{}' names parent '{parent}', which is not declared before it",
                    layer.name
                )));
            }
        }
        if !seen_layers.insert(layer.name.as_str()) {
            issues.push(ValidationIssue::error(format!(
                "layer '{}' is declared more than once",
                layer.name
            )));
        }
        for m in &layer.modules {
            if let Err(e) = m.to_module() {
                issues.push(ValidationIssue::error(format!("layer '{}': {e}", layer.name)));
            }
            for r in &m.resources {
                if !resource_names.contains(r.name.as_str()) {
                    issues.push(ValidationIssue::error(format!(
                        "module '{}' requests resource '{}', which the board does not have",
                        m.id, r.name
                    )));
                }
            }
        }
    }
    if let Some(top) = &board.top {
        if !seen_layers.contains(top.as_str()) {
            issues.push(ValidationIssue::error(format!("top layer '{top}' is not declared")));
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}

/// Compose every declared layer, in file order.
pub fn build_layers(board: &BoardConfig) -> Result<Vec<Arc<CompositionLayer>>> {
    let mut built: BTreeMap<&str, Arc<CompositionLayer>> = BTreeMap::new();
    let mut layers = Vec::with_capacity(board.layers.len());

    for decl in &board.layers {
        let modules = decl
            .modules
            .iter()
            .map(ModuleDecl::to_module)
            .collect::<Result<Vec<_>>>()?;
        let layer = match &decl.parent {
            None => CompositionLayer::root(decl.name.clone(), modules)?,
            Some(parent) => {
                let parent = built.get(parent.as_str()).ok_or_else(|| AssemblyError::Validation {
                    detail: format!(
                        "layer '{}' names parent '{parent}', which is not declared before it",
                        decl.name
                    ),
                })?;
                parent.extend(decl.name.clone(), modules)?
            }
        };
        debug!("board '{}': built layer '{}'", board.name, decl.name);
        built.insert(decl.name.as_str(), Arc::clone(&layer));
        layers.push(layer);
    }
    Ok(layers)
}

/// Convert every declared domain.
pub fn clock_domains(board: &BoardConfig) -> Result<Vec<ClockDomain>> {
    board.domains.iter().map(DomainDecl::to_domain).collect()
}

/// An in-memory platform with the board's resource inventory.
pub fn platform(board: &BoardConfig) -> BoardPlatform {
    board
        .resources
        .iter()
        .fold(BoardPlatform::new(board.name.clone()), |p, r| {
            p.with_resource(r.name.clone(), r.count)
        })
}

/// Run a complete assembly of `board`'s top layer.
///
/// Validation errors abort before assembly starts; warnings are logged.
pub fn assemble_board(board: &BoardConfig) -> Result<SystemImage> {
    if let Err(issues) = validate_board(board) {
        let (errors, warnings): (Vec<_>, Vec<_>) = issues.into_iter().partition(|i| i.is_error());
        for w in &warnings {
            warn!("board '{}': {}", board.name, w.message);
        }
        if !errors.is_empty() {
            let detail = errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(AssemblyError::Validation { detail });
        }
    }

    let domains = clock_domains(board)?;
    let layers = build_layers(board)?;
    let top_name = board.top_layer().ok_or_else(|| AssemblyError::Validation {
        detail: "board declares no layers".into(),
    })?;
    let top = layers
        .iter()
        .find(|l| l.name() == top_name)
        .ok_or_else(|| AssemblyError::Validation {
            detail: format!("top layer '{top_name}' is not declared"),
        })?;

    let mut assembler = SocAssembler::new(board.name.clone(), board.synthesizer.clone());
    assembler.bind_platform(platform(board))?;
    assembler.plan_clocks(board.reference_hz, &domains)?;
    assembler.register_modules(top)?;
    let image = assembler.finish()?;
    Ok(image.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
name = "minimal"
reference-hz = 100000000

[[resource]]
name = "ddram"

[[domain]]
name = "sys"
frequency-hz = 80000000
gate = "primary"

[[domain]]
name = "por"
frequency-hz = 80000000
gate = "power-on-settle"
settle-cycles = 2047

[[layer]]
name = "base"

[[layer.module]]
id = "ddrphy"
control-slot = 17
resources = [{ name = "ddram" }]

[layer.module.config]
tRP = 2
refresh-interval-ns = 7800
"#;

    #[test]
    fn parse_minimal_board() {
        let board = parse_board(MINIMAL).unwrap();
        assert_eq!(board.name, "minimal");
        assert_eq!(board.reference_hz, 100_000_000);
        assert_eq!(board.synthesizer, SynthesizerLimits::default());
        assert_eq!(board.resources[0].count, 1);
        assert_eq!(board.domains[1].gate, GateDecl::PowerOnSettle);
        assert_eq!(board.layers[0].modules[0].resources[0].index, 0);
        assert_eq!(board.top_layer(), Some("base"));
        assert!(validate_board(&board).is_ok());
    }

    #[test]
    fn config_table_becomes_json() {
        let board = parse_board(MINIMAL).unwrap();
        let module = board.layers[0].modules[0].to_module().unwrap();
        assert_eq!(
            module.config,
            Some(serde_json::json!({ "tRP": 2, "refresh-interval-ns": 7800 }))
        );
    }

    #[test]
    fn slot_keyword() {
        let decl = ModuleDecl {
            id: "hdmi_out0".into(),
            control_slot: Some(SlotDecl::Keyword("next".into())),
            interrupt: None,
            memory_base: None,
            memory_size: None,
            resources: Vec::new(),
            config: None,
        };
        assert_eq!(
            decl.to_module().unwrap().control_slot,
            Some(SlotRequest::Next)
        );

        let bad = ModuleDecl {
            control_slot: Some(SlotDecl::Keyword("last".into())),
            ..decl
        };
        assert!(matches!(
            bad.to_module(),
            Err(AssemblyError::Validation { .. })
        ));
    }

    #[test]
    fn phase_forms() {
        assert_eq!(PhaseDecl::Degrees(270).to_phase().unwrap(), Phase::DEG_270);
        assert_eq!(
            PhaseDecl::Exact("45/2".into()).to_phase().unwrap(),
            Phase::from_ratio(Ratio::new(45, 2).unwrap())
        );
        assert!(PhaseDecl::Exact("a quarter".into()).to_phase().is_err());
    }

    #[test]
    fn validation_reports_structural_problems() {
        let board = parse_board(
            r#"
name = "broken"
reference-hz = 0

[[domain]]
name = "sys"
frequency-hz = 50000000
depends-on = ["ghost"]

[[domain]]
name = "por"
frequency-hz = 50000000
gate = "power-on-settle"

[[layer]]
name = "video"
parent = "base"

[[layer.module]]
id = "hdmi_in0"
memory-base = 0x40000000
resources = [{ name = "hdmi_in" }]
"#,
        )
        .unwrap();

        let issues = validate_board(&board).unwrap_err();
        let errors: Vec<&str> = issues
            .iter()
            .filter(|i| i.is_error())
            .map(|i| i.message.as_str())
            .collect();
        assert!(errors.iter().any(|m| m.contains("reference-hz")));
        assert!(errors.iter().any(|m| m.contains("ghost")));
        assert!(errors.iter().any(|m| m.contains("settle-cycles")));
        assert!(errors.iter().any(|m| m.contains("parent 'base'")));
        assert!(errors.iter().any(|m| m.contains("memory-size")));
        assert!(errors.iter().any(|m| m.contains("hdmi_in")));
        assert!(issues.iter().any(|i| !i.is_error() && i.message.contains("no primary")));

        assert!(matches!(
            assemble_board(&board),
            Err(AssemblyError::Validation { .. })
        ));
    }

    #[test]
    fn assemble_minimal_board() {
        let image = assemble_board(&parse_board(MINIMAL).unwrap()).unwrap();
        assert_eq!(image.board, "minimal");
        assert_eq!(image.address_map.control_slots.get(&17).map(|m| m.as_str()), Some("ddrphy"));
        assert_eq!(image.reset_order, ["por", "sys"]);
        assert_eq!(image.module("ddrphy").unwrap().layer, "base");
    }

    #[test]
    fn load_missing_file() {
        let err = load_board(Path::new("/nonexistent/none.board.toml")).unwrap_err();
        assert!(matches!(err, AssemblyError::NotFound { .. }));
    }

    #[test]
    fn load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("minimal.board.toml");
        std::fs::write(&path, MINIMAL).unwrap();
        let board = load_board(&path).unwrap();
        assert_eq!(board, parse_board(MINIMAL).unwrap());
    }
}
