//! Integration tests for board descriptions under `boards/`.

use socmap_assembler::config::{build_layers, clock_domains};
use socmap_assembler::{assemble_board, parse_board, validate_board, AssemblyError};
use socmap_clock::{ClockRatio, Phase, Ratio};

const ATLYS: &str = include_str!("../../../boards/atlys-mini.board.toml");
const OPSIS: &str = include_str!("../../../boards/opsis-video.board.toml");

#[test]
fn sample_boards_validate_cleanly() {
    for text in [ATLYS, OPSIS] {
        let board = parse_board(text).unwrap();
        if let Err(issues) = validate_board(&board) {
            panic!("{}: {:?}", board.name, issues);
        }
    }
}

#[test]
fn atlys_mini_image() {
    let image = assemble_board(&parse_board(ATLYS).unwrap()).unwrap();
    assert_eq!(image.board, "atlys-mini");

    let slots: Vec<(u32, &str)> = image
        .address_map
        .control_slots
        .iter()
        .map(|(slot, m)| (*slot, m.as_str()))
        .collect();
    assert_eq!(
        slots,
        [(16, "spiflash"), (17, "ddrphy"), (18, "ethphy"), (19, "ethmac")]
    );
    assert_eq!(image.address_map.interrupts[&2].as_str(), "ethmac");

    let plan = &image.clock_plan;
    assert_eq!(plan.ratio, ClockRatio { multiply: 4, divide: 5 });
    assert_eq!(plan.vco_factor, 8);
    assert_eq!((plan.feedback_multiply, plan.input_divide), (32, 5));
    assert_eq!(plan.taps_used(), 4);
    assert_eq!(plan.output("sdram_half").unwrap().phase, Phase::DEG_270);
    assert_eq!(
        plan.output("sdram_full_rd").unwrap().tap,
        plan.output("sdram_full_wr").unwrap().tap
    );
    assert_eq!(image.reset_order.first().map(String::as_str), Some("por"));
    assert_eq!(image.reset_order.last().map(String::as_str), Some("sys"));

    let ddrphy = image.module("ddrphy").unwrap();
    let config = ddrphy.config.as_ref().unwrap();
    assert_eq!(config["geometry"]["nrows"], 8192);
    assert_eq!(config["timing"]["tRFC"], 127.5);
    assert_eq!(ddrphy.resources[0].name, "ddram");

    let ethphy = image.module("ethphy").unwrap();
    let granted: Vec<&str> = ethphy.resources.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(granted, ["eth_clocks", "eth"]);
}

#[test]
fn opsis_video_pins_next_slots_in_order() {
    let image = assemble_board(&parse_board(OPSIS).unwrap()).unwrap();
    let video: Vec<(&str, Option<u32>)> = image
        .modules
        .iter()
        .filter(|m| m.layer == "video")
        .map(|m| (m.id.as_str(), m.control_slot))
        .collect();
    assert_eq!(
        video,
        [
            ("hdmi_out0", Some(20)),
            ("hdmi_out1", Some(21)),
            ("hdmi_in0", Some(22)),
            ("hdmi_in0_edid_mem", Some(23)),
            ("hdmi_in1", Some(24)),
            ("hdmi_in1_edid_mem", Some(25)),
        ]
    );
    assert_eq!(image.address_map.interrupts[&3].as_str(), "hdmi_in0");
    assert_eq!(image.address_map.interrupts[&4].as_str(), "hdmi_in1");
    assert_eq!(image.module("hdmi_in1").unwrap().resources[0].index, 1);

    let plan = &image.clock_plan;
    assert_eq!(plan.ratio, ClockRatio { multiply: 1, divide: 2 });
    assert_eq!(plan.vco_hz, Ratio::integer(400_000_000));
    assert_eq!((plan.feedback_multiply, plan.input_divide), (4, 1));
    assert_eq!(plan.output("periph").unwrap().tap, plan.output("sys").unwrap().tap);
    assert_eq!(
        image.reset_order,
        [
            "por",
            "sdram_half",
            "sdram_half_shifted",
            "sdram_full_wr",
            "sdram_full_rd",
            "sys",
            "periph"
        ]
    );
}

#[test]
fn layers_compose_in_file_order() {
    let board = parse_board(OPSIS).unwrap();
    let layers = build_layers(&board).unwrap();
    let names: Vec<&str> = layers.iter().map(|l| l.name()).collect();
    assert_eq!(names, ["base", "net", "video"]);
    assert_eq!(layers[2].depth(), 2);
    assert_eq!(layers[2].modules().len(), 10);
    // The base layer is untouched by its descendants.
    assert_eq!(layers[0].address_map().control_slots.len(), 2);

    let domains = clock_domains(&board).unwrap();
    assert_eq!(domains.len(), 7);
    assert!(domains[0].is_primary());
}

#[test]
fn assembly_is_reproducible() {
    let board = parse_board(ATLYS).unwrap();
    let a = assemble_board(&board).unwrap();
    let b = assemble_board(&board).unwrap();
    assert_eq!(a.digest().unwrap(), b.digest().unwrap());

    let other = assemble_board(&parse_board(OPSIS).unwrap()).unwrap();
    assert_ne!(a.digest().unwrap(), other.digest().unwrap());
}

#[test]
fn exhausted_resource_fails_assembly() {
    let text = OPSIS.replace(
        "resources = [{ name = \"hdmi_in\", index = 1 }]",
        "resources = [{ name = \"hdmi_in\", index = 2 }]",
    );
    let err = assemble_board(&parse_board(&text).unwrap()).unwrap_err();
    match err {
        AssemblyError::ResourceUnavailable {
            module,
            resource,
            index,
            ..
        } => {
            assert_eq!(module.as_str(), "hdmi_in1");
            assert_eq!(resource, "hdmi_in");
            assert_eq!(index, 2);
        }
        other => panic!("expected resource denial, got {other:?}"),
    }
}

#[test]
fn relocating_an_inherited_module_is_rejected() {
    let text = format!(
        "{ATLYS}\n[[layer]]\nname = \"moved\"\nparent = \"mini\"\n\n[[layer.module]]\nid = \"ethmac\"\ncontrol-slot = 20\n"
    );
    let err = assemble_board(&parse_board(&text).unwrap()).unwrap_err();
    assert!(matches!(
        err,
        AssemblyError::Registry(socmap_registry::RegistryError::Relocation { .. })
    ));
}
