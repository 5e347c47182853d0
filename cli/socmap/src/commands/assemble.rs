//! `socmap assemble`: board file to system image.

use std::path::Path;

use anyhow::{bail, Context, Result};
use log::info;

use socmap_assembler::{assemble_board, load_board, SystemImage};

/// Assemble `board_path` and print or write the image.
pub fn run(board_path: &Path, format: Option<&str>, output: Option<&Path>) -> Result<()> {
    let board = load_board(board_path)
        .with_context(|| format!("failed to load {}", board_path.display()))?;
    let image = assemble_board(&board)
        .with_context(|| format!("assembly of board '{}' failed", board.name))?;
    let rendered = render(&image, format)?;

    match output {
        Some(path) => {
            std::fs::write(path, &rendered)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!("wrote image for '{}' to {}", image.board, path.display());
            println!("{} -> {} (sha256 {})", board.name, path.display(), image.digest_hex()?);
        }
        None => print!("{rendered}"),
    }
    Ok(())
}

/// Render an image in the requested format (default: human).
pub fn render(image: &SystemImage, format: Option<&str>) -> Result<String> {
    match format.unwrap_or("human") {
        "human" => Ok(format!("{image}\nsha256: {}\n", image.digest_hex()?)),
        "json" => Ok(format!("{}\n", image.to_json_pretty()?)),
        other => bail!("unknown format '{other}' (expected 'human' or 'json')"),
    }
}
