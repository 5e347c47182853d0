//! `socmap check`: validate a board file and dry-run its assembly.

use std::path::Path;

use anyhow::{bail, Context, Result};

use socmap_assembler::{assemble_board, load_board, validate_board};

pub fn run(board_path: &Path) -> Result<()> {
    let board = load_board(board_path)
        .with_context(|| format!("failed to load {}", board_path.display()))?;

    if let Err(issues) = validate_board(&board) {
        for issue in &issues {
            println!("  {issue}");
        }
        let errors = issues.iter().filter(|i| i.is_error()).count();
        if errors > 0 {
            bail!("{errors} error(s) in {}", board_path.display());
        }
    }

    let image = assemble_board(&board)
        .with_context(|| format!("dry-run assembly of board '{}' failed", board.name))?;
    println!(
        "{}: ok ({} modules, {} clock outputs on {} taps)",
        board.name,
        image.modules.len(),
        image.clock_plan.outputs.len(),
        image.clock_plan.taps_used()
    );
    Ok(())
}
