//! `arb init`: create an arb root.

use std::path::Path;

use anyhow::Result;

use arborist::context::{ARB_DIR, REPOS_SUBDIR};
use arborist::error::ArbError;
use arborist::styling::{eprintln, success_message};

pub fn handle_init(dir: &Path) -> Result<()> {
    let arb_dir = dir.join(ARB_DIR);
    if arb_dir.is_dir() {
        return Err(ArbError::user(format!(
            "{} is already an arb root",
            dir.display()
        ))
        .into());
    }

    std::fs::create_dir_all(arb_dir.join(REPOS_SUBDIR))?;
    // Roots often live inside a repo of their own; keep the clones out of
    // its index.
    std::fs::write(arb_dir.join(".gitignore"), "repos/\n")?;

    eprintln!(
        "{}",
        success_message(format!("Initialized arb root in {}", dir.display()))
    );
    eprintln!("Clone canonical repos with: arb repo clone <url>");
    Ok(())
}
