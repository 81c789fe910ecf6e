//! The `finquiz validate` command.

use std::path::PathBuf;

use anyhow::Result;

pub fn execute(bank_path: PathBuf) -> Result<()> {
    let tests = if bank_path.is_dir() {
        finquiz_core::parser::load_bank(&bank_path)?
    } else {
        finquiz_core::parser::parse_bank(&bank_path)?
    };

    for test in &tests {
        println!(
            "Test: {} [{}] ({} questions, {} min)",
            test.title,
            test.id,
            test.questions.len(),
            test.estimated_minutes
        );
    }

    let warnings = finquiz_core::parser::validate_bank(&tests);
    for w in &warnings {
        let prefix = w
            .test_id
            .as_ref()
            .map(|id| format!("  [{id}]"))
            .unwrap_or_else(|| "  ".to_string());
        println!("{prefix} WARNING: {}", w.message);
    }

    if warnings.is_empty() {
        println!("All {} test(s) valid.", tests.len());
    } else {
        println!("\n{} warning(s) found.", warnings.len());
    }

    Ok(())
}
