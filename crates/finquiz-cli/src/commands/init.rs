//! The `finquiz init` command.

use std::path::Path;

use anyhow::Result;

pub fn execute() -> Result<()> {
    if Path::new("finquiz.toml").exists() {
        println!("finquiz.toml already exists, skipping.");
    } else {
        std::fs::write("finquiz.toml", SAMPLE_CONFIG)?;
        println!("Created finquiz.toml");
    }

    std::fs::create_dir_all("banks")?;
    let example_path = Path::new("banks/example.toml");
    if example_path.exists() {
        println!("banks/example.toml already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_BANK)?;
        println!("Created banks/example.toml");
    }

    println!("\nNext steps:");
    println!("  1. Edit finquiz.toml with your platform and oracle URLs");
    println!("  2. Run: finquiz validate --bank banks/example.toml");
    println!("  3. Run: finquiz take --bank banks/example.toml --test budgeting-101");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# finquiz configuration

[platform]
base_url = "http://localhost:3000"
tests_path = "/api/tests-list"
points_path = "/api/user-points"
submit_path = "/api/user-points"
timeout_secs = 30

[oracle]
base_url = "http://127.0.0.1:8000"
evaluate_path = "/ask-ai"
timeout_secs = 60

[session]
# "soft" shows the clock only; "enforce" ends the session at zero.
deadline = "soft"
allow_retry_after_failure = true

[auth]
user_id = "1"
token = "${FINQUIZ_TOKEN}"
"#;

const EXAMPLE_BANK: &str = r#"[[tests]]
id = "budgeting-101"
title = "Budgeting 101"
description = "Plan a monthly budget and build an emergency fund"
difficulty = "easy"
estimated_time = 10
category = "Budgeting"
is_new = true
questions = [
    "What is a budget, and why is it useful for managing personal finances?",
    "Explain the 50/30/20 rule and give an example of how you would apply it.",
    "What is an emergency fund, and how many months of expenses should it cover?",
]

[[tests]]
id = "investing-basics"
title = "Investing Basics"
description = "Stocks, bonds, diversification and compound growth"
difficulty = "medium"
estimated_time = 15
category = "Investing"
questions = [
    "What is the difference between a stock and a bond?",
    "Why does diversification reduce risk in a portfolio?",
    "How does compound interest affect long-term savings?",
]
"#;
