//! The `finquiz catalog` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use finquiz_client::load_config_from;
use finquiz_core::catalog::{Catalog, CatalogFilter};
use finquiz_core::model::{Difficulty, Test};

pub async fn execute(
    category: Option<String>,
    difficulty: Option<String>,
    search: Option<String>,
    bank: Option<PathBuf>,
    json: bool,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let difficulty = difficulty
        .map(|d| d.parse::<Difficulty>())
        .transpose()
        .map_err(anyhow::Error::msg)?;
    let filter = CatalogFilter {
        category,
        difficulty,
        search,
    };

    let config = load_config_from(config_path.as_deref())?;
    let catalog = super::load(bank.as_deref(), &config).await?;
    let tests = catalog.filter(&filter);
    tracing::debug!(
        ?filter,
        shown = tests.len(),
        total = catalog.tests().len(),
        "catalog filtered"
    );

    if json {
        let listed: Vec<&Test> = tests.iter().map(|t| t.as_ref()).collect();
        println!("{}", serde_json::to_string_pretty(&listed)?);
        return Ok(());
    }

    if tests.is_empty() {
        println!("No tests match.");
        return Ok(());
    }

    println!("{}", render_table(&catalog, &tests));
    println!(
        "{} test(s). Categories: {}",
        tests.len(),
        catalog.categories().join(", ")
    );
    Ok(())
}

fn render_table(catalog: &Catalog, tests: &[std::sync::Arc<Test>]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        "ID",
        "Title",
        "Category",
        "Difficulty",
        "Time",
        "Questions",
        "Points",
        "Status",
    ]);

    for test in tests {
        let status = if catalog.is_completed(&test.id) {
            "done"
        } else if test.is_new {
            "new"
        } else {
            ""
        };
        table.add_row(vec![
            Cell::new(&test.id),
            Cell::new(&test.title),
            Cell::new(&test.category),
            Cell::new(test.difficulty),
            Cell::new(format!("{} min", test.estimated_minutes)),
            Cell::new(test.questions.len()),
            Cell::new(format!(
                "{}/{}",
                catalog.points_for(&test.id),
                test.max_score()
            )),
            Cell::new(status),
        ]);
    }

    table
}
