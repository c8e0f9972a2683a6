use crate::error::Result;
use crate::registry::{CHECKS, CheckEntry};
use comfy_table::{Cell, Table};

pub struct ListCommand;

impl ListCommand {
    pub fn new() -> Result<Self> {
        Ok(Self)
    }

    pub fn execute(&self) -> Result<()> {
        println!("{}", build_table(CHECKS));
        Ok(())
    }
}

fn build_table(entries: &[CheckEntry]) -> Table {
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_BORDERS_ONLY);
    table.set_header(vec!["Check", "Category", "Description"]);
    for entry in entries {
        table.add_row(vec![
            Cell::new(entry.name),
            Cell::new(entry.category),
            Cell::new(entry.description),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_lists_every_check() {
        let rendered = build_table(CHECKS).to_string();
        for entry in CHECKS {
            assert!(rendered.contains(entry.name), "{}", entry.name);
        }
    }
}
