//! Exchanges command - list supported exchange profiles

use anyhow::Result;
use colored::Colorize;
use serde_json::json;

use addrscan_core::Exchange;

use crate::output::create_table;

pub fn run(json: bool) -> Result<()> {
    if json {
        let list: Vec<_> = Exchange::ALL
            .iter()
            .map(|e| json!({ "name": e.as_str(), "baseUrl": e.profile().default_base_url() }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&list)?);
        return Ok(());
    }

    println!("{}", "Supported Exchanges".bold());
    println!();

    let mut table = create_table();
    table.set_header(vec!["Exchange", "Base URL"]);
    for exchange in Exchange::ALL {
        table.add_row(vec![exchange.as_str().to_string(), exchange.profile().default_base_url().to_string()]);
    }
    println!("{}", table);

    Ok(())
}
