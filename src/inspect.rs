use anyhow::{Context, Result};

use crate::encoder::RECORD_FIELDS;
use crate::pcd::{self, PcdHeader};

pub fn inspect_pcd(path: &str, json: bool) -> Result<()> {
    let header = pcd::read_header(path).with_context(|| format!("failed to read PCD header: {}", path))?;
    if json {
        println!("{}", serde_json::to_string_pretty(&header)?);
    } else {
        print!("{}", render_table(path, &header));
    }
    Ok(())
}

fn render_table(path: &str, header: &PcdHeader) -> String {
    let mut out = String::new();
    out.push_str(&format!("File: {}\n", path));
    out.push_str(&format!(
        "Version: {}, Points: {} ({} x {}), Data: {:?}, Record size: {} bytes\n\n",
        header.version.as_deref().unwrap_or("-"),
        header.points,
        header.width,
        header.height,
        header.data,
        header.record_size()
    ));

    out.push_str(&format!("{:<20} {:>4} {:>4} {:>5}  {}\n", "Field", "Type", "Size", "Count", "Used"));
    out.push_str(&format!("{}\n", "-".repeat(45)));
    for f in &header.fields {
        let used = if f.is_scalar() && RECORD_FIELDS.contains(&f.name.as_str()) {
            "yes"
        } else {
            ""
        };
        out.push_str(&format!(
            "{:<20} {:>4} {:>4} {:>5}  {}\n",
            f.name,
            f.kind.as_char(),
            f.size,
            f.count,
            used
        ));
    }

    let missing: Vec<&str> = RECORD_FIELDS
        .iter()
        .copied()
        .filter(|name| header.field(name).is_none_or(|f| !f.is_scalar()))
        .collect();
    if !missing.is_empty() {
        out.push_str(&format!("\nMissing for conversion: {}\n", missing.join(", ")));
    }
    out
}
