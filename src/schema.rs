//! Schema command - Print the .bin record layout

use anyhow::Result;

use crate::encoder::{INTENSITY_SCALE, RECORD_SIZE};

/// (byte offset, output value, source PCD field)
pub const LAYOUT: [(usize, &str, &str); 4] = [
    (0, "x", "x"),
    (4, "y", "y"),
    (8, "z", "z"),
    (12, "intensity", "intensity / 256"),
];

/// Print the layout of one record in a .bin file
pub fn print_schema() -> Result<()> {
    println!("pcd2bin record layout ({} bytes, no file header):", RECORD_SIZE);
    println!("---------------------------------------------------------------");
    println!("{:<8} {:<12} {:<10} {}", "Offset", "Value", "Type", "From PCD field");

    for (offset, value, source) in LAYOUT {
        println!("{:<8} {:<12} {:<10} {}", offset, value, "f32 (LE)", source);
    }

    println!();
    println!(
        "Intensity is divided by {} before encoding; record count = file size / {}.",
        INTENSITY_SCALE, RECORD_SIZE
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::RECORD_FIELDS;

    #[test]
    fn test_layout_matches_encoder() {
        assert_eq!(LAYOUT.len() * 4, RECORD_SIZE);
        for (i, (offset, value, _)) in LAYOUT.iter().enumerate() {
            assert_eq!(*offset, i * 4);
            assert_eq!(*value, RECORD_FIELDS[i]);
        }
    }
}
