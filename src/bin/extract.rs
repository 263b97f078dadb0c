use std::env;
use std::fs::File;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use memmap2::Mmap;

use rbxl_extractor::{extract, ExtractOptions};

fn main() -> Result<()> {
    let mut args = env::args().skip(1);
    let Some(input_path) = args.next() else {
        bail!("usage: extract <place-file> [output-dir]");
    };
    let output_dir = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));

    let file = File::open(&input_path).with_context(|| format!("opening {input_path}"))?;
    let mapped = unsafe { Mmap::map(&file) }.with_context(|| format!("mapping {input_path}"))?;

    let result = extract(&mapped, &output_dir, ExtractOptions::default())?;

    eprintln!(
        "scripts={} images={} sounds={} models={} references={}",
        result.scripts.len(),
        result.images.len(),
        result.sounds.len(),
        result.models.len(),
        result.assets.len(),
    );
    Ok(())
}
