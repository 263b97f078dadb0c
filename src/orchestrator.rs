// C6: ties C1..C5 together over an input buffer and an options set into a
// categorized extraction result written to disk.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::input::{self, InputFormat};
use crate::instance::InstanceMap;
use crate::options::ExtractOptions;
use crate::parser;
use crate::scavenger::{self, ScavengeOutput};
use crate::script;
use crate::sink;
use crate::value::PropertyValue;

const PROPERTY_NAME_MARKERS: [&str; 3] = ["source", "script", "<protected"];
const LUA_TRIGGER_KEYWORDS: [&str; 5] = ["function", "local", "end", "return", "--"];

#[derive(Debug, Default)]
pub struct ExtractionResult {
    pub scripts: Vec<PathBuf>,
    pub images: Vec<PathBuf>,
    pub sounds: Vec<PathBuf>,
    pub models: Vec<PathBuf>,
    pub assets: Vec<PathBuf>,
    pub sound_refs: Vec<String>,
    pub image_refs: Vec<String>,
    // Set when detect recognized one of the XML-shaped siblings. Carries the
    // detected format back instead of running the binary parser against it.
    pub unsupported_format: Option<InputFormat>,
}

impl ExtractionResult {
    pub fn unsupported_format(format: InputFormat) -> Self {
        ExtractionResult {
            unsupported_format: Some(format),
            ..ExtractionResult::default()
        }
    }
}

// Runs the structured parse first, then the heuristic scavenger over the
// same bytes, writing each category as its candidates are gathered. options
// gates scripts/models/sounds/images; the reference bucket is always
// written when populated.
pub fn extract(data: &[u8], output_dir: &Path, options: ExtractOptions) -> Result<ExtractionResult> {
    let detected = input::detect(data);
    if detected.format != InputFormat::Binary {
        return Ok(ExtractionResult::unsupported_format(detected.format));
    }
    let bytes: &[u8] = &detected.bytes;
    let mut result = ExtractionResult::default();
    let root = output_dir.join("extracted");

    let parsed = parser::parse(bytes)?;

    if options.scripts {
        let candidates = collect_structured_script_candidates(&parsed.instances);
        write_scripts(&root, candidates, &mut result)?;
    }

    let scavenged = scavenger::scavenge(bytes);

    if options.scripts {
        let candidates = collect_heuristic_script_candidates(&scavenged);
        write_scripts(&root, candidates, &mut result)?;
    }

    if options.images {
        write_images(&root, &scavenged, &mut result)?;
        result.image_refs = scavenged.image_refs.clone();
    }

    if options.models {
        write_models(&root, &scavenged, &mut result)?;
    }

    if options.sounds {
        write_sounds(&root, &scavenged, &mut result)?;
        result.sound_refs = scavenged.sound_refs.clone();
    }

    write_references(&root, &scavenged, &mut result)?;

    Ok(result)
}

fn collect_structured_script_candidates(instances: &InstanceMap) -> Vec<String> {
    let mut out = Vec::new();
    for inst in instances.instances.values() {
        for (name, value) in &inst.properties {
            if is_script_property(name, value) {
                if let Some(text) = value.as_script_text() {
                    out.push(text.to_string());
                }
            }
        }
    }
    out
}

fn is_script_property(name: &str, value: &PropertyValue) -> bool {
    let lower_name = name.to_lowercase();
    if PROPERTY_NAME_MARKERS.iter().any(|marker| lower_name.contains(marker)) {
        return true;
    }
    match value.as_script_text() {
        Some(text) => text.len() > 30 && LUA_TRIGGER_KEYWORDS.iter().any(|kw| text.contains(kw)),
        None => false,
    }
}

// Protected-string envelopes, balanced Lua blocks, merged printable
// regions, and keyword-scored printable strings.
fn collect_heuristic_script_candidates(scavenged: &ScavengeOutput) -> Vec<String> {
    let mut out = Vec::new();
    out.extend(scavenged.protected_strings.iter().cloned());
    out.extend(scavenged.lua_blocks.iter().cloned());
    out.extend(scavenged.script_regions.iter().cloned());
    // Strings still carrying a `<ProtectedString` envelope are already
    // captured, tag-stripped, by `protected_strings` above; re-admitting the
    // tagged form here would canonicalize to a distinct (non-deduped) second
    // copy of the same script.
    out.extend(
        scavenged
            .printable_strings
            .iter()
            .filter(|s| {
                s.len() > 30
                    && !s.contains("ProtectedString")
                    && LUA_TRIGGER_KEYWORDS.iter().any(|kw| s.contains(kw))
            })
            .cloned(),
    );
    out
}

fn write_scripts(root: &Path, candidates: Vec<String>, result: &mut ExtractionResult) -> Result<()> {
    if candidates.is_empty() {
        return Ok(());
    }
    let dir = root.join("Scripts");
    for named in script::canonicalize(candidates) {
        let path = sink::write_file(&dir, &named.name, ".lua", named.body.as_bytes())?;
        result.scripts.push(path);
    }
    Ok(())
}

fn write_images(root: &Path, scavenged: &ScavengeOutput, result: &mut ExtractionResult) -> Result<()> {
    let dir = root.join("Images");
    for (i, png) in scavenged.png_images.iter().enumerate() {
        let path = sink::write_file(&dir, &format!("image_{i}"), ".png", png)?;
        result.images.push(path);
    }
    for (i, jpeg) in scavenged.jpeg_images.iter().enumerate() {
        let path = sink::write_file(&dir, &format!("image_{i}"), ".jpg", jpeg)?;
        result.images.push(path);
    }
    Ok(())
}

fn write_models(root: &Path, scavenged: &ScavengeOutput, result: &mut ExtractionResult) -> Result<()> {
    let dir = root.join("Models");
    for (i, model) in scavenged.models.iter().enumerate() {
        let path = sink::write_file(&dir, &format!("model_{i}"), ".model", model.as_bytes())?;
        result.models.push(path);
    }
    Ok(())
}

fn write_sounds(root: &Path, scavenged: &ScavengeOutput, result: &mut ExtractionResult) -> Result<()> {
    let dir = root.join("Sounds");
    for (i, sound) in scavenged.sound_candidates.iter().enumerate() {
        let path = sink::write_file(&dir, &format!("sound_{i}"), ".txt", sound.as_bytes())?;
        result.sounds.push(path);
    }
    Ok(())
}

fn write_references(root: &Path, scavenged: &ScavengeOutput, result: &mut ExtractionResult) -> Result<()> {
    if scavenged.assets.is_empty() {
        return Ok(());
    }
    let dir = root.join("References");
    for (i, asset) in scavenged.assets.iter().enumerate() {
        let path = sink::write_file(&dir, &format!("reference_{i}"), ".txt", asset.as_bytes())?;
        result.assets.push(path);
    }
    Ok(())
}
