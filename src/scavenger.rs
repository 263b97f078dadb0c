// C4: best-effort recovery over the raw input buffer, independent of
// whether the structured parser made any progress. Every scan here favors
// false positives over false negatives.

use std::collections::HashSet;

const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];
const JPEG_EOI: [u8; 2] = [0xFF, 0xD9];
const PROTECTED_STRING_OPEN: &str = "<ProtectedString name=\"Source\">";
const PROTECTED_STRING_CLOSE: &str = "</ProtectedString>";
const LUA_WINDOW_BEFORE: usize = 2000;
const LUA_WINDOW_AFTER: usize = 20000;
const PRINTABLE_GAP_TOLERANCE: usize = 64;

pub struct ScavengeOutput {
    pub png_images: Vec<Vec<u8>>,
    pub jpeg_images: Vec<Vec<u8>>,
    pub protected_strings: Vec<String>,
    pub lua_blocks: Vec<String>,
    // Merged printable regions, min cleaned length 120, seeding script recovery.
    pub script_regions: Vec<String>,
    pub sound_refs: Vec<String>,
    pub image_refs: Vec<String>,
    pub assets: Vec<String>,
    pub models: Vec<String>,
    pub sound_candidates: Vec<String>,
    // Raw printable-ASCII runs, min length 8: the seed list for asset-URL,
    // model, and sound classification and for Lua-keyword-scored script candidates.
    pub printable_strings: Vec<String>,
}

// Each scan below reads the same immutable buffer independently, so they
// run pairwise on rayon's pool rather than one after another.
pub fn scavenge(data: &[u8]) -> ScavengeOutput {
    let ((png_images, jpeg_images), (protected_strings, lua_blocks)) = rayon::join(
        || rayon::join(|| find_png_images(data), || find_jpeg_images(data)),
        || rayon::join(|| find_protected_strings(data), || find_lua_blocks(data)),
    );
    let (script_regions, printable_strings) = rayon::join(
        || find_merged_printable_regions(data, 120),
        || find_printable_strings(data, 8),
    );

    let urls = classify_asset_urls(&printable_strings);
    let (models, sound_candidates) = classify_models_and_sounds(&printable_strings);

    ScavengeOutput {
        png_images,
        jpeg_images,
        protected_strings,
        lua_blocks,
        script_regions,
        sound_refs: urls.sound_refs,
        image_refs: urls.image_refs,
        assets: urls.assets,
        models,
        sound_candidates,
        printable_strings,
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn clean_bytes(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).replace('\0', "")
}

pub fn is_printable(byte: u8) -> bool {
    byte == 0x09 || (0x20..=0x7E).contains(&byte)
}

// Scans for the PNG signature and walks chunks to IEND. A malformed walk
// skips past the signature and resumes scanning one byte later.
pub fn find_png_images(data: &[u8]) -> Vec<Vec<u8>> {
    let mut out = Vec::new();
    let mut pos = 0;
    while pos < data.len() {
        let Some(rel) = find_subslice(&data[pos..], &PNG_SIGNATURE) else {
            break;
        };
        let hit = pos + rel;
        match walk_png_chunks(data, hit + PNG_SIGNATURE.len()) {
            Some(end) => {
                out.push(data[hit..end].to_vec());
                pos = end;
            }
            None => pos = hit + 1,
        }
    }
    out
}

fn walk_png_chunks(data: &[u8], mut cursor: usize) -> Option<usize> {
    loop {
        if cursor + 8 > data.len() {
            return None;
        }
        let length = u32::from_be_bytes(data[cursor..cursor + 4].try_into().unwrap()) as usize;
        let chunk_type = &data[cursor + 4..cursor + 8];
        let data_end = (cursor + 8).checked_add(length)?;
        let crc_end = data_end.checked_add(4)?;
        if crc_end > data.len() {
            return None;
        }
        if chunk_type == b"IEND" {
            return Some(crc_end);
        }
        cursor = crc_end;
    }
}

// FF D8 through the next FF D9, inclusive. No internal structure check.
pub fn find_jpeg_images(data: &[u8]) -> Vec<Vec<u8>> {
    let mut out = Vec::new();
    let mut pos = 0;
    while pos < data.len() {
        let Some(rel) = find_subslice(&data[pos..], &JPEG_SOI) else {
            break;
        };
        let hit = pos + rel;
        let search_from = hit + JPEG_SOI.len();
        match find_subslice(&data[search_from..], &JPEG_EOI) {
            Some(rel_end) => {
                let end = search_from + rel_end + JPEG_EOI.len();
                out.push(data[hit..end].to_vec());
                pos = end;
            }
            None => break,
        }
    }
    out
}

// Direct search for <ProtectedString name="Source">...</ProtectedString>.
pub fn find_protected_strings(data: &[u8]) -> Vec<String> {
    let mut out = Vec::new();
    let mut pos = 0;
    while pos < data.len() {
        let Some(rel) = find_subslice(&data[pos..], PROTECTED_STRING_OPEN.as_bytes()) else {
            break;
        };
        let body_start = pos + rel + PROTECTED_STRING_OPEN.len();
        match find_subslice(&data[body_start..], PROTECTED_STRING_CLOSE.as_bytes()) {
            Some(rel_close) => {
                let body_end = body_start + rel_close;
                out.push(clean_bytes(&data[body_start..body_end]));
                pos = body_end + PROTECTED_STRING_CLOSE.len();
            }
            None => break,
        }
    }
    out
}

// For each function hit, widens a window and counts function/end occurrences
// until the balance closes. Literal substring counting, also matches inside
// append/friend.
pub fn find_lua_blocks(data: &[u8]) -> Vec<String> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    let mut pos = 0;
    while pos < data.len() {
        let Some(rel) = find_subslice(&data[pos..], b"function") else {
            break;
        };
        let hit = pos + rel;
        let window_start = hit.saturating_sub(LUA_WINDOW_BEFORE);
        let window_end = (hit + LUA_WINDOW_AFTER).min(data.len());
        let window = clean_bytes(&data[window_start..window_end]);

        if let Some(block) = extract_balanced_block(&window) {
            if block.len() >= 30 && seen.insert(block.clone()) {
                out.push(block);
            }
        }
        pos = hit + "function".len();
    }
    out
}

fn extract_balanced_block(text: &str) -> Option<String> {
    let start = text.find("function")?;
    let mut func_count = 0usize;
    let mut end_count = 0usize;
    let mut cursor = start;

    loop {
        let next_function = text[cursor..].find("function").map(|i| cursor + i);
        let next_end = text[cursor..].find("end").map(|i| cursor + i);

        let (pos, is_function) = match (next_function, next_end) {
            (Some(f), Some(e)) if f <= e => (f, true),
            (Some(f), None) => (f, true),
            (None, Some(e)) => (e, false),
            (Some(_), Some(e)) => (e, false),
            (None, None) => return None,
        };

        if is_function {
            func_count += 1;
            cursor = pos + "function".len();
        } else {
            end_count += 1;
            cursor = pos + "end".len();
            if end_count >= func_count {
                return Some(text[start..cursor].to_string());
            }
        }
    }
}

// Greedily extends printable runs, tolerating gaps of up to
// PRINTABLE_GAP_TOLERANCE non-printable bytes before closing the run.
pub fn find_merged_printable_regions(data: &[u8], min_len: usize) -> Vec<String> {
    let mut out = Vec::new();
    let n = data.len();
    let mut i = 0;
    while i < n {
        if !is_printable(data[i]) {
            i += 1;
            continue;
        }
        let start = i;
        let mut end = i + 1;
        let mut cursor = end;
        loop {
            if cursor >= n {
                break;
            }
            if is_printable(data[cursor]) {
                cursor += 1;
                end = cursor;
                continue;
            }
            let gap_start = cursor;
            let mut gap_len = 0usize;
            while cursor < n && !is_printable(data[cursor]) && gap_len < PRINTABLE_GAP_TOLERANCE {
                cursor += 1;
                gap_len += 1;
            }
            if cursor < n && !is_printable(data[cursor]) {
                cursor = gap_start;
                break;
            }
        }
        let text = clean_bytes(&data[start..end]);
        if text.len() >= min_len {
            out.push(text);
        }
        i = end.max(start + 1);
    }
    out
}

// All runs of printable bytes at least min_len long.
pub fn find_printable_strings(data: &[u8], min_len: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut start = None;
    for (i, &byte) in data.iter().enumerate() {
        if is_printable(byte) {
            start.get_or_insert(i);
        } else if let Some(s) = start.take() {
            if i - s >= min_len {
                out.push(clean_bytes(&data[s..i]));
            }
        }
    }
    if let Some(s) = start {
        if data.len() - s >= min_len {
            out.push(clean_bytes(&data[s..]));
        }
    }
    out
}

pub struct UrlClassification {
    pub sound_refs: Vec<String>,
    pub image_refs: Vec<String>,
    pub assets: Vec<String>,
}

const URL_MARKERS: [&str; 7] = ["rbxasset", "http", "www", ".com", "asset", "sound", "image"];

pub fn classify_asset_urls(strings: &[String]) -> UrlClassification {
    let mut sound_refs = Vec::new();
    let mut image_refs = Vec::new();
    let mut assets = Vec::new();
    for s in strings {
        let lower = s.to_lowercase();
        if !URL_MARKERS.iter().any(|marker| lower.contains(marker)) {
            continue;
        }
        if lower.contains("sound") {
            sound_refs.push(s.clone());
        } else if lower.contains("image") {
            image_refs.push(s.clone());
        } else {
            assets.push(s.clone());
        }
    }
    UrlClassification { sound_refs, image_refs, assets }
}

pub fn classify_models_and_sounds(strings: &[String]) -> (Vec<String>, Vec<String>) {
    let mut models = Vec::new();
    let mut sounds = Vec::new();
    for s in strings {
        if s.contains("<Model") || s.contains("<Part") {
            models.push(s.clone());
        }
        let lower = s.to_lowercase();
        if s.contains("SoundId") || lower.contains("sound") || lower.contains("wav") {
            sounds.push(s.clone());
        }
    }
    (models, sounds)
}
