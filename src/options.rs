// Which output categories the orchestrator produces. Flat, four switches,
// no nested config or file format.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractOptions {
    pub scripts: bool,
    pub models: bool,
    pub sounds: bool,
    pub images: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        ExtractOptions::all()
    }
}

impl ExtractOptions {
    pub fn all() -> Self {
        ExtractOptions {
            scripts: true,
            models: true,
            sounds: true,
            images: true,
        }
    }

    pub fn none() -> Self {
        ExtractOptions {
            scripts: false,
            models: false,
            sounds: false,
            images: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_enables_everything() {
        assert_eq!(ExtractOptions::default(), ExtractOptions::all());
    }

    #[test]
    fn none_disables_everything() {
        let opts = ExtractOptions::none();
        assert!(!opts.scripts && !opts.models && !opts.sounds && !opts.images);
    }
}
