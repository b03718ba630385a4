use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

/// Fonts made available to the text shaper.
///
/// Fonts referenced by file path at draw time are loaded on demand and do not
/// need to be listed here; this only seeds the database used for family-name
/// lookups.
#[derive(Clone, Debug)]
pub struct FontConfig {
    /// Raw font data to register.
    pub custom_fonts: Vec<CustomFont>,
    /// Font files to register up front.
    pub font_files: Vec<PathBuf>,
    /// Directories to scan for font files.
    pub font_dirs: Vec<PathBuf>,
    /// Whether to load system fonts (default: true).
    pub load_system_fonts: bool,
    /// Concrete families for "sans-serif", in priority order.
    pub sans_serif: Vec<String>,
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            custom_fonts: Vec::new(),
            font_files: Vec::new(),
            font_dirs: Vec::new(),
            load_system_fonts: true,
            sans_serif: vec![
                "DejaVu Sans".into(),
                "Arial".into(),
                "Helvetica".into(),
                "Liberation Sans".into(),
            ],
        }
    }
}

impl FontConfig {
    /// A configuration that loads nothing at all.
    pub fn empty() -> Self {
        Self {
            load_system_fonts: false,
            sans_serif: Vec::new(),
            ..Self::default()
        }
    }
}

/// Raw font file data (TTF/OTF) to register.
#[derive(Clone, Debug)]
pub struct CustomFont {
    /// Arc-wrapped for cheap cloning.
    pub data: Arc<Vec<u8>>,
}

/// Build the [`fontdb::Database`] described by `config`.
pub fn font_config_to_fontdb(config: &FontConfig) -> fontdb::Database {
    let mut db = fontdb::Database::new();

    if config.load_system_fonts {
        db.load_system_fonts();
    }

    for dir in &config.font_dirs {
        db.load_fonts_dir(dir);
    }

    for file in &config.font_files {
        if let Err(err) = db.load_font_file(file) {
            log::warn!(target: "render", "failed to load font {}: {}", file.display(), err);
        }
    }

    for font in &config.custom_fonts {
        db.load_font_data(Vec::from(font.data.as_slice()));
    }

    let available: HashSet<String> = db
        .faces()
        .flat_map(|face| face.families.iter().map(|(family, _lang)| family.clone()))
        .collect();
    if let Some(family) = config.sans_serif.iter().find(|f| available.contains(*f)) {
        db.set_sans_serif_family(family);
    }

    db
}
