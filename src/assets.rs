use std::io::ErrorKind;
use std::path::PathBuf;

use crate::error::StoreError;

const CUSTOM_CSS: &str = "custom.css";

/// Theme stylesheets and the user's custom stylesheet.
#[derive(Debug, Clone)]
pub struct AssetStore {
    ui_dir: PathBuf,
    themes_dir: PathBuf,
}

impl AssetStore {
    pub fn new(ui_dir: impl Into<PathBuf>, themes_dir: impl Into<PathBuf>) -> Self {
        Self {
            ui_dir: ui_dir.into(),
            themes_dir: themes_dir.into(),
        }
    }

    /// Names of the `*.css` files in the themes directory, sorted.
    pub async fn themes(&self) -> Result<Vec<String>, StoreError> {
        let mut entries = match tokio::fs::read_dir(&self.themes_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&self.themes_dir, e)),
        };

        let mut themes = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::io(&self.themes_dir, e))?
        {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("css") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                themes.push(stem.to_string());
            }
        }

        themes.sort();
        Ok(themes)
    }

    pub async fn custom_css(&self) -> Result<String, StoreError> {
        let path = self.custom_css_path();
        match tokio::fs::read_to_string(&path).await {
            Ok(css) => Ok(css),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }

    pub async fn set_custom_css(&self, css: Vec<u8>) -> Result<(), StoreError> {
        let css = String::from_utf8(css)?;
        let path = self.custom_css_path();
        tokio::fs::write(&path, css)
            .await
            .map_err(|e| StoreError::io(&path, e))
    }

    fn custom_css_path(&self) -> PathBuf {
        self.ui_dir.join(CUSTOM_CSS)
    }
}
