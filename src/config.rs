use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub client: ClientConfig,
    pub map: MapConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("carsalesmarket.db"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub static_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            static_dir: PathBuf::from("public"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ClientConfig {
    pub api_url: String,
    /// File path or http(s) URL of the world boundaries FeatureCollection.
    pub geometry: String,
    /// Extra features drawn on top of the base layer with the same styling rules.
    pub overlay: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:3000".to_string(),
            geometry: "public/world.geo.json".to_string(),
            overlay: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MapConfig {
    /// Property names that may carry the ISO code, highest priority first.
    pub code_attributes: Vec<String>,
    pub name_attribute: String,
    pub fill_opacity: f64,
    pub stroke_color: String, // Hex code
    pub stroke_width: u32,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            code_attributes: vec!["adm0_a3_ar".to_string(), "ISO_A3".to_string()],
            name_attribute: "admin".to_string(),
            fill_opacity: 0.8,
            stroke_color: "#ffffff".to_string(),
            stroke_width: 1,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OutputConfig {
    pub map_png: PathBuf,
    pub chart_png: PathBuf,
    pub layer_geojson: PathBuf,
    pub width: u32,
    pub height: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            map_png: PathBuf::from("out/map.png"),
            chart_png: PathBuf::from("out/chart.png"),
            layer_geojson: PathBuf::from("out/layer.geojson"),
            width: 1600,
            height: 800,
        }
    }
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config = Self::from_toml(&content)?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "Failed to parse TOML configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.map.code_attributes.is_empty() {
            bail!("map.code_attributes must name at least one property");
        }
        if !(0.0..=1.0).contains(&self.map.fill_opacity) {
            bail!(
                "map.fill_opacity must be within 0..=1, got {}",
                self.map.fill_opacity
            );
        }
        if crate::color::hex_to_rgb(&self.map.stroke_color).is_none() {
            bail!(
                "map.stroke_color must be a #rrggbb hex color, got {:?}",
                self.map.stroke_color
            );
        }
        if self.output.width == 0 || self.output.height == 0 {
            bail!("output.width and output.height must be nonzero");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.map.code_attributes, vec!["adm0_a3_ar", "ISO_A3"]);
        assert_eq!(config.map.name_attribute, "admin");
        assert!(config.client.overlay.is_none());
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [server]
            port = 8080

            [map]
            code_attributes = ["iso_a3"]
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.static_dir, PathBuf::from("public"));
        assert_eq!(config.map.code_attributes, vec!["iso_a3"]);
        assert_eq!(config.map.fill_opacity, 0.8);
    }

    #[test]
    fn rejects_out_of_range_opacity() {
        let err = AppConfig::from_toml("[map]\nfill_opacity = 1.5\n").unwrap_err();
        assert!(err.to_string().contains("fill_opacity"));
    }

    #[test]
    fn rejects_named_stroke_color() {
        let err = AppConfig::from_toml("[map]\nstroke_color = \"white\"\n").unwrap_err();
        assert!(err.to_string().contains("stroke_color"));
        assert!(AppConfig::from_toml("[map]\nstroke_color = \"#000000\"\n").is_ok());
    }

    #[test]
    fn rejects_empty_attribute_list() {
        assert!(AppConfig::from_toml("[map]\ncode_attributes = []\n").is_err());
    }
}
