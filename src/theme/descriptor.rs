use glam::Vec3;
use serde::Deserialize;

use crate::error::{Result, ViewerError};
use crate::render::TextureUnit;

/// Path of the descriptor document for `name`, relative to the asset root.
pub fn descriptor_path(name: &str) -> String {
    format!("themes/{name}.json")
}

/// Path of a texture referenced by a descriptor.
pub fn image_path(file: &str) -> String {
    format!("img/{file}")
}

/// Lighting constants and material of one theme.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeDescriptor {
    pub light: LightSettings,
    pub material: MaterialSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LightSettings {
    pub color: Vec3,
    pub intensity: f32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialSettings {
    pub ambient_intensity: f32,
    pub specularity: f32,
    pub specular_intensity: f32,
    pub normal_map_scale: f32,
    pub textures: TextureSet,
}

/// Image file names, relative to `img/`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TextureSet {
    pub diffuse: String,
    pub normal: String,
    pub specular: String,
}

impl TextureSet {
    pub fn file(&self, unit: TextureUnit) -> &str {
        match unit {
            TextureUnit::Diffuse => &self.diffuse,
            TextureUnit::Normal => &self.normal,
            TextureUnit::Specular => &self.specular,
        }
    }
}

impl ThemeDescriptor {
    /// Parses and validates the descriptor document of `theme`.
    pub fn from_json(theme: &str, text: &str) -> Result<Self> {
        let descriptor: Self = serde_json::from_str(text).map_err(|err| parse_error(theme, err))?;
        descriptor.validate(theme)?;
        Ok(descriptor)
    }

    fn validate(&self, theme: &str) -> Result<()> {
        let color = self.light.color;
        if !color.is_finite() || color.min_element() < 0.0 || color.max_element() > 1.0 {
            return Err(parse_error(
                theme,
                format!("light.color {color} has a channel outside 0..=1"),
            ));
        }

        let scalars = [
            ("light.intensity", self.light.intensity),
            ("material.ambientIntensity", self.material.ambient_intensity),
            ("material.specularity", self.material.specularity),
            ("material.specularIntensity", self.material.specular_intensity),
            ("material.normalMapScale", self.material.normal_map_scale),
        ];
        for (field, value) in scalars {
            if !value.is_finite() || value < 0.0 {
                return Err(parse_error(
                    theme,
                    format!("{field} must be a non-negative number (got {value})"),
                ));
            }
        }

        for unit in TextureUnit::ALL {
            if self.material.textures.file(unit).trim().is_empty() {
                return Err(parse_error(
                    theme,
                    format!("material.textures has an empty {unit:?} entry"),
                ));
            }
        }
        Ok(())
    }

    /// Asset paths of the three material textures, in texture unit order.
    pub fn image_paths(&self) -> [String; 3] {
        TextureUnit::ALL.map(|unit| image_path(self.material.textures.file(unit)))
    }
}

fn parse_error(theme: &str, reason: impl ToString) -> ViewerError {
    ViewerError::DescriptorParse {
        theme: theme.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: &str = r#"{
        "light": { "color": [1.0, 0.95, 0.9], "intensity": 1.2 },
        "material": {
            "ambientIntensity": 0.1,
            "specularity": 16,
            "specularIntensity": 0.6,
            "normalMapScale": 1.0,
            "textures": {
                "diffuse": "day/diffuse.jpg",
                "normal": "day/normal.png",
                "specular": "day/specular.png"
            }
        }
    }"#;

    #[test]
    fn parses_camel_case_document() {
        let theme = ThemeDescriptor::from_json("realistic-day", DAY).unwrap();
        assert_eq!(theme.light.color, Vec3::new(1.0, 0.95, 0.9));
        assert_eq!(theme.material.specularity, 16.0);
        assert_eq!(
            theme.image_paths(),
            [
                "img/day/diffuse.jpg".to_string(),
                "img/day/normal.png".to_string(),
                "img/day/specular.png".to_string(),
            ]
        );
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = ThemeDescriptor::from_json("broken", "{ \"light\": ").unwrap_err();
        assert!(matches!(err, ViewerError::DescriptorParse { ref theme, .. } if theme == "broken"));
    }

    #[test]
    fn missing_fields_are_rejected() {
        let text = DAY.replace("\"normalMapScale\": 1.0,", "");
        assert!(ThemeDescriptor::from_json("day", &text).is_err());
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let bright = DAY.replace("[1.0, 0.95, 0.9]", "[1.5, 0.95, 0.9]");
        assert!(ThemeDescriptor::from_json("day", &bright).is_err());

        let negative = DAY.replace("\"intensity\": 1.2", "\"intensity\": -1");
        let err = ThemeDescriptor::from_json("day", &negative).unwrap_err();
        assert!(err.to_string().contains("light.intensity"));

        let blank = DAY.replace("day/normal.png", " ");
        assert!(ThemeDescriptor::from_json("day", &blank).is_err());
    }

    #[test]
    fn paths_follow_the_asset_layout() {
        assert_eq!(descriptor_path("abstract-blue"), "themes/abstract-blue.json");
        assert_eq!(image_path("mars.jpg"), "img/mars.jpg");
    }
}
