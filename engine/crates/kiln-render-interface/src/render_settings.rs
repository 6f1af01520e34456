use std::path::Path;

use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to read render settings {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse render settings: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid render settings: {0}")]
    Invalid(String),
}

/// bindless 描述符表的容量
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BindlessSettings {
    pub max_textures: u32,
    pub max_storage_buffers: u32,
    pub max_uniform_buffers: u32,
}
impl Default for BindlessSettings {
    fn default() -> Self {
        Self {
            max_textures: 16384,
            max_storage_buffers: 4096,
            max_uniform_buffers: 1024,
        }
    }
}

/// GPU 剔除管线的设置
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CullingSettings {
    /// 每帧最多提交的物体数量，决定 buffer 的大小
    pub max_objects: u32,
    /// compute shader 的 workgroup 大小，以 specialization constant 传给 shader
    pub workgroup_size: u32,
    /// 投影矩阵的深度范围是否为 [0, 1]（Vulkan 约定），否则为 [-1, 1]
    pub depth_zero_to_one: bool,
}
impl Default for CullingSettings {
    fn default() -> Self {
        Self {
            max_objects: 100_000,
            workgroup_size: 64,
            depth_zero_to_one: true,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    pub bindless: BindlessSettings,
    pub culling: CullingSettings,
}
impl RenderSettings {
    pub fn from_toml_str(text: &str) -> Result<Self, SettingsError> {
        let settings: Self = toml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let settings = Self::from_toml_str(&text)?;
        log::info!("load render settings from {}: {:?}", path.display(), settings);
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.culling.workgroup_size == 0 {
            return Err(SettingsError::Invalid("culling.workgroup_size must be > 0".to_string()));
        }
        if self.culling.max_objects == 0 {
            return Err(SettingsError::Invalid("culling.max_objects must be > 0".to_string()));
        }
        let bindless = &self.bindless;
        if bindless.max_textures == 0 || bindless.max_storage_buffers == 0 || bindless.max_uniform_buffers == 0 {
            return Err(SettingsError::Invalid("bindless capacities must be > 0".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let settings = RenderSettings::from_toml_str("").unwrap();
        assert_eq!(settings, RenderSettings::default());
        assert_eq!(settings.culling.max_objects, 100_000);
        assert_eq!(settings.culling.workgroup_size, 64);
    }

    #[test]
    fn test_partial_toml() {
        let settings = RenderSettings::from_toml_str(
            r#"
            [bindless]
            max_textures = 256

            [culling]
            max_objects = 1024
            depth_zero_to_one = false
            "#,
        )
        .unwrap();
        assert_eq!(settings.bindless.max_textures, 256);
        assert_eq!(settings.bindless.max_storage_buffers, BindlessSettings::default().max_storage_buffers);
        assert_eq!(settings.culling.max_objects, 1024);
        assert_eq!(settings.culling.workgroup_size, 64);
        assert!(!settings.culling.depth_zero_to_one);
    }

    #[test]
    fn test_invalid_settings() {
        assert!(matches!(
            RenderSettings::from_toml_str("[culling]\nworkgroup_size = 0"),
            Err(SettingsError::Invalid(_))
        ));
        assert!(matches!(RenderSettings::from_toml_str("[culling]\nmax_objects = \"x\""), Err(SettingsError::Parse(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let path = std::env::temp_dir().join("kiln-render-settings-does-not-exist.toml");
        assert!(matches!(RenderSettings::load(path), Err(SettingsError::Io { .. })));
    }
}
