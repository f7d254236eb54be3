//! Per-frame render settings.
//!
//! Pass gating never reads console variables directly. The producer takes a
//! [`RenderSettings`] snapshot from [`ConsoleVariables`] when it builds a
//! scene proxy, so every decision made while rendering that frame sees the
//! same values even if a variable changes mid-frame.
//!
//! ```ignore
//! let mut cvars = ConsoleVariables::new();
//! RenderSettings::register_cvars(&mut cvars)?;
//! cvars.set("r.Bloom", false)?;
//! let settings = RenderSettings::from_cvars(&cvars);
//! assert!(!settings.bloom);
//! ```

use serde::{Deserialize, Serialize};

use lumen_core::cvars::{CVarError, ConsoleVariables};

/// Super-resolution quality mode.
///
/// Each mode renders at the working size divided by its factor and upsamples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuperResolutionMode {
    /// Render at working size.
    #[default]
    Off,
    /// Factor 1.3.
    UltraQuality,
    /// Factor 1.5.
    Quality,
    /// Factor 1.7.
    Balanced,
    /// Factor 2.0.
    Performance,
}

impl SuperResolutionMode {
    /// Map the `r.SuperResolution` index; out-of-range values disable upscaling.
    pub fn from_index(index: i64) -> Self {
        match index {
            1 => Self::UltraQuality,
            2 => Self::Quality,
            3 => Self::Balanced,
            4 => Self::Performance,
            _ => Self::Off,
        }
    }

    /// Index used by `r.SuperResolution`.
    pub fn index(self) -> u8 {
        match self {
            Self::Off => 0,
            Self::UltraQuality => 1,
            Self::Quality => 2,
            Self::Balanced => 3,
            Self::Performance => 4,
        }
    }

    /// Ratio of working size to internal render size.
    pub fn factor(self) -> f32 {
        match self {
            Self::Off => 1.0,
            Self::UltraQuality => 1.3,
            Self::Quality => 1.5,
            Self::Balanced => 1.7,
            Self::Performance => 2.0,
        }
    }

    /// Whether upscaling runs.
    pub fn is_enabled(self) -> bool {
        self != Self::Off
    }
}

/// Anti-aliasing technique. FXAA and TAA are mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AntiAliasingMode {
    /// No anti-aliasing.
    Off,
    /// Fast approximate anti-aliasing.
    Fxaa,
    /// Temporal anti-aliasing.
    #[default]
    Taa,
}

impl AntiAliasingMode {
    /// Map the `r.AntiAliasing` index.
    pub fn from_index(index: i64) -> Self {
        match index {
            1 => Self::Fxaa,
            2 => Self::Taa,
            _ => Self::Off,
        }
    }
}

/// Immutable settings snapshot for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RenderSettings {
    /// Working size as a percentage of the output size.
    pub resolution_scale_percent: u32,
    /// Super-resolution mode.
    pub super_resolution: SuperResolutionMode,
    /// Depth-only pre-pass before the G-buffer.
    pub depth_prepass: bool,
    /// Directional and omni shadows.
    pub shadows: bool,
    /// Directional shadow map size per cascade.
    pub shadow_map_size: u32,
    /// Number of directional cascades.
    pub shadow_cascades: u32,
    /// Omni shadow cube face size.
    pub omni_shadow_size: u32,
    /// Maximum point lights with shadows per frame.
    pub max_omni_shadows: u32,
    /// Volumetric clouds.
    pub volumetric_clouds: bool,
    /// God rays from the sun.
    pub god_rays: bool,
    /// Screen-space ambient occlusion.
    pub ssao: bool,
    /// Direct lighting.
    pub direct_lighting: bool,
    /// Indirect (probe and sky) lighting.
    pub indirect_lighting: bool,
    /// Emissive resolve.
    pub emissive: bool,
    /// Screen-space reflections.
    pub ssr: bool,
    /// Bloom.
    pub bloom: bool,
    /// Bloom blend weight.
    pub bloom_intensity: f32,
    /// Anti-aliasing technique.
    pub anti_aliasing: AntiAliasingMode,
    /// Depth of field.
    pub depth_of_field: bool,
    /// Depth of field focus distance in meters.
    pub dof_focus_distance: f32,
    /// Exposure multiplier applied before tone mapping.
    pub exposure: f32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            resolution_scale_percent: 100,
            super_resolution: SuperResolutionMode::Off,
            depth_prepass: true,
            shadows: true,
            shadow_map_size: 2048,
            shadow_cascades: 4,
            omni_shadow_size: 512,
            max_omni_shadows: 4,
            volumetric_clouds: true,
            god_rays: true,
            ssao: true,
            direct_lighting: true,
            indirect_lighting: true,
            emissive: true,
            ssr: true,
            bloom: true,
            bloom_intensity: 0.04,
            anti_aliasing: AntiAliasingMode::Taa,
            depth_of_field: false,
            dof_focus_distance: 10.0,
            exposure: 1.0,
        }
    }
}

/// Range of `r.ResolutionScale`.
pub const RESOLUTION_SCALE_RANGE: std::ops::RangeInclusive<u32> = 10..=200;
/// Maximum directional cascades.
pub const MAX_SHADOW_CASCADES: u32 = 4;

impl RenderSettings {
    /// Register every renderer console variable with its default value.
    ///
    /// # Errors
    ///
    /// Fails if a name is already registered with a different type.
    pub fn register_cvars(cvars: &mut ConsoleVariables) -> Result<(), CVarError> {
        let d = Self::default();
        cvars.register(
            "r.ResolutionScale",
            d.resolution_scale_percent as i64,
            "Working resolution in percent of the output (10-200)",
        )?;
        cvars.register(
            "r.SuperResolution",
            d.super_resolution.index() as i64,
            "0 off, 1 ultra quality, 2 quality, 3 balanced, 4 performance",
        )?;
        cvars.register("r.DepthPrepass", d.depth_prepass, "Depth-only pre-pass")?;
        cvars.register("r.Shadows", d.shadows, "Shadow maps")?;
        cvars.register(
            "r.Shadows.MapSize",
            d.shadow_map_size as i64,
            "Directional shadow map size per cascade",
        )?;
        cvars.register(
            "r.Shadows.Cascades",
            d.shadow_cascades as i64,
            "Directional shadow cascades (1-4)",
        )?;
        cvars.register(
            "r.Shadows.OmniSize",
            d.omni_shadow_size as i64,
            "Point light shadow cube face size",
        )?;
        cvars.register(
            "r.Shadows.MaxOmni",
            d.max_omni_shadows as i64,
            "Maximum shadowed point lights",
        )?;
        cvars.register("r.Clouds", d.volumetric_clouds, "Volumetric clouds")?;
        cvars.register("r.GodRays", d.god_rays, "God rays")?;
        cvars.register("r.SSAO", d.ssao, "Screen-space ambient occlusion")?;
        cvars.register("r.DirectLighting", d.direct_lighting, "Direct lighting")?;
        cvars.register("r.IndirectLighting", d.indirect_lighting, "Indirect lighting")?;
        cvars.register("r.Emissive", d.emissive, "Emissive resolve")?;
        cvars.register("r.SSR", d.ssr, "Screen-space reflections")?;
        cvars.register("r.Bloom", d.bloom, "Bloom")?;
        cvars.register(
            "r.Bloom.Intensity",
            d.bloom_intensity as f64,
            "Bloom blend weight",
        )?;
        cvars.register(
            "r.AntiAliasing",
            2i64,
            "0 off, 1 FXAA, 2 TAA",
        )?;
        cvars.register("r.DepthOfField", d.depth_of_field, "Depth of field")?;
        cvars.register(
            "r.DepthOfField.FocusDistance",
            d.dof_focus_distance as f64,
            "Focus distance in meters",
        )?;
        cvars.register("r.Exposure", d.exposure as f64, "Exposure multiplier")?;
        Ok(())
    }

    /// Snapshot the current console variable values.
    ///
    /// Variables that are missing or have the wrong type fall back to their
    /// defaults with a warning.
    pub fn from_cvars(cvars: &ConsoleVariables) -> Self {
        let d = Self::default();
        let reader = CVarReader { cvars };
        Self {
            resolution_scale_percent: reader
                .int("r.ResolutionScale", d.resolution_scale_percent as i64)
                .clamp(*RESOLUTION_SCALE_RANGE.start() as i64, *RESOLUTION_SCALE_RANGE.end() as i64)
                as u32,
            super_resolution: SuperResolutionMode::from_index(
                reader.int("r.SuperResolution", d.super_resolution.index() as i64),
            ),
            depth_prepass: reader.bool("r.DepthPrepass", d.depth_prepass),
            shadows: reader.bool("r.Shadows", d.shadows),
            shadow_map_size: reader.int("r.Shadows.MapSize", d.shadow_map_size as i64).max(1) as u32,
            shadow_cascades: reader
                .int("r.Shadows.Cascades", d.shadow_cascades as i64)
                .clamp(1, MAX_SHADOW_CASCADES as i64) as u32,
            omni_shadow_size: reader.int("r.Shadows.OmniSize", d.omni_shadow_size as i64).max(1) as u32,
            max_omni_shadows: reader.int("r.Shadows.MaxOmni", d.max_omni_shadows as i64).max(0) as u32,
            volumetric_clouds: reader.bool("r.Clouds", d.volumetric_clouds),
            god_rays: reader.bool("r.GodRays", d.god_rays),
            ssao: reader.bool("r.SSAO", d.ssao),
            direct_lighting: reader.bool("r.DirectLighting", d.direct_lighting),
            indirect_lighting: reader.bool("r.IndirectLighting", d.indirect_lighting),
            emissive: reader.bool("r.Emissive", d.emissive),
            ssr: reader.bool("r.SSR", d.ssr),
            bloom: reader.bool("r.Bloom", d.bloom),
            bloom_intensity: reader.float("r.Bloom.Intensity", d.bloom_intensity),
            anti_aliasing: AntiAliasingMode::from_index(reader.int("r.AntiAliasing", 2)),
            depth_of_field: reader.bool("r.DepthOfField", d.depth_of_field),
            dof_focus_distance: reader.float("r.DepthOfField.FocusDistance", d.dof_focus_distance),
            exposure: reader.float("r.Exposure", d.exposure),
        }
    }

    /// Apply a per-proxy override on top of this snapshot.
    pub fn with_override(&self, o: &SettingsOverride) -> Self {
        let mut s = *self;
        if let Some(v) = o.resolution_scale_percent {
            s.resolution_scale_percent =
                v.clamp(*RESOLUTION_SCALE_RANGE.start(), *RESOLUTION_SCALE_RANGE.end());
        }
        if let Some(v) = o.super_resolution {
            s.super_resolution = v;
        }
        macro_rules! apply {
            ($($field:ident),* $(,)?) => {
                $(if let Some(v) = o.$field { s.$field = v; })*
            };
        }
        apply!(
            depth_prepass,
            shadows,
            volumetric_clouds,
            god_rays,
            ssao,
            direct_lighting,
            indirect_lighting,
            emissive,
            ssr,
            bloom,
            bloom_intensity,
            anti_aliasing,
            depth_of_field,
            dof_focus_distance,
            exposure,
        );
        s
    }
}

/// Optional per-proxy settings that take precedence over the snapshot.
///
/// Scene captures use this to turn off effects that make no sense in a
/// probe, such as temporal anti-aliasing or depth of field.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsOverride {
    /// See [`RenderSettings::resolution_scale_percent`].
    pub resolution_scale_percent: Option<u32>,
    /// See [`RenderSettings::super_resolution`].
    pub super_resolution: Option<SuperResolutionMode>,
    /// See [`RenderSettings::depth_prepass`].
    pub depth_prepass: Option<bool>,
    /// See [`RenderSettings::shadows`].
    pub shadows: Option<bool>,
    /// See [`RenderSettings::volumetric_clouds`].
    pub volumetric_clouds: Option<bool>,
    /// See [`RenderSettings::god_rays`].
    pub god_rays: Option<bool>,
    /// See [`RenderSettings::ssao`].
    pub ssao: Option<bool>,
    /// See [`RenderSettings::direct_lighting`].
    pub direct_lighting: Option<bool>,
    /// See [`RenderSettings::indirect_lighting`].
    pub indirect_lighting: Option<bool>,
    /// See [`RenderSettings::emissive`].
    pub emissive: Option<bool>,
    /// See [`RenderSettings::ssr`].
    pub ssr: Option<bool>,
    /// See [`RenderSettings::bloom`].
    pub bloom: Option<bool>,
    /// See [`RenderSettings::bloom_intensity`].
    pub bloom_intensity: Option<f32>,
    /// See [`RenderSettings::anti_aliasing`].
    pub anti_aliasing: Option<AntiAliasingMode>,
    /// See [`RenderSettings::depth_of_field`].
    pub depth_of_field: Option<bool>,
    /// See [`RenderSettings::dof_focus_distance`].
    pub dof_focus_distance: Option<f32>,
    /// See [`RenderSettings::exposure`].
    pub exposure: Option<f32>,
}

impl SettingsOverride {
    /// Override used for scene captures: no temporal or lens effects.
    pub fn capture() -> Self {
        Self {
            anti_aliasing: Some(AntiAliasingMode::Off),
            depth_of_field: Some(false),
            super_resolution: Some(SuperResolutionMode::Off),
            resolution_scale_percent: Some(100),
            ..Self::default()
        }
    }
}

struct CVarReader<'a> {
    cvars: &'a ConsoleVariables,
}

impl CVarReader<'_> {
    fn bool(&self, name: &str, default: bool) -> bool {
        self.cvars.get_bool(name).unwrap_or_else(|err| {
            log::warn!("RenderSettings: {err}, using default {default}");
            default
        })
    }

    fn int(&self, name: &str, default: i64) -> i64 {
        self.cvars.get_int(name).unwrap_or_else(|err| {
            log::warn!("RenderSettings: {err}, using default {default}");
            default
        })
    }

    fn float(&self, name: &str, default: f32) -> f32 {
        self.cvars
            .get_float(name)
            .map(|v| v as f32)
            .unwrap_or_else(|err| {
                log::warn!("RenderSettings: {err}, using default {default}");
                default
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registered() -> ConsoleVariables {
        let mut cvars = ConsoleVariables::new();
        RenderSettings::register_cvars(&mut cvars).unwrap();
        cvars
    }

    #[test]
    fn test_defaults_round_through_cvars() {
        let cvars = registered();
        assert_eq!(RenderSettings::from_cvars(&cvars), RenderSettings::default());
    }

    #[test]
    fn test_snapshot_reads_changes() {
        let mut cvars = registered();
        cvars.set("r.Bloom", false).unwrap();
        cvars.set("r.AntiAliasing", 1i64).unwrap();
        cvars.set("r.SuperResolution", 2i64).unwrap();
        let settings = RenderSettings::from_cvars(&cvars);
        assert!(!settings.bloom);
        assert_eq!(settings.anti_aliasing, AntiAliasingMode::Fxaa);
        assert_eq!(settings.super_resolution, SuperResolutionMode::Quality);
    }

    #[test]
    fn test_resolution_scale_clamped() {
        let mut cvars = registered();
        cvars.set("r.ResolutionScale", 5i64).unwrap();
        assert_eq!(RenderSettings::from_cvars(&cvars).resolution_scale_percent, 10);
        cvars.set("r.ResolutionScale", 400i64).unwrap();
        assert_eq!(RenderSettings::from_cvars(&cvars).resolution_scale_percent, 200);
    }

    #[test]
    fn test_missing_cvars_fall_back() {
        let cvars = ConsoleVariables::new();
        assert_eq!(RenderSettings::from_cvars(&cvars), RenderSettings::default());
    }

    #[test]
    fn test_override_merges_set_fields_only() {
        let base = RenderSettings::default();
        let merged = base.with_override(&SettingsOverride {
            bloom: Some(false),
            resolution_scale_percent: Some(1),
            ..SettingsOverride::default()
        });
        assert!(!merged.bloom);
        assert_eq!(merged.resolution_scale_percent, 10);
        assert_eq!(merged.anti_aliasing, base.anti_aliasing);
        assert_eq!(merged.exposure, base.exposure);
    }

    #[test]
    fn test_override_from_toml() {
        let o: SettingsOverride = toml::from_str(
            r#"
            anti_aliasing = "fxaa"
            super_resolution = "performance"
            ssr = false
            "#,
        )
        .unwrap();
        assert_eq!(o.anti_aliasing, Some(AntiAliasingMode::Fxaa));
        assert_eq!(o.super_resolution, Some(SuperResolutionMode::Performance));
        assert_eq!(o.ssr, Some(false));
        assert_eq!(o.bloom, None);
    }

    #[test]
    fn test_super_resolution_factors() {
        assert_eq!(SuperResolutionMode::from_index(0).factor(), 1.0);
        assert_eq!(SuperResolutionMode::from_index(4).factor(), 2.0);
        assert_eq!(SuperResolutionMode::from_index(9), SuperResolutionMode::Off);
        assert!(SuperResolutionMode::Balanced.is_enabled());
    }
}
