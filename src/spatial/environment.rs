//! Named acoustic environment presets.
//!
//! An environment is a pair of shared reverb targets applied to the whole
//! scene at once; switching environments never touches per-source direct
//! gain. The built-in set covers the spaces of a community world: the open
//! default `clearing`, the covered `pavilion`, the dense `grove`, the
//! enclosed `hollow`, and the festival-evening `lantern-night`.

/// Reverb targets for one environment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvironmentPreset {
    /// Wet/dry reverb mix target in `[0, 1]`
    pub reverb_mix: f32,
    /// High-frequency absorption target in `[0, 1]`
    pub absorption: f32,
}

/// Name of the environment every scene starts in.
pub const DEFAULT_ENVIRONMENT: &str = "clearing";

/// The built-in presets, in `(name, preset)` pairs.
pub fn builtin_environments() -> Vec<(String, EnvironmentPreset)> {
    vec![
        (
            "clearing".to_string(),
            EnvironmentPreset {
                reverb_mix: 0.2,
                absorption: 0.3,
            },
        ),
        (
            "pavilion".to_string(),
            EnvironmentPreset {
                reverb_mix: 0.4,
                absorption: 0.15,
            },
        ),
        (
            "grove".to_string(),
            EnvironmentPreset {
                reverb_mix: 0.25,
                absorption: 0.5,
            },
        ),
        (
            "hollow".to_string(),
            EnvironmentPreset {
                reverb_mix: 0.55,
                absorption: 0.4,
            },
        ),
        (
            "lantern-night".to_string(),
            EnvironmentPreset {
                reverb_mix: 0.35,
                absorption: 0.25,
            },
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_include_default() {
        let presets = builtin_environments();
        assert!(presets.iter().any(|(name, _)| name == DEFAULT_ENVIRONMENT));
        assert_eq!(presets.len(), 5);
    }

    #[test]
    fn test_preset_ranges() {
        for (name, preset) in builtin_environments() {
            assert!(
                (0.0..=1.0).contains(&preset.reverb_mix),
                "{} mix out of range",
                name
            );
            assert!(
                (0.0..=1.0).contains(&preset.absorption),
                "{} absorption out of range",
                name
            );
        }
    }
}
