//! Shared CLI helpers used across multiple commands.

use anyhow::Context;
use pling_config::{PatchStore, Settings, settings_path};
use pling_synth::ProgramManager;
use std::path::Path;

/// Load settings from `path`, or from the user config directory.
///
/// A missing file gives the defaults.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    let path = path.map_or_else(settings_path, Path::to_path_buf);
    let settings = Settings::load_or_default(&path)
        .with_context(|| format!("failed to load settings from {}", path.display()))?;
    tracing::debug!(path = %path.display(), ?settings, "settings loaded");
    Ok(settings)
}

/// Program manager over the settings' search path.
pub fn program_manager(settings: &Settings, sample_rate: u32) -> ProgramManager {
    let store = PatchStore::new(settings.search_path());
    ProgramManager::new(store, sample_rate as f32)
}

/// Parse a `LSB:MSB` bank select pair or a plain bank number.
pub fn parse_bank(s: &str) -> Result<(u8, u8), String> {
    let parse = |v: &str| {
        v.trim()
            .parse::<u8>()
            .ok()
            .filter(|&n| n < 128)
            .ok_or_else(|| format!("invalid bank select value '{v}' (expected 0-127)"))
    };
    match s.split_once(':') {
        Some((lsb, msb)) => Ok((parse(lsb)?, parse(msb)?)),
        None => {
            let bank = s
                .trim()
                .parse::<u16>()
                .ok()
                .filter(|&n| n < 128 * 128)
                .ok_or_else(|| format!("invalid bank '{s}' (expected 0-16383 or LSB:MSB)"))?;
            Ok(((bank >> 7) as u8, (bank & 0x7f) as u8))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pling_config::bank_number;

    #[test]
    fn test_parse_bank() {
        assert_eq!(parse_bank("0"), Ok((0, 0)));
        assert_eq!(parse_bank("1:2"), Ok((1, 2)));

        let (lsb, msb) = parse_bank("130").unwrap();
        assert_eq!(bank_number(lsb, msb), 130);

        assert!(parse_bank("128:0").is_err());
        assert!(parse_bank("16384").is_err());
        assert!(parse_bank("piano").is_err());
    }
}
