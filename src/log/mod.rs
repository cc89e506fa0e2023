pub mod key_value_encoder;

use std::path::Path;
use std::sync::OnceLock;

use log::{debug, info};
use log4rs::{
    Config,
    config::{Deserializers, RawConfig},
};

use crate::log::key_value_encoder::KeyValueEncoderDeserializer;

const EXTERNAL_CONFIG: &str = "log4rs.yml";

/// Initializes logging.
///
/// A `log4rs.yml` in the working directory wins; otherwise the embedded
/// defaults are used. Both may reference the `key_value` encoder.
pub fn init_logging() -> Result<(), anyhow::Error> {
    let mut deserializers = Deserializers::default();
    deserializers.insert("key_value", KeyValueEncoderDeserializer);

    let path = Path::new(EXTERNAL_CONFIG);
    if path.exists() {
        log4rs::init_file(path, deserializers)
            .map_err(|e| anyhow::anyhow!("Failed to load external {}: {}", EXTERNAL_CONFIG, e))?;
        info!(path = EXTERNAL_CONFIG; "Logging initialized from external configuration");
        return Ok(());
    }

    let yaml_content = include_str!("../../resources/default_log4rs.yml");
    let raw_config: RawConfig = serde_yaml::from_str(yaml_content)?;

    let (appenders, errors) = raw_config.appenders_lossy(&deserializers);
    if !errors.is_empty() {
        return Err(anyhow::anyhow!("Errors parsing embedded appenders: {:?}", errors));
    }

    let config = Config::builder()
        .appenders(appenders)
        .loggers(raw_config.loggers())
        .build(raw_config.root())?;

    log4rs::init_config(config)?;

    debug!("Logging initialized from embedded defaults (no external log4rs.yml found)");
    Ok(())
}

fn reveal_addresses() -> bool {
    static REVEAL_ADDRESSES_CACHE: OnceLock<bool> = OnceLock::new();

    *REVEAL_ADDRESSES_CACHE.get_or_init(|| {
        std::env::var("REVEAL_ADDRESSES")
            .map(|v| {
                let val = v.to_lowercase();
                val == "true" || val == "1"
            })
            .unwrap_or(false)
    })
}

/// Shortens an address (or any caller-supplied identifier) for logging,
/// keeping only its first and last six characters. `REVEAL_ADDRESSES=true`
/// disables masking.
pub fn mask_address(s: &str) -> String {
    if reveal_addresses() {
        return s.to_string();
    }

    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= 12 {
        return "***".to_string();
    }

    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 6..].iter().collect();
    format!("{head}...{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_address_hides_the_middle() {
        if reveal_addresses() {
            return;
        }
        assert_eq!(
            mask_address("bitcoincash:qpr270a5sxphltdmggtj07v4nskn9gmg9yx4m5h7s4"),
            "bitcoi...m5h7s4"
        );
        assert_eq!(mask_address("short"), "***");
    }
}
