//! Default configuration values

/// Default configuration file name (TOML)
pub const DEFAULT_CONFIG_TOML: &str = "eden.toml";

/// Default configuration file name (YAML)
pub const DEFAULT_CONFIG_YAML: &str = "eden.yaml";

/// Get list of config file names to search for
pub fn config_file_names() -> Vec<&'static str> {
    vec![
        DEFAULT_CONFIG_TOML,
        DEFAULT_CONFIG_YAML,
        ".eden.toml",
        ".eden.yaml",
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toml_is_searched_first() {
        let names = config_file_names();
        assert_eq!(names.first(), Some(&DEFAULT_CONFIG_TOML));
        assert!(names.contains(&".eden.yaml"));
    }
}
