//! INI file configuration adapter.
//!
//! Keys and section names are case-sensitive so variable names declared in a
//! strategy file keep their spelling.

use crate::domain::error::SamscanError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SamscanError> {
        let path = path.as_ref();
        let mut config = Ini::new_cs();
        config.load(path).map_err(|reason| SamscanError::ConfigParse {
            file: path.display().to_string(),
            reason,
        })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, SamscanError> {
        let mut config = Ini::new_cs();
        config
            .read(content.to_string())
            .map_err(|reason| SamscanError::ConfigParse {
                file: "<inline>".to_string(),
                reason,
            })?;
        Ok(Self { config })
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config
            .get(section, key)
            .filter(|value| !value.trim().is_empty())
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.config
            .getint(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn has_section(&self, section: &str) -> bool {
        self.config.sections().iter().any(|s| s == section)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn expressions_survive_delimiters_in_values() {
        let content = r#"
[1st_scan]
condition = close >= 100 AND volume != 0

[variables]
maShort = ma(5)
"#;
        let adapter = FileConfigAdapter::from_string(content).unwrap();
        assert_eq!(
            adapter.get_string("1st_scan", "condition"),
            Some("close >= 100 AND volume != 0".to_string())
        );
        assert_eq!(
            adapter.get_string("variables", "maShort"),
            Some("ma(5)".to_string())
        );
        assert_eq!(adapter.get_string("variables", "mashort"), None);
    }

    #[test]
    fn get_string_returns_none_for_missing_or_blank() {
        let adapter = FileConfigAdapter::from_string("[scan]\ntickers =\n").unwrap();
        assert_eq!(adapter.get_string("scan", "tickers"), None);
        assert_eq!(adapter.get_string("scan", "missing"), None);
        assert_eq!(adapter.get_string("missing_section", "key"), None);
    }

    #[test]
    fn get_int_falls_back_to_default() {
        let adapter =
            FileConfigAdapter::from_string("[scan]\nhistory_limit = 120\nmax_concurrency = many\n")
                .unwrap();
        assert_eq!(adapter.get_int("scan", "history_limit", 200), 120);
        assert_eq!(adapter.get_int("scan", "max_concurrency", 8), 8);
        assert_eq!(adapter.get_int("scan", "missing", 42), 42);
    }

    #[test]
    fn get_list_keeps_order() {
        let adapter =
            FileConfigAdapter::from_string("[2nd_scan]\nvariables = slow, fast ,, mid\n").unwrap();
        assert_eq!(
            adapter.get_list("2nd_scan", "variables"),
            Some(vec!["slow".to_string(), "fast".to_string(), "mid".to_string()])
        );
        assert_eq!(adapter.get_list("2nd_scan", "missing"), None);
    }

    #[test]
    fn has_section_checks_presence() {
        let adapter = FileConfigAdapter::from_string("[strategy]\nid = 1\n").unwrap();
        assert!(adapter.has_section("strategy"));
        assert!(!adapter.has_section("1st_scan"));
    }

    #[test]
    fn from_file_reads_config() {
        let file = create_temp_config("[data]\npath = /var/lib/samscan\n");
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(
            adapter.get_string("data", "path"),
            Some("/var/lib/samscan".to_string())
        );
    }

    #[test]
    fn from_file_missing_is_config_parse_error() {
        let result = FileConfigAdapter::from_file("/nonexistent/path/config.ini");
        assert!(matches!(result, Err(SamscanError::ConfigParse { .. })));
    }
}
