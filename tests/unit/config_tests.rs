use std::collections::HashMap;
use std::fs;

use clap::Parser;
use tempfile::TempDir;

use coredata_model::config::{EnvProvider, OutputFormatConfig};
use coredata_model::{Cli, ConfigManager, ModelChecker, Severity};

#[derive(Default)]
struct MockEnvProvider {
    vars: HashMap<String, String>,
}

impl MockEnvProvider {
    fn with(mut self, key: &str, value: &str) -> Self {
        self.vars.insert(key.to_string(), value.to_string());
        self
    }
}

impl EnvProvider for MockEnvProvider {
    fn get(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

#[tokio::test]
async fn test_file_then_environment_then_cli() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("coredata-model.toml");
    fs::write(
        &path,
        r#"
[validation]
threads = 4
warn_missing_inverse = true

[output]
format = "json"
"#,
    )
    .unwrap();

    let file_config = ConfigManager::load_from_file(&path).await.unwrap();
    let env = MockEnvProvider::default().with("COREDATA_MODEL_THREADS", "8");
    let config = ConfigManager::apply_environment_overrides_with(&env, file_config).unwrap();
    let cli = Cli::try_parse_from(["coredata-model", "--format", "summary", "check", "."]).unwrap();
    let config = ConfigManager::merge_with_cli(config, &cli);

    assert_eq!(config.validation.threads, Some(8));
    assert_eq!(config.output.format, OutputFormatConfig::Summary);
    // untouched by later layers
    assert!(config.validation.warn_missing_inverse);
    assert!(ConfigManager::validate_config(&config).is_ok());
}

#[tokio::test]
async fn test_vocabulary_from_file_drives_checker() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("coredata-model.toml");
    fs::write(
        &path,
        r#"
[vocabulary.tags]
entity = "Table"

[validation]
allow_one_directional_inverses = false
"#,
    )
    .unwrap();

    let config = ConfigManager::load_from_file(&path).await.unwrap();
    assert_eq!(config.vocabulary.tags.entity, "Table");
    assert_eq!(config.vocabulary.tags.model, "model");

    let checker = ModelChecker::from_config(&config);
    let outcome = checker
        .parse_bytes(
            br#"<model>
    <Table name="Person"><relationship name="pets" toMany="YES" destinationEntity="Pet"/></Table>
    <Table name="Pet"><relationship name="owner" destinationEntity="Person" inverseName="pets"/></Table>
</model>"#,
        )
        .unwrap();
    assert_eq!(outcome.model.entities().len(), 2);
    assert_eq!(outcome.diagnostics.len(), 1);
    assert_eq!(outcome.diagnostics[0].severity, Severity::Error);
}

#[test]
fn test_invalid_environment_value_is_rejected() {
    let env = MockEnvProvider::default().with("COREDATA_MODEL_FORMAT", "yaml");
    let result = ConfigManager::apply_environment_overrides_with(&env, Default::default());
    assert!(result.is_err());
}
