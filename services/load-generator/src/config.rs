//! Configuration loading and resolution.
//!
//! `LoadSettings` is what the operator writes (scenario YAML plus command-line
//! overrides). `RunConfig` is the validated, immutable value every worker
//! receives its own copy of.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use store_client::OperationKind;

use crate::error::{LoadTestError, LoadTestResult};
use crate::operation::{Operation, OperationSpec};
use crate::template::DocumentTemplate;

/// Order in which kinds appear in a resolved `RunConfig`.
pub const DRAW_ORDER: [OperationKind; 5] = [
    OperationKind::Query,
    OperationKind::Update,
    OperationKind::Delete,
    OperationKind::Insert,
    OperationKind::Aggregate,
];

/// Operator-facing settings loaded from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoadSettings {
    #[serde(default = "default_uri")]
    pub uri: String,
    #[serde(default = "default_workers")]
    pub workers: u32,
    #[serde(default = "default_duration_secs")]
    pub duration_secs: u64,
    #[serde(default)]
    pub seed: Option<u64>, // Optional RNG seed for reproducible draws
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default)]
    pub operations: OperationsSettings,
}

/// Per-kind sections of a scenario.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OperationsSettings {
    pub query: Option<OperationSettings>,
    pub update: Option<OperationSettings>,
    pub insert: Option<OperationSettings>,
    pub delete: Option<OperationSettings>,
    pub aggregate: Option<OperationSettings>,
}

/// Quota, namespace overrides and payload for one kind.
///
/// Payload fields accept either a YAML structure or a JSON string.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OperationSettings {
    #[serde(default)]
    pub quota: u32,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub collection: Option<String>,
    #[serde(default)]
    pub filter: Option<Value>,
    #[serde(default)]
    pub update: Option<Value>,
    #[serde(default)]
    pub document: Option<Value>,
    #[serde(default)]
    pub pipeline: Option<Value>,
}

fn default_uri() -> String {
    "mongodb://127.0.0.1:27017/admin".to_string()
}

fn default_workers() -> u32 {
    2
}

fn default_duration_secs() -> u64 {
    300
}

fn default_database() -> String {
    "test".to_string()
}

fn default_collection() -> String {
    "onemill".to_string()
}

fn sample_age_filter() -> Value {
    json!({"age": {"$randInt": [18, 65]}})
}

fn sample_update() -> Value {
    json!({"$set": {"m": {"$randInt": [0, 1000]}}})
}

fn sample_document() -> Value {
    json!({"age": {"$randInt": [18, 65]}, "m": {"$randInt": [0, 1000]}})
}

fn sample_pipeline() -> Value {
    json!([{"$match": {"age": {"$randInt": [18, 65]}}}, {"$count": "n"}])
}

impl Default for LoadSettings {
    fn default() -> Self {
        Self {
            uri: default_uri(),
            workers: default_workers(),
            duration_secs: default_duration_secs(),
            seed: None,
            database: default_database(),
            collection: default_collection(),
            operations: OperationsSettings::default(),
        }
    }
}

impl LoadSettings {
    /// Load settings from a YAML scenario file.
    pub fn from_file(path: impl AsRef<Path>) -> LoadTestResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse settings from YAML text.
    pub fn from_yaml(content: &str) -> LoadTestResult<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// The section for `kind`, if configured.
    pub fn operation(&self, kind: OperationKind) -> Option<&OperationSettings> {
        let ops = &self.operations;
        match kind {
            OperationKind::Query => ops.query.as_ref(),
            OperationKind::Update => ops.update.as_ref(),
            OperationKind::Insert => ops.insert.as_ref(),
            OperationKind::Delete => ops.delete.as_ref(),
            OperationKind::Aggregate => ops.aggregate.as_ref(),
        }
    }

    /// The section for `kind`, created empty if missing.
    pub fn operation_mut(&mut self, kind: OperationKind) -> &mut OperationSettings {
        let ops = &mut self.operations;
        let slot = match kind {
            OperationKind::Query => &mut ops.query,
            OperationKind::Update => &mut ops.update,
            OperationKind::Insert => &mut ops.insert,
            OperationKind::Delete => &mut ops.delete,
            OperationKind::Aggregate => &mut ops.aggregate,
        };
        slot.get_or_insert_with(OperationSettings::default)
    }

    /// Set the per-second quota for `kind`.
    pub fn set_quota(&mut self, kind: OperationKind, quota: u32) -> &mut Self {
        self.operation_mut(kind).quota = quota;
        self
    }
}

/// Validated run configuration, shared by value with every worker.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub uri: String,
    pub workers: usize,
    pub duration_secs: u64,
    pub seed: Option<u64>,
    pub operations: Vec<OperationSpec>,
}

impl RunConfig {
    /// Validate `settings` and resolve every operation kind.
    ///
    /// Any malformed payload or invalid count is reported here, before a
    /// single worker exists.
    pub fn from_settings(settings: &LoadSettings) -> LoadTestResult<Self> {
        if settings.workers == 0 {
            return Err(LoadTestError::Config("workers must be > 0".to_string()));
        }
        if settings.duration_secs == 0 {
            return Err(LoadTestError::Config("duration_secs must be > 0".to_string()));
        }
        if settings.uri.trim().is_empty() {
            return Err(LoadTestError::Config("uri must not be empty".to_string()));
        }

        let operations = DRAW_ORDER
            .iter()
            .map(|&kind| resolve_operation(settings, kind))
            .collect::<LoadTestResult<Vec<_>>>()?;

        Ok(Self {
            uri: settings.uri.clone(),
            workers: settings.workers as usize,
            duration_secs: settings.duration_secs,
            seed: settings.seed,
            operations,
        })
    }

    /// Wall-clock budget of each worker.
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }

    /// Sum of all quotas: operations each worker issues per tick.
    pub fn ops_per_second(&self) -> u64 {
        self.operations.iter().map(|op| u64::from(op.quota)).sum()
    }
}

fn resolve_operation(settings: &LoadSettings, kind: OperationKind) -> LoadTestResult<OperationSpec> {
    let empty = OperationSettings::default();
    let section = settings.operation(kind).unwrap_or(&empty);

    let allowed: &[&str] = match kind {
        OperationKind::Query | OperationKind::Delete => &["filter"],
        OperationKind::Update => &["filter", "update"],
        OperationKind::Insert => &["document"],
        OperationKind::Aggregate => &["pipeline"],
    };
    let given = [
        ("filter", section.filter.is_some()),
        ("update", section.update.is_some()),
        ("document", section.document.is_some()),
        ("pipeline", section.pipeline.is_some()),
    ];
    for (field, present) in given {
        if present && !allowed.contains(&field) {
            return Err(LoadTestError::InvalidPayload {
                kind,
                field,
                message: format!("{} operations take no {}", kind, field),
            });
        }
    }

    let operation = match kind {
        OperationKind::Query => Operation::Query {
            filter: payload(kind, "filter", &section.filter, sample_age_filter)?,
        },
        OperationKind::Update => Operation::Update {
            filter: payload(kind, "filter", &section.filter, sample_age_filter)?,
            update: payload(kind, "update", &section.update, sample_update)?,
        },
        OperationKind::Insert => Operation::Insert {
            document: payload(kind, "document", &section.document, sample_document)?,
        },
        OperationKind::Delete => Operation::Delete {
            filter: payload(kind, "filter", &section.filter, sample_age_filter)?,
        },
        OperationKind::Aggregate => {
            let value = section.pipeline.clone().unwrap_or_else(sample_pipeline);
            let pipeline =
                DocumentTemplate::pipeline_from_value(value).map_err(|e| {
                    LoadTestError::InvalidPayload {
                        kind,
                        field: "pipeline",
                        message: e.to_string(),
                    }
                })?;
            Operation::Aggregate { pipeline }
        }
    };

    Ok(OperationSpec::new(
        operation,
        section.quota,
        section.database.as_deref().unwrap_or(&settings.database),
        section.collection.as_deref().unwrap_or(&settings.collection),
    ))
}

fn payload(
    kind: OperationKind,
    field: &'static str,
    value: &Option<Value>,
    sample: fn() -> Value,
) -> LoadTestResult<DocumentTemplate> {
    let value = value.clone().unwrap_or_else(sample);
    DocumentTemplate::from_value(value).map_err(|e| LoadTestError::InvalidPayload {
        kind,
        field,
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use test_utils::fixtures;

    #[test]
    fn test_defaults_match_cli_defaults() {
        let config = RunConfig::from_settings(&LoadSettings::default()).unwrap();
        assert_eq!(config.uri, "mongodb://127.0.0.1:27017/admin");
        assert_eq!(config.workers, 2);
        assert_eq!(config.duration(), Duration::from_secs(300));
        assert_eq!(config.ops_per_second(), 0);

        let kinds: Vec<_> = config.operations.iter().map(|op| op.kind()).collect();
        assert_eq!(kinds, DRAW_ORDER.to_vec());
        assert!(config
            .operations
            .iter()
            .all(|op| op.quota == 0 && op.database == "test" && op.collection == "onemill"));
    }

    #[test]
    fn test_full_scenario_resolves() {
        let settings = LoadSettings::from_yaml(fixtures::FULL_SCENARIO_YAML).unwrap();
        let config = RunConfig::from_settings(&settings).unwrap();

        assert_eq!(config.workers, 4);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.ops_per_second(), 29);

        let insert = config
            .operations
            .iter()
            .find(|op| op.kind() == OperationKind::Insert)
            .unwrap();
        assert_eq!(insert.database, "shop");
        assert_eq!(insert.collection, "audit");

        let delete = config
            .operations
            .iter()
            .find(|op| op.kind() == OperationKind::Delete)
            .unwrap();
        assert_eq!(delete.database, "scratch");
        assert_eq!(delete.collection, "orders");

        match &config.operations[0].operation {
            Operation::Query { filter } => assert!(!filter.is_static()),
            other => panic!("expected query first, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_filter_is_config_error() {
        let settings = LoadSettings::from_yaml(fixtures::MALFORMED_FILTER_YAML).unwrap();
        let err = RunConfig::from_settings(&settings).unwrap_err();
        assert!(err.is_config_error());
        assert!(matches!(
            err,
            LoadTestError::InvalidPayload {
                kind: OperationKind::Update,
                field: "filter",
                ..
            }
        ));
    }

    #[test]
    fn test_malformed_payload_on_disabled_kind_still_rejected() {
        let mut settings = LoadSettings::default();
        settings.operation_mut(OperationKind::Insert).document = Some(json!("not json"));
        assert!(RunConfig::from_settings(&settings).is_err());
    }

    #[test]
    fn test_unsigned_beyond_i64_rejected_before_run() {
        let settings = LoadSettings::from_yaml(
            "operations:\n  delete:\n    quota: 1\n    filter: {n: 18446744073709551615}\n",
        )
        .unwrap();
        let err = RunConfig::from_settings(&settings).unwrap_err();
        assert!(err.is_config_error());
        assert!(matches!(
            err,
            LoadTestError::InvalidPayload {
                kind: OperationKind::Delete,
                field: "filter",
                ..
            }
        ));
    }

    #[test]
    fn test_field_for_other_kind_rejected() {
        let mut settings = LoadSettings::default();
        settings.operation_mut(OperationKind::Query).pipeline = Some(json!([]));
        let err = RunConfig::from_settings(&settings).unwrap_err();
        assert!(matches!(
            err,
            LoadTestError::InvalidPayload {
                field: "pipeline",
                ..
            }
        ));
    }

    #[test]
    fn test_zero_workers_or_duration_rejected() {
        let mut settings = LoadSettings::default();
        settings.workers = 0;
        assert!(RunConfig::from_settings(&settings).unwrap_err().is_config_error());

        let mut settings = LoadSettings::default();
        settings.duration_secs = 0;
        assert!(RunConfig::from_settings(&settings).unwrap_err().is_config_error());
    }

    #[test]
    fn test_unknown_scenario_key_rejected() {
        let err = LoadSettings::from_yaml("workers: 1\nwarmup_secs: 5\n").unwrap_err();
        assert!(matches!(err, LoadTestError::Yaml(_)));
    }

    #[test]
    fn test_set_quota_creates_section() {
        let mut settings = LoadSettings::default();
        settings
            .set_quota(OperationKind::Query, 3)
            .set_quota(OperationKind::Update, 1);
        let config = RunConfig::from_settings(&settings).unwrap();
        assert_eq!(config.ops_per_second(), 4);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(fixtures::QUERY_ONLY_YAML.as_bytes()).unwrap();

        let settings = LoadSettings::from_file(file.path()).unwrap();
        assert_eq!(settings.workers, 1);
        assert_eq!(settings.duration_secs, 2);
        assert_eq!(settings.operation(OperationKind::Query).unwrap().quota, 3);
        assert!(settings.operation(OperationKind::Update).is_none());
    }

    #[test]
    fn test_bundled_scenarios_resolve() {
        let dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("scenarios");
        for entry in std::fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            let settings = LoadSettings::from_file(&path).unwrap();
            assert!(
                RunConfig::from_settings(&settings).is_ok(),
                "{} does not resolve",
                path.display()
            );
        }
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = LoadSettings::from_file("/nonexistent/scenario.yaml").unwrap_err();
        assert!(matches!(err, LoadTestError::Io(_)));
    }
}
