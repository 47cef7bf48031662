//! Common fixtures for load generator tests.
//!
//! Scenario files and payload documents representing the usual ways an
//! operator configures a run.

/// A complete scenario exercising every operation kind.
pub const FULL_SCENARIO_YAML: &str = r#"
uri: mongodb://db.example:27017/admin
workers: 4
duration_secs: 60
seed: 7
database: shop
collection: orders
operations:
  query:
    quota: 20
    filter:
      status: open
      total:
        $gt:
          $randInt: [10, 500]
  update:
    quota: 5
    filter: '{"status": "open"}'
    update: '{"$set": {"status": "closed"}}'
  insert:
    quota: 2
    collection: audit
    document:
      kind: load
      n:
        $randInt: [0, 9]
  delete:
    quota: 1
    database: scratch
    filter: '{"kind": "load"}'
  aggregate:
    quota: 1
    pipeline:
      - $match:
          status: open
      - $count: n
"#;

/// A scenario with only queries enabled.
pub const QUERY_ONLY_YAML: &str = r#"
workers: 1
duration_secs: 2
operations:
  query:
    quota: 3
"#;

/// A scenario whose update filter is not valid JSON.
pub const MALFORMED_FILTER_YAML: &str = r#"
workers: 2
duration_secs: 5
operations:
  update:
    quota: 1
    filter: '{"age": '
"#;

/// A filter with a random-integer expression.
pub const AGE_FILTER_JSON: &str = r#"{"age": {"$randInt": [18, 65]}}"#;

/// An aggregation pipeline in JSON text form.
pub const COUNT_PIPELINE_JSON: &str = r#"[{"$match": {"age": {"$gte": 30}}}, {"$count": "n"}]"#;
