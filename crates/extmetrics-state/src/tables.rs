//! redb table definitions for the record store.

use redb::TableDefinition;

/// External metric records keyed by `{namespace}/{name}/{uid}/{metric_name}`.
pub const EXTERNAL_METRICS: TableDefinition<&str, &[u8]> =
    TableDefinition::new("external_metrics");
