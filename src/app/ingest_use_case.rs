use tracing::info;

use crate::app::ports::RawTableSource;
use crate::config::EtlConfig;
use crate::error::Result;
use crate::observability::metrics;
use crate::pipeline::processing::coerce::{CoercionReport, TypeCoercer};
use crate::pipeline::processing::profile::TableProfile;
use crate::pipeline::processing::validate::SchemaValidator;
use crate::types::RecordTable;

/// Raw table after validation and coercion, with what was learned on the way
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub table: RecordTable,
    pub profile: TableProfile,
    pub coercion: CoercionReport,
}

/// Reads the raw extract, profiles it, checks the schema and coerces types
pub struct IngestUseCase {
    source: Box<dyn RawTableSource>,
    validator: SchemaValidator,
    coercer: TypeCoercer,
    preview_rows: usize,
}

impl IngestUseCase {
    pub fn new(
        source: Box<dyn RawTableSource>,
        validator: SchemaValidator,
        coercer: TypeCoercer,
        preview_rows: usize,
    ) -> Self {
        Self {
            source,
            validator,
            coercer,
            preview_rows,
        }
    }

    pub fn from_config(source: Box<dyn RawTableSource>, config: &EtlConfig) -> Self {
        Self::new(
            source,
            SchemaValidator::new(config.schema.expected_columns.clone()),
            TypeCoercer::new(
                config.schema.date_columns.clone(),
                config.schema.numeric_columns.clone(),
            ),
            config.input.preview_rows,
        )
    }

    /// Fails only on read errors or a schema mismatch; unparseable values are
    /// nulled and counted.
    pub fn load(&self) -> Result<IngestOutcome> {
        info!("Reading raw data from {}", self.source.describe());
        let mut table = self.source.read_raw()?;
        metrics::ingest::rows_read(table.len(), table.columns().len());

        let profile = TableProfile::of(&table, self.preview_rows);
        profile.log("Raw data");

        self.validator.validate(&table)?;
        let coercion = self.coercer.coerce(&mut table);

        Ok(IngestOutcome {
            table,
            profile,
            coercion,
        })
    }
}
