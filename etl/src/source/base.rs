use std::future::Future;

use crate::error::EtlResult;
use crate::types::UnitId;

/// A raw record as it appears in a source unit, before schema validation.
pub type RawRecord = serde_json::Value;

/// Storage where an upstream collector deposits units of raw records, one location per table.
///
/// Units are immutable once listed. Implementations report transient access problems and
/// undecodable content as [`crate::error::ErrorKind::ReadFailure`].
pub trait UnitSource {
    /// Lists the ids of every unit currently available for `table`, in any order.
    fn list_units(&self, table: &str) -> impl Future<Output = EtlResult<Vec<UnitId>>> + Send;

    /// Returns the raw records of a unit in the order they appear in it.
    fn read_unit(
        &self,
        table: &str,
        unit_id: &UnitId,
    ) -> impl Future<Output = EtlResult<Vec<RawRecord>>> + Send;
}
