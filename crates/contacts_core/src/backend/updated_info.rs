//! Read-only view over the change log.

use super::common::{count_rows, fetch_records, TableSpec};
use crate::error::ContactsResult;
use crate::plugin::{ReadContext, RecordPlugin};
use crate::query::sql::ColumnMap;
use crate::query::Query;
use crate::record::RecordList;
use crate::schema::property::{updated_info, view};

const SPEC: TableSpec = TableSpec {
    view_uri: view::UPDATED_INFO,
    table: "change_log",
    key_column: "id",
    read: ColumnMap {
        source: "change_log",
        key_column: "id",
        columns: &[
            (updated_info::VIEW_URI, "view_uri"),
            (updated_info::RECORD_ID, "record_id"),
            (updated_info::ADDRESSBOOK_ID, "addressbook_id"),
            (updated_info::TYPE, "change_type"),
            (updated_info::VERSION, "version"),
        ],
    },
};

pub(crate) struct UpdatedInfoBackend;

impl RecordPlugin for UpdatedInfoBackend {
    fn view_uri(&self) -> &'static str {
        view::UPDATED_INFO
    }

    fn get_all_records(&self, ctx: &ReadContext<'_>, offset: usize, limit: usize) -> ContactsResult<RecordList> {
        fetch_records(ctx, &SPEC, None, None, offset, limit)
    }

    fn get_records_with_query(
        &self,
        ctx: &ReadContext<'_>,
        query: &Query,
        offset: usize,
        limit: usize,
    ) -> ContactsResult<RecordList> {
        fetch_records(ctx, &SPEC, Some(query), None, offset, limit)
    }

    fn get_count(&self, ctx: &ReadContext<'_>) -> ContactsResult<usize> {
        count_rows(ctx, &SPEC, None, None)
    }

    fn get_count_with_query(&self, ctx: &ReadContext<'_>, query: &Query) -> ContactsResult<usize> {
        count_rows(ctx, &SPEC, Some(query), None)
    }
}
