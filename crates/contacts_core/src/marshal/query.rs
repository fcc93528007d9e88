//! Query specification wire encoding.
//!
//! Layout: `[view uri][u8 has filter][filter tree][u32 sort count]
//! [(u32 property, bool ascending)...][u32 projection count][u32 property...]
//! [bool distinct]`. Filter nodes start with a tag byte: `0` condition
//! `[u32 property][u8 op][tagged value]`, `1` AND and `2` OR, both followed
//! by `[u32 count][nodes]`.

use super::buffer::{MarshalReader, MarshalWriter};
use super::record::{read_tagged_value, write_tagged_value};
use crate::error::{ContactsError, ContactsResult};
use crate::query::{Condition, Filter, MatchOp, Query, MAX_FILTER_DEPTH};
use crate::schema::PropertyId;

const NODE_CONDITION: u8 = 0;
const NODE_AND: u8 = 1;
const NODE_OR: u8 = 2;

pub fn marshal_query(writer: &mut MarshalWriter, query: &Query) -> ContactsResult<()> {
    writer.put_str(Some(query.view_uri()))?;
    match query.filter() {
        Some(filter) => {
            writer.put_bool(true)?;
            write_filter(writer, filter, 0)?;
        }
        None => writer.put_bool(false)?,
    }

    writer.put_len(query.sort_keys().len())?;
    for key in query.sort_keys() {
        writer.put_u32(key.property.raw())?;
        writer.put_bool(key.ascending)?;
    }

    writer.put_len(query.projection().len())?;
    for property in query.projection() {
        writer.put_u32(property.raw())?;
    }
    writer.put_bool(query.is_distinct())
}

/// Reads a query. The result is not validated against any schema.
pub fn unmarshal_query(reader: &mut MarshalReader<'_>) -> ContactsResult<Query> {
    let mut query = Query::new(reader.get_required_str("query view uri")?);
    if reader.get_bool()? {
        query = query.with_filter(read_filter(reader, 0)?);
    }

    let sort_count = reader.get_len(5)?;
    for _ in 0..sort_count {
        let property = PropertyId(reader.get_u32()?);
        query = query.sort_by(property, reader.get_bool()?);
    }

    let projection_count = reader.get_len(4)?;
    let projection = (0..projection_count)
        .map(|_| reader.get_u32().map(PropertyId))
        .collect::<ContactsResult<Vec<_>>>()?;
    Ok(query.project(&projection).distinct(reader.get_bool()?))
}

fn write_filter(writer: &mut MarshalWriter, filter: &Filter, depth: usize) -> ContactsResult<()> {
    if depth > MAX_FILTER_DEPTH {
        return Err(ContactsError::invalid("filter nesting too deep to marshal"));
    }
    match filter {
        Filter::Condition(condition) => {
            writer.put_u8(NODE_CONDITION)?;
            writer.put_u32(condition.property.raw())?;
            writer.put_u8(condition.op.wire_tag())?;
            write_tagged_value(writer, &condition.value)
        }
        Filter::And(children) | Filter::Or(children) => {
            let tag = if matches!(filter, Filter::And(_)) {
                NODE_AND
            } else {
                NODE_OR
            };
            writer.put_u8(tag)?;
            writer.put_len(children.len())?;
            children
                .iter()
                .try_for_each(|child| write_filter(writer, child, depth + 1))
        }
    }
}

fn read_filter(reader: &mut MarshalReader<'_>, depth: usize) -> ContactsResult<Filter> {
    if depth > MAX_FILTER_DEPTH {
        return Err(ContactsError::invalid("filter nesting too deep to unmarshal"));
    }
    match reader.get_u8()? {
        NODE_CONDITION => {
            let property = PropertyId(reader.get_u32()?);
            let tag = reader.get_u8()?;
            let op = MatchOp::from_wire_tag(tag)
                .ok_or_else(|| ContactsError::invalid(format!("unknown match op {tag}")))?;
            Ok(Filter::Condition(Condition {
                property,
                op,
                value: read_tagged_value(reader)?,
            }))
        }
        tag @ (NODE_AND | NODE_OR) => {
            let count = reader.get_len(1)?;
            let children = (0..count)
                .map(|_| read_filter(reader, depth + 1))
                .collect::<ContactsResult<Vec<_>>>()?;
            Ok(if tag == NODE_AND {
                Filter::And(children)
            } else {
                Filter::Or(children)
            })
        }
        other => Err(ContactsError::invalid(format!("unknown filter node {other}"))),
    }
}
