//! Record and record-list wire encoding.
//!
//! A record is written in three stages, and read back in the same order:
//!
//! 1. common: `[view uri][u32 property count][u8 flags per property]`
//! 2. fields: every scalar property in descriptor order
//! 3. children: for every list property not excluded by projection,
//!    `[u32 count][child records][u32 removed count][i32 removed ids]`
//!
//! Flag bits per property: `0x01` dirty, `0x02` present, `0x04` unset by
//! projection. Neither state bit set means "default".

use super::buffer::{MarshalReader, MarshalWriter};
use crate::error::{ContactsError, ContactsResult};
use crate::record::{Record, RecordList, Slot, Value};
use crate::schema::{DataKind, SchemaRegistry};

/// Deepest parent/child nesting accepted on the wire.
pub const MAX_NESTING: usize = 4;

const FLAG_DIRTY: u8 = 0x01;
const FLAG_PRESENT: u8 = 0x02;
const FLAG_UNSET: u8 = 0x04;

/// Smallest possible encoded record: empty uri plus zero properties.
const MIN_RECORD_BYTES: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Common,
    Fields,
    Children,
    Done,
}

/// Appends one record, children included.
pub fn marshal_record(writer: &mut MarshalWriter, record: &Record) -> ContactsResult<()> {
    write_record(writer, record, 0)
}

/// Reads one record, allocating it through `registry`.
///
/// # Errors
/// - `InvalidParameter` for an unknown view or a property count that does
///   not match the local schema.
/// - `NoData` when the buffer ends early.
pub fn unmarshal_record(
    reader: &mut MarshalReader<'_>,
    registry: &SchemaRegistry,
) -> ContactsResult<Record> {
    read_record(reader, registry, 0)
}

/// Appends a list as `[view uri or null][u32 count][records]`.
pub fn marshal_list(writer: &mut MarshalWriter, list: &RecordList) -> ContactsResult<()> {
    writer.put_str(list.view_uri())?;
    writer.put_len(list.len())?;
    list.iter()
        .try_for_each(|record| write_record(writer, record, 0))
}

pub fn unmarshal_list(
    reader: &mut MarshalReader<'_>,
    registry: &SchemaRegistry,
) -> ContactsResult<RecordList> {
    let mut list = match reader.get_str()? {
        Some(uri) => RecordList::for_view(&uri),
        None => RecordList::new(),
    };
    let count = reader.get_len(MIN_RECORD_BYTES)?;
    for _ in 0..count {
        list.append(read_record(reader, registry, 0)?)?;
    }
    Ok(list)
}

/// Encodes one record into a fresh buffer.
pub fn record_to_bytes(record: &Record) -> ContactsResult<Vec<u8>> {
    let mut writer = MarshalWriter::new();
    marshal_record(&mut writer, record)?;
    Ok(writer.into_bytes())
}

/// Decodes a buffer holding exactly one record.
pub fn record_from_bytes(bytes: &[u8], registry: &SchemaRegistry) -> ContactsResult<Record> {
    let mut reader = MarshalReader::new(bytes);
    let record = unmarshal_record(&mut reader, registry)?;
    reader.finish()?;
    Ok(record)
}

fn slot_flags(slot: &Slot, dirty: bool) -> u8 {
    let state = match slot {
        Slot::Unset => FLAG_UNSET,
        Slot::Default => 0,
        Slot::Present(_) | Slot::Children(_) => FLAG_PRESENT,
    };
    if dirty {
        state | FLAG_DIRTY
    } else {
        state
    }
}

fn write_record(writer: &mut MarshalWriter, record: &Record, depth: usize) -> ContactsResult<()> {
    if depth > MAX_NESTING {
        return Err(ContactsError::invalid("record nesting too deep to marshal"));
    }
    let schema = record.schema();
    let descriptors = schema.descriptors();
    let mut stage = Stage::Common;

    while stage != Stage::Done {
        stage = match stage {
            Stage::Common => {
                writer.put_str(Some(record.view_uri()))?;
                writer.put_len(descriptors.len())?;
                for (index, slot) in record.slots().iter().enumerate() {
                    writer.put_u8(slot_flags(slot, record.dirty_set().contains(index)))?;
                }
                Stage::Fields
            }
            Stage::Fields => {
                let mut written = 0;
                for (index, descriptor) in descriptors.iter().enumerate() {
                    if !descriptor.kind.is_scalar() {
                        continue;
                    }
                    let value = record.value_at(index).ok_or_else(|| {
                        ContactsError::Internal(format!(
                            "scalar property {} holds a list",
                            descriptor.name
                        ))
                    })?;
                    write_value(writer, &value)?;
                    written += 1;
                }
                debug_assert_eq!(written, schema.scalar_count(), "field count drift");
                Stage::Children
            }
            Stage::Children => {
                for slot in record.slots() {
                    let Slot::Children(list) = slot else {
                        continue;
                    };
                    writer.put_len(list.len())?;
                    for child in list.iter() {
                        write_record(writer, child, depth + 1)?;
                    }
                    writer.put_len(list.removed_ids().len())?;
                    for id in list.removed_ids() {
                        writer.put_i32(*id)?;
                    }
                }
                Stage::Done
            }
            Stage::Done => Stage::Done,
        };
    }
    Ok(())
}

fn read_record(
    reader: &mut MarshalReader<'_>,
    registry: &SchemaRegistry,
    depth: usize,
) -> ContactsResult<Record> {
    if depth > MAX_NESTING {
        return Err(ContactsError::invalid("record nesting too deep to unmarshal"));
    }
    let mut stage = Stage::Common;
    let mut record = None;
    let mut flags = Vec::new();

    while stage != Stage::Done {
        stage = match stage {
            Stage::Common => {
                let uri = reader.get_required_str("record view uri")?;
                let created = registry.create_record(&uri)?;
                let count = reader.get_len(1)?;
                if count != created.schema().len() {
                    return Err(ContactsError::invalid(format!(
                        "view {uri} has {} properties, buffer carries {count}",
                        created.schema().len()
                    )));
                }
                flags = (0..count)
                    .map(|_| reader.get_u8())
                    .collect::<ContactsResult<Vec<_>>>()?;
                record = Some(created);
                Stage::Fields
            }
            Stage::Fields => {
                let target = staged(&mut record)?;
                let schema = std::sync::Arc::clone(target.schema());
                for (index, descriptor) in schema.descriptors().iter().enumerate() {
                    if !descriptor.kind.is_scalar() {
                        continue;
                    }
                    let value = read_value(reader, descriptor.kind)?;
                    let flag = flags[index];
                    if flag & FLAG_UNSET != 0 {
                        target.set_slot(index, Slot::Unset);
                    } else if flag & FLAG_PRESENT != 0 {
                        target.load(index, value);
                    }
                    if flag & FLAG_DIRTY != 0 {
                        target.mark_dirty(index);
                    }
                }
                Stage::Children
            }
            Stage::Children => {
                let target = staged(&mut record)?;
                let schema = std::sync::Arc::clone(target.schema());
                for (index, descriptor) in schema.descriptors().iter().enumerate() {
                    if descriptor.kind.is_scalar() {
                        continue;
                    }
                    let flag = flags[index];
                    if flag & FLAG_DIRTY != 0 {
                        target.mark_dirty(index);
                    }
                    if flag & FLAG_UNSET != 0 {
                        target.set_slot(index, Slot::Unset);
                        continue;
                    }
                    let count = reader.get_len(MIN_RECORD_BYTES)?;
                    for _ in 0..count {
                        let child = read_record(reader, registry, depth + 1)?;
                        if Some(child.view_uri()) != descriptor.child_view {
                            return Err(ContactsError::invalid(format!(
                                "child of view {} under property {}",
                                child.view_uri(),
                                descriptor.name
                            )));
                        }
                        target.children_at_mut(index)?.append(child)?;
                    }
                    let removed = reader.get_len(4)?;
                    for _ in 0..removed {
                        let id = reader.get_i32()?;
                        target.children_at_mut(index)?.mark_removed(id);
                    }
                }
                Stage::Done
            }
            Stage::Done => Stage::Done,
        };
    }

    record.ok_or_else(|| ContactsError::Internal("unmarshal produced no record".to_string()))
}

fn staged(record: &mut Option<Record>) -> ContactsResult<&mut Record> {
    record
        .as_mut()
        .ok_or_else(|| ContactsError::Internal("unmarshal stage out of order".to_string()))
}

fn write_value(writer: &mut MarshalWriter, value: &Value) -> ContactsResult<()> {
    match value {
        Value::Str(text) => writer.put_str(text.as_deref()),
        Value::Bool(flag) => writer.put_bool(*flag),
        Value::Int(number) => writer.put_i32(*number),
        Value::UInt(number) => writer.put_u32(*number),
        Value::LongLong(number) => writer.put_i64(*number),
        Value::Double(number) => writer.put_f64(*number),
    }
}

fn read_value(reader: &mut MarshalReader<'_>, kind: DataKind) -> ContactsResult<Value> {
    Ok(match kind {
        DataKind::Str => Value::Str(reader.get_str()?),
        DataKind::Bool => Value::Bool(reader.get_bool()?),
        DataKind::Int => Value::Int(reader.get_i32()?),
        DataKind::UInt => Value::UInt(reader.get_u32()?),
        DataKind::LongLong => Value::LongLong(reader.get_i64()?),
        DataKind::Double => Value::Double(reader.get_f64()?),
        DataKind::RecordList => {
            return Err(ContactsError::Internal(
                "record list is not a field value".to_string(),
            ))
        }
    })
}

/// Writes a value prefixed with its kind tag, for self-describing payloads
/// such as filter conditions.
pub(crate) fn write_tagged_value(writer: &mut MarshalWriter, value: &Value) -> ContactsResult<()> {
    let tag = match value {
        Value::Str(_) => 0,
        Value::Bool(_) => 1,
        Value::Int(_) => 2,
        Value::UInt(_) => 3,
        Value::LongLong(_) => 4,
        Value::Double(_) => 5,
    };
    writer.put_u8(tag)?;
    write_value(writer, value)
}

pub(crate) fn read_tagged_value(reader: &mut MarshalReader<'_>) -> ContactsResult<Value> {
    let kind = match reader.get_u8()? {
        0 => DataKind::Str,
        1 => DataKind::Bool,
        2 => DataKind::Int,
        3 => DataKind::UInt,
        4 => DataKind::LongLong,
        5 => DataKind::Double,
        other => {
            return Err(ContactsError::invalid(format!("unknown value tag {other}")));
        }
    };
    read_value(reader, kind)
}

#[cfg(test)]
mod tests {
    use super::{record_from_bytes, record_to_bytes};
    use crate::error::ContactsError;
    use crate::record::{PropertyState, Value};
    use crate::schema::property::{contact, number, person, view};
    use crate::schema::SchemaRegistry;

    #[test]
    fn dirty_bits_and_states_survive_the_wire() {
        let registry = SchemaRegistry::builtin().unwrap();
        let mut record = registry.create_record(view::NUMBER).unwrap();
        record.set_str(number::NUMBER, Some("555-1234")).unwrap();
        record.set_str(number::LABEL, None).unwrap();

        let decoded = record_from_bytes(&record_to_bytes(&record).unwrap(), &registry).unwrap();
        assert_eq!(decoded, record);
        assert_eq!(decoded.dirty_properties(), vec![number::LABEL, number::NUMBER]);
        assert_eq!(
            decoded.property_state(number::LABEL).unwrap(),
            PropertyState::Present
        );
        assert_eq!(
            decoded.property_state(number::TYPE).unwrap(),
            PropertyState::Default
        );
    }

    #[test]
    fn projection_mask_is_preserved() {
        let registry = SchemaRegistry::builtin().unwrap();
        let mut record = registry.create_record(view::PERSON).unwrap();
        record.apply_projection(&[person::ID, person::DISPLAY_NAME]);

        let decoded = record_from_bytes(&record_to_bytes(&record).unwrap(), &registry).unwrap();
        assert!(decoded.is_projected());
        assert_eq!(
            decoded.property_state(person::RINGTONE_PATH).unwrap(),
            PropertyState::Unset
        );
    }

    #[test]
    fn removed_child_ids_travel_with_the_parent() {
        let registry = SchemaRegistry::builtin().unwrap();
        let mut contact_record = registry.create_record(view::CONTACT).unwrap();
        let mut child = registry.create_record(view::NUMBER).unwrap();
        child.load_property(number::ID, Value::Int(9)).unwrap();
        let handle = child.handle();
        contact_record.add_child(contact::NUMBERS, child).unwrap();
        contact_record.remove_child(contact::NUMBERS, handle).unwrap();

        let decoded =
            record_from_bytes(&record_to_bytes(&contact_record).unwrap(), &registry).unwrap();
        assert_eq!(
            decoded.children(contact::NUMBERS).unwrap().removed_ids(),
            &[9]
        );
    }

    #[test]
    fn truncated_record_fails_whole() {
        let registry = SchemaRegistry::builtin().unwrap();
        let mut record = registry.create_record(view::NUMBER).unwrap();
        record.set_str(number::NUMBER, Some("555")).unwrap();
        let bytes = record_to_bytes(&record).unwrap();

        let err = record_from_bytes(&bytes[..bytes.len() - 2], &registry).unwrap_err();
        assert!(matches!(err, ContactsError::NoData(_)));
    }

    #[test]
    fn unknown_view_is_invalid_parameter() {
        let registry = SchemaRegistry::builtin().unwrap();
        let mut writer = super::MarshalWriter::new();
        writer.put_str(Some("contacts.unknown")).unwrap();
        writer.put_u32(0).unwrap();
        let err = record_from_bytes(writer.as_slice(), &registry).unwrap_err();
        assert!(matches!(err, ContactsError::InvalidParameter(_)));
    }
}
