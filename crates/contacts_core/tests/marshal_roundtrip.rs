use contacts_core::marshal::{
    marshal_list, marshal_query, record_from_bytes, record_to_bytes, unmarshal_list,
    unmarshal_query, MarshalReader, MarshalWriter,
};
use contacts_core::schema::property::{address, contact, email, name, number, person, view};
use contacts_core::{ContactsError, Filter, MatchOp, Query, Record, RecordList, SchemaRegistry};

fn contact_tree(registry: &SchemaRegistry) -> Record {
    let mut record = registry.create_record(view::CONTACT).unwrap();
    record.set_str(contact::RINGTONE_PATH, Some("")).unwrap();
    record.set_bool(contact::IS_FAVORITE, true).unwrap();

    let mut full_name = registry.create_record(view::NAME).unwrap();
    full_name.set_str(name::FIRST, Some("Zoë")).unwrap();
    full_name.set_str(name::LAST, Some("Ångström")).unwrap();
    record.add_child(contact::NAME, full_name).unwrap();

    let mut cell = registry.create_record(view::NUMBER).unwrap();
    cell.set_str(number::NUMBER, Some("+1 (555) 010-9999")).unwrap();
    cell.set_int(number::TYPE, number::TYPE_CELL).unwrap();
    cell.set_bool(number::IS_DEFAULT, true).unwrap();
    record.add_child(contact::NUMBERS, cell).unwrap();

    let mut mail = registry.create_record(view::EMAIL).unwrap();
    mail.set_str(email::EMAIL, Some("zoe@example.org")).unwrap();
    mail.set_str(email::LABEL, None).unwrap();
    record.add_child(contact::EMAILS, mail).unwrap();

    let mut home = registry.create_record(view::ADDRESS).unwrap();
    home.set_str(address::STREET, Some("1 Main St")).unwrap();
    record.add_child(contact::ADDRESSES, home).unwrap();
    record
}

#[test]
fn contact_tree_decodes_equal() {
    let registry = SchemaRegistry::builtin().unwrap();
    let record = contact_tree(&registry);

    let decoded = record_from_bytes(&record_to_bytes(&record).unwrap(), &registry).unwrap();
    assert_eq!(decoded, record);
    assert_eq!(decoded.get_str(contact::RINGTONE_PATH).unwrap().as_deref(), Some(""));
    assert_eq!(decoded.get_str(contact::VIBRATION).unwrap(), None);

    let first_name = decoded.child_at(contact::NAME, 0).unwrap();
    assert_eq!(first_name.get_str(name::FIRST).unwrap().as_deref(), Some("Zoë"));
    assert!(first_name.is_dirty(name::LAST).unwrap());
    assert!(!first_name.is_dirty(name::PREFIX).unwrap());
}

#[test]
fn record_list_decodes_in_order() {
    let registry = SchemaRegistry::builtin().unwrap();
    let mut list = RecordList::for_view(view::CONTACT);
    list.append(contact_tree(&registry)).unwrap();
    list.append(registry.create_record(view::CONTACT).unwrap()).unwrap();

    let mut writer = MarshalWriter::new();
    marshal_list(&mut writer, &list).unwrap();
    let mut reader = MarshalReader::new(writer.as_slice());
    let decoded = unmarshal_list(&mut reader, &registry).unwrap();
    reader.finish().unwrap();

    assert_eq!(decoded.view_uri(), Some(view::CONTACT));
    assert_eq!(decoded.len(), 2);
    assert_eq!(decoded.get(0), list.get(0));
    assert_eq!(decoded.get(1), list.get(1));
}

#[test]
fn decoded_query_still_validates() {
    let registry = SchemaRegistry::builtin().unwrap();
    let query = Query::new(view::PERSON)
        .with_filter(Filter::or(vec![
            Filter::contains(person::DISPLAY_NAME, "ada"),
            Filter::and(vec![
                Filter::eq(person::IS_FAVORITE, true),
                Filter::condition(person::LINK_COUNT, MatchOp::GreaterOrEqual, 2),
            ]),
        ]))
        .sort_by(person::DISPLAY_NAME, false)
        .project(&[person::ID, person::DISPLAY_NAME]);

    let mut writer = MarshalWriter::new();
    marshal_query(&mut writer, &query).unwrap();
    let mut reader = MarshalReader::new(writer.as_slice());
    let decoded = unmarshal_query(&mut reader).unwrap();
    reader.finish().unwrap();

    assert_eq!(decoded, query);
    decoded
        .validate(registry.schema(view::PERSON).unwrap())
        .unwrap();
}

#[test]
fn trailing_bytes_are_rejected() {
    let registry = SchemaRegistry::builtin().unwrap();
    let mut bytes = record_to_bytes(&registry.create_record(view::EMAIL).unwrap()).unwrap();
    bytes.push(0);

    let err = record_from_bytes(&bytes, &registry).unwrap_err();
    assert!(matches!(err, ContactsError::InvalidParameter(_)));
}
