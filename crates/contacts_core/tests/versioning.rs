use contacts_core::db::open_db_in_memory;
use contacts_core::schema::property::{addressbook, contact, name, number, updated_info, view};
use contacts_core::{ChangeType, ContactsService, Record, SchemaRegistry};

fn named_contact(service: &ContactsService, first: &str) -> Record {
    let mut record = service.create_record(view::CONTACT).unwrap();
    let mut full_name = service.create_record(view::NAME).unwrap();
    full_name.set_str(name::FIRST, Some(first)).unwrap();
    record.add_child(contact::NAME, full_name).unwrap();
    record
}

fn change_rows(service: &ContactsService, since: i64) -> Vec<(i32, i32, i64)> {
    let changes = service
        .get_changes_by_version(view::CONTACT, None, since)
        .unwrap();
    changes
        .value
        .iter()
        .map(|row| {
            (
                row.get_int(updated_info::RECORD_ID).unwrap(),
                row.get_int(updated_info::TYPE).unwrap(),
                row.get_longlong(updated_info::VERSION).unwrap(),
            )
        })
        .collect()
}

#[test]
fn every_mutation_bumps_the_version_once() {
    let service = ContactsService::open_in_memory().unwrap();
    assert_eq!(service.get_current_version().unwrap(), 0);

    let mut first = named_contact(&service, "Ada");
    let inserted = service.insert_record(&mut first).unwrap();
    assert_eq!(inserted.version, 1);

    let mut second = named_contact(&service, "Grace");
    let mut third = named_contact(&service, "Alan");
    service.insert_record(&mut second).unwrap();
    service.insert_record(&mut third).unwrap();
    assert_eq!(service.get_current_version().unwrap(), 3);

    let ids = [second.id().unwrap(), third.id().unwrap()];
    let deleted = service.delete_records(view::CONTACT, &ids).unwrap();
    assert_eq!(deleted, 4);
}

#[test]
fn reads_do_not_change_the_version() {
    let service = ContactsService::open_in_memory().unwrap();
    let mut record = named_contact(&service, "Ada");
    let committed = service.insert_record(&mut record).unwrap();

    service.get_all_records(view::CONTACT, 0, 0).unwrap();
    service.get_count(view::PERSON).unwrap();
    service
        .get_changes_by_version(view::CONTACT, None, 0)
        .unwrap();
    assert_eq!(service.get_current_version().unwrap(), committed.version);
}

#[test]
fn changes_since_a_version_are_listed_oldest_first() {
    let service = ContactsService::open_in_memory().unwrap();
    let mut record = named_contact(&service, "Ada");
    let contact_id = service.insert_record(&mut record).unwrap().value;
    let after_insert = service.get_current_version().unwrap();

    let mut cell = service.create_record(view::NUMBER).unwrap();
    cell.set_int(number::CONTACT_ID, contact_id).unwrap();
    cell.set_str(number::NUMBER, Some("555-1234")).unwrap();
    service.insert_record(&mut cell).unwrap();
    service.delete_record(view::CONTACT, contact_id).unwrap();

    assert_eq!(
        change_rows(&service, 0),
        vec![
            (contact_id, ChangeType::Inserted.code(), 1),
            (contact_id, ChangeType::Updated.code(), 2),
            (contact_id, ChangeType::Deleted.code(), 3),
        ]
    );
    assert_eq!(
        change_rows(&service, after_insert),
        vec![
            (contact_id, ChangeType::Updated.code(), 2),
            (contact_id, ChangeType::Deleted.code(), 3),
        ]
    );

    let latest = service
        .get_changes_by_version(view::CONTACT, None, 3)
        .unwrap();
    assert!(latest.value.is_empty());
    assert_eq!(latest.version, 3);
}

#[test]
fn changes_can_be_narrowed_to_one_addressbook() {
    let service = ContactsService::open_in_memory().unwrap();
    let mut book = service.create_record(view::ADDRESSBOOK).unwrap();
    book.set_str(addressbook::NAME, Some("work")).unwrap();
    let book_id = service.insert_record(&mut book).unwrap().value;

    let mut phone_contact = named_contact(&service, "Ada");
    service.insert_record(&mut phone_contact).unwrap();
    let mut work_contact = named_contact(&service, "Grace");
    work_contact.set_int(contact::ADDRESSBOOK_ID, book_id).unwrap();
    let work_id = service.insert_record(&mut work_contact).unwrap().value;

    let scoped = service
        .get_changes_by_version(view::CONTACT, Some(book_id), 0)
        .unwrap();
    assert_eq!(scoped.value.len(), 1);
    let row = scoped.value.first().unwrap();
    assert_eq!(row.get_int(updated_info::RECORD_ID).unwrap(), work_id);
    assert_eq!(row.get_int(updated_info::ADDRESSBOOK_ID).unwrap(), book_id);

    let everything = service
        .get_changes_by_version(view::CONTACT, None, 0)
        .unwrap();
    assert_eq!(everything.value.len(), 2);
}

#[test]
fn failed_mutation_leaves_no_change_rows() {
    let service = ContactsService::open_in_memory().unwrap();
    let mut orphan = service.create_record(view::NUMBER).unwrap();
    orphan.set_int(number::CONTACT_ID, 42).unwrap();
    orphan.set_str(number::NUMBER, Some("555")).unwrap();

    assert!(service.insert_record(&mut orphan).is_err());
    assert_eq!(service.get_current_version().unwrap(), 0);
    assert!(change_rows(&service, 0).is_empty());
}

#[test]
fn versions_past_the_i32_range_are_listed() {
    let conn = open_db_in_memory().unwrap();
    let start = i64::from(i32::MAX);
    conn.execute("UPDATE db_version SET version = ?1;", [start])
        .unwrap();
    let service = ContactsService::new(conn, SchemaRegistry::connect().unwrap());

    let mut record = named_contact(&service, "Ada");
    let committed = service.insert_record(&mut record).unwrap();
    assert_eq!(committed.version, start + 1);

    let stored = service.get_record(view::CONTACT, committed.value).unwrap();
    assert_eq!(stored.get_longlong(contact::CREATED_VER).unwrap(), start + 1);

    assert_eq!(
        change_rows(&service, start),
        vec![(committed.value, ChangeType::Inserted.code(), start + 1)]
    );
    assert!(change_rows(&service, start + 1).is_empty());
}
