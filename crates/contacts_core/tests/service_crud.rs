use contacts_core::marshal::{record_from_bytes, record_to_bytes};
use contacts_core::schema::property::{addressbook, contact, name, number, person, view};
use contacts_core::{
    ContactsError, ContactsService, Filter, PropertyState, Query, Record, RecordList, SearchRange,
};

fn new_contact(service: &ContactsService, first: &str, last: &str) -> Record {
    let mut record = service.create_record(view::CONTACT).unwrap();
    let mut full_name = service.create_record(view::NAME).unwrap();
    full_name.set_str(name::FIRST, Some(first)).unwrap();
    full_name.set_str(name::LAST, Some(last)).unwrap();
    record.add_child(contact::NAME, full_name).unwrap();
    record
}

fn new_number(service: &ContactsService, raw: &str) -> Record {
    let mut record = service.create_record(view::NUMBER).unwrap();
    record.set_str(number::NUMBER, Some(raw)).unwrap();
    record.set_int(number::TYPE, number::TYPE_CELL).unwrap();
    record
}

fn addressbook_named(service: &ContactsService, label: &str) -> Record {
    let mut record = service.create_record(view::ADDRESSBOOK).unwrap();
    record.set_str(addressbook::NAME, Some(label)).unwrap();
    record
}

fn ids(list: &RecordList) -> Vec<i32> {
    list.iter().filter_map(Record::id).collect()
}

#[test]
fn number_inserted_under_contact_reads_back_clean() {
    let service = ContactsService::open_in_memory().unwrap();
    let mut parent = new_contact(&service, "Ada", "Lovelace");
    let contact_id = service.insert_record(&mut parent).unwrap().value;

    let mut cell = new_number(&service, "555-1234");
    cell.set_int(number::CONTACT_ID, contact_id).unwrap();
    cell.set_bool(number::IS_DEFAULT, true).unwrap();
    let number_id = service.insert_record(&mut cell).unwrap().value;
    assert_eq!(cell.id(), Some(number_id));

    let loaded = service.get_record(view::NUMBER, number_id).unwrap();
    assert_eq!(loaded.get_str(number::NUMBER).unwrap().as_deref(), Some("555-1234"));
    assert_eq!(
        loaded.get_str(number::NORMALIZED_NUMBER).unwrap().as_deref(),
        Some("5551234")
    );
    assert_eq!(loaded.get_int(number::CONTACT_ID).unwrap(), contact_id);
    assert!(loaded.get_bool(number::IS_DEFAULT).unwrap());
    assert!(!loaded.has_changes());

    let decoded = record_from_bytes(&record_to_bytes(&loaded).unwrap(), service.registry()).unwrap();
    assert_eq!(decoded, loaded);
}

#[test]
fn contact_insert_creates_person_and_derives_display_name() {
    let service = ContactsService::open_in_memory().unwrap();
    let mut record = new_contact(&service, "Ada", "Lovelace");
    record.add_child(contact::NUMBERS, new_number(&service, "555-0000")).unwrap();

    let contact_id = service.insert_record(&mut record).unwrap().value;
    assert!(!record.has_changes());
    let child = record.child_at(contact::NUMBERS, 0).unwrap();
    assert!(child.id().is_some());

    let stored = service.get_record(view::CONTACT, contact_id).unwrap();
    assert_eq!(
        stored.get_str(contact::DISPLAY_NAME).unwrap().as_deref(),
        Some("Ada Lovelace")
    );
    assert!(stored.get_str(contact::UID).unwrap().is_some());

    let person_id = stored.get_int(contact::PERSON_ID).unwrap();
    let owner = service.get_record(view::PERSON, person_id).unwrap();
    assert_eq!(owner.get_int(person::DISPLAY_CONTACT_ID).unwrap(), contact_id);
    assert!(owner.get_bool(person::HAS_PHONENUMBER).unwrap());
    assert_eq!(owner.get_int(person::LINK_COUNT).unwrap(), 1);
}

#[test]
fn child_removal_and_repeat_update_keep_children_consistent() {
    let service = ContactsService::open_in_memory().unwrap();
    let mut record = new_contact(&service, "Grace", "Hopper");
    record.add_child(contact::NUMBERS, new_number(&service, "111")).unwrap();
    record.add_child(contact::NUMBERS, new_number(&service, "222")).unwrap();
    let contact_id = service.insert_record(&mut record).unwrap().value;

    let first = record.child_at(contact::NUMBERS, 0).unwrap().handle();
    record.remove_child(contact::NUMBERS, first).unwrap();
    service.update_record(&mut record).unwrap();
    service.update_record(&mut record).unwrap();

    let stored = service.get_record(view::CONTACT, contact_id).unwrap();
    assert_eq!(stored.child_count(contact::NUMBERS).unwrap(), 1);
    assert_eq!(
        stored
            .child_at(contact::NUMBERS, 0)
            .unwrap()
            .get_str(number::NUMBER)
            .unwrap()
            .as_deref(),
        Some("222")
    );
    assert_eq!(service.get_count(view::NUMBER).unwrap(), 1);
}

#[test]
fn deleting_last_contact_removes_its_person() {
    let service = ContactsService::open_in_memory().unwrap();
    let mut record = new_contact(&service, "Alan", "Turing");
    let contact_id = service.insert_record(&mut record).unwrap().value;
    assert_eq!(service.get_count(view::PERSON).unwrap(), 1);

    service.delete_record(view::CONTACT, contact_id).unwrap();

    assert_eq!(service.get_count(view::PERSON).unwrap(), 0);
    assert!(matches!(
        service.get_record(view::CONTACT, contact_id),
        Err(ContactsError::NoData(_))
    ));
}

#[test]
fn pages_concatenate_to_the_full_listing() {
    let service = ContactsService::open_in_memory().unwrap();
    for index in 0..5 {
        let mut record = addressbook_named(&service, &format!("book-{index}"));
        service.insert_record(&mut record).unwrap();
    }

    let all = service.get_all_records(view::ADDRESSBOOK, 0, 0).unwrap();
    assert_eq!(all.len(), 6);
    assert_eq!(service.get_count(view::ADDRESSBOOK).unwrap(), 6);

    let mut paged = Vec::new();
    for offset in (0..all.len()).step_by(2) {
        let page = service.get_all_records(view::ADDRESSBOOK, offset, 2).unwrap();
        assert!(page.len() <= 2);
        paged.extend(page.iter().map(|record| {
            record.get_int(addressbook::ID).unwrap()
        }));
    }
    let listed: Vec<i32> = all
        .iter()
        .map(|record| record.get_int(addressbook::ID).unwrap())
        .collect();
    assert_eq!(paged, listed);
    assert!(service
        .get_all_records(view::ADDRESSBOOK, 6, 2)
        .unwrap()
        .is_empty());
}

#[test]
fn repeated_query_returns_identical_results() {
    let service = ContactsService::open_in_memory().unwrap();
    for (first, last) in [("Ada", "Lovelace"), ("Adele", "Goldberg"), ("Barbara", "Liskov")] {
        let mut record = new_contact(&service, first, last);
        service.insert_record(&mut record).unwrap();
    }

    let query = Query::new(view::CONTACT)
        .with_filter(Filter::contains(contact::DISPLAY_NAME, "ad"))
        .sort_by(contact::DISPLAY_NAME, false);
    let first_run = service.get_records_with_query(&query, 0, 0).unwrap();
    let second_run = service.get_records_with_query(&query, 0, 0).unwrap();

    assert_eq!(first_run.len(), 2);
    assert_eq!(ids(&first_run), ids(&second_run));
    assert_eq!(first_run.get(0), second_run.get(0));
    assert_eq!(
        first_run.get(0).unwrap().get_str(contact::DISPLAY_NAME).unwrap().as_deref(),
        Some("Adele Goldberg")
    );
    assert_eq!(service.get_count_with_query(&query).unwrap(), 2);
}

#[test]
fn projection_leaves_other_properties_unset() {
    let service = ContactsService::open_in_memory().unwrap();
    let mut record = new_contact(&service, "Ada", "Lovelace");
    record.set_str(contact::RINGTONE_PATH, Some("bell.ogg")).unwrap();
    service.insert_record(&mut record).unwrap();

    let query = Query::new(view::PERSON).project(&[person::ID, person::DISPLAY_NAME]);
    let persons = service.get_records_with_query(&query, 0, 0).unwrap();
    let projected = persons.first().unwrap();

    assert!(projected.is_projected());
    assert_eq!(
        projected.get_str(person::DISPLAY_NAME).unwrap().as_deref(),
        Some("Ada Lovelace")
    );
    assert_eq!(
        projected.property_state(person::RINGTONE_PATH).unwrap(),
        PropertyState::Unset
    );
    assert_eq!(projected.get_str(person::RINGTONE_PATH).unwrap(), None);
}

#[test]
fn invalid_query_is_rejected_before_running() {
    let service = ContactsService::open_in_memory().unwrap();
    let query = Query::new(view::PERSON).with_filter(Filter::eq(number::NUMBER, "555"));

    assert!(matches!(
        service.get_records_with_query(&query, 0, 0),
        Err(ContactsError::InvalidParameter(_))
    ));
    assert!(matches!(
        service.get_count_with_query(&query),
        Err(ContactsError::InvalidParameter(_))
    ));
}

#[test]
fn failing_batch_rolls_back_every_record() {
    let service = ContactsService::open_in_memory().unwrap();
    let before = service.get_current_version().unwrap();

    let mut batch = RecordList::for_view(view::ADDRESSBOOK);
    batch.append(addressbook_named(&service, "work")).unwrap();
    batch.append(addressbook_named(&service, "")).unwrap();

    let err = service.insert_records(&mut batch).unwrap_err();
    assert!(matches!(err, ContactsError::InvalidParameter(_)));
    assert_eq!(service.get_count(view::ADDRESSBOOK).unwrap(), 1);
    assert_eq!(service.get_current_version().unwrap(), before);
    assert!(batch.iter().all(|record| record.id().is_none() && record.has_changes()));
}

#[test]
fn batch_insert_assigns_ids_in_order() {
    let service = ContactsService::open_in_memory().unwrap();
    let mut batch = RecordList::for_view(view::ADDRESSBOOK);
    batch.append(addressbook_named(&service, "work")).unwrap();
    batch.append(addressbook_named(&service, "sim")).unwrap();

    let committed = service.insert_records(&mut batch).unwrap();
    assert_eq!(committed.value.len(), 2);
    assert_eq!(ids(&batch), committed.value);
    assert_eq!(service.get_current_version().unwrap(), committed.version);
}

#[test]
fn default_addressbook_can_be_renamed() {
    let service = ContactsService::open_in_memory().unwrap();
    let mut book = service
        .get_record(view::ADDRESSBOOK, addressbook::DEFAULT_ID)
        .unwrap();
    assert_eq!(book.id(), Some(addressbook::DEFAULT_ID));

    book.set_str(addressbook::NAME, Some("renamed")).unwrap();
    let version = service.update_record(&mut book).unwrap();
    assert_eq!(service.get_current_version().unwrap(), version);
    assert!(!book.has_changes());

    let stored = service
        .get_record(view::ADDRESSBOOK, addressbook::DEFAULT_ID)
        .unwrap();
    assert_eq!(stored.get_str(addressbook::NAME).unwrap().as_deref(), Some("renamed"));
}

#[test]
fn replace_overwrites_every_writable_property() {
    let service = ContactsService::open_in_memory().unwrap();
    let mut original = addressbook_named(&service, "work");
    original.set_int(addressbook::ACCOUNT_ID, 9).unwrap();
    let id = service.insert_record(&mut original).unwrap().value;

    let mut replacement = addressbook_named(&service, "personal");
    service.replace_record(&mut replacement, id).unwrap();

    let stored = service.get_record(view::ADDRESSBOOK, id).unwrap();
    assert_eq!(stored.get_str(addressbook::NAME).unwrap().as_deref(), Some("personal"));
    assert_eq!(stored.get_int(addressbook::ACCOUNT_ID).unwrap(), 0);
    assert_eq!(replacement.id(), Some(id));
}

#[test]
fn replace_batch_requires_matching_ids() {
    let service = ContactsService::open_in_memory().unwrap();
    let mut batch = RecordList::for_view(view::ADDRESSBOOK);
    batch.append(addressbook_named(&service, "work")).unwrap();

    assert!(matches!(
        service.replace_records(&mut batch, &[1, 2]),
        Err(ContactsError::InvalidParameter(_))
    ));
}

#[test]
fn keyword_search_covers_names_and_numbers() {
    let service = ContactsService::open_in_memory().unwrap();
    let mut record = new_contact(&service, "Ada", "Lovelace");
    record.add_child(contact::NUMBERS, new_number(&service, "555-1234")).unwrap();
    service.insert_record(&mut record).unwrap();
    let mut other = new_contact(&service, "Alan", "Turing");
    service.insert_record(&mut other).unwrap();

    assert_eq!(service.search_records(view::PERSON, "lovelace", 0, 0).unwrap().len(), 1);
    assert_eq!(
        service
            .search_records_with_range(view::PERSON, "5551234", 0, 0, SearchRange::NUMBER)
            .unwrap()
            .len(),
        1
    );
    assert!(service
        .search_records_with_range(view::PERSON, "lovelace", 0, 0, SearchRange::NUMBER)
        .unwrap()
        .is_empty());
    assert!(matches!(
        service.search_records(view::PERSON, "  ", 0, 0),
        Err(ContactsError::InvalidParameter(_))
    ));
}

#[test]
fn unknown_view_is_reported() {
    let service = ContactsService::open_in_memory().unwrap();
    let err = service.get_count("contacts.unknown").unwrap_err();
    assert!(matches!(err, ContactsError::ViewNotFound(ref uri) if uri == "contacts.unknown"));
}
