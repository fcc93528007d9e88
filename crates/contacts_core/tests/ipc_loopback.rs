use contacts_core::ipc::{encode_request, function};
use contacts_core::schema::property::{addressbook, contact, name, number, person, view};
use contacts_core::{
    ContactsError, ContactsService, Filter, IpcClient, IpcServer, IpcTransport, LoopbackTransport,
    Query, Record, RecordList, SchemaRegistry, TokenPolicy,
};

fn loopback_client() -> IpcClient<LoopbackTransport> {
    let service = ContactsService::open_in_memory().unwrap();
    let registry = service.registry().clone();
    IpcClient::new(LoopbackTransport::new(IpcServer::new(service)), registry)
}

fn named_contact(registry: &SchemaRegistry, first: &str, last: &str) -> Record {
    let mut record = registry.create_record(view::CONTACT).unwrap();
    let mut full_name = registry.create_record(view::NAME).unwrap();
    full_name.set_str(name::FIRST, Some(first)).unwrap();
    full_name.set_str(name::LAST, Some(last)).unwrap();
    record.add_child(contact::NAME, full_name).unwrap();
    record
}

#[test]
fn insert_and_get_over_loopback() {
    let mut client = loopback_client();
    let registry = client.registry().clone();
    let mut record = named_contact(&registry, "Ada", "Lovelace");
    let mut cell = registry.create_record(view::NUMBER).unwrap();
    cell.set_str(number::NUMBER, Some("555-1234")).unwrap();
    record.add_child(contact::NUMBERS, cell).unwrap();
    let handle = record.handle();

    let committed = client.insert_record(&mut record).unwrap();
    assert_eq!(record.id(), Some(committed.value));
    assert_eq!(record.handle(), handle);
    assert!(!record.has_changes());
    assert!(record.child_at(contact::NUMBERS, 0).unwrap().id().is_some());
    assert_eq!(client.last_version(), Some(committed.version));

    let loaded = client.get_record(view::CONTACT, committed.value).unwrap();
    assert_eq!(loaded, record);
    assert_eq!(
        loaded.get_str(contact::DISPLAY_NAME).unwrap().as_deref(),
        Some("Ada Lovelace")
    );
}

#[test]
fn client_tracks_the_newest_version() {
    let mut client = loopback_client();
    let registry = client.registry().clone();

    let mut batch = RecordList::for_view(view::CONTACT);
    batch.append(named_contact(&registry, "Ada", "Lovelace")).unwrap();
    batch.append(named_contact(&registry, "Grace", "Hopper")).unwrap();
    let inserted = client.insert_records(&mut batch).unwrap();
    assert_eq!(inserted.value.len(), 2);

    let record = batch.get_mut(0).unwrap();
    record
        .child_at_mut(contact::NAME, 0)
        .unwrap()
        .set_str(name::LAST, Some("King"))
        .unwrap();
    let updated = client.update_record(record).unwrap();
    assert_eq!(updated, inserted.version + 1);
    assert_eq!(client.last_version(), Some(updated));
    assert_eq!(client.get_current_version().unwrap(), updated);

    let changes = client
        .get_changes_by_version(view::CONTACT, None, inserted.version)
        .unwrap();
    assert_eq!(changes.value.len(), 1);
    assert_eq!(changes.version, updated);

    let deleted = client.delete_records(view::CONTACT, &inserted.value).unwrap();
    assert_eq!(client.last_version(), Some(deleted));
    assert_eq!(client.get_count(view::CONTACT).unwrap(), 0);
}

#[test]
fn queries_and_search_cross_the_wire() {
    let mut client = loopback_client();
    let registry = client.registry().clone();
    for (first, last) in [("Ada", "Lovelace"), ("Alan", "Turing"), ("Grace", "Hopper")] {
        let mut record = named_contact(&registry, first, last);
        client.insert_record(&mut record).unwrap();
    }

    let query = Query::new(view::PERSON)
        .with_filter(Filter::contains(person::DISPLAY_NAME, "a"))
        .sort_by(person::DISPLAY_NAME, true)
        .project(&[person::ID, person::DISPLAY_NAME]);
    let persons = client.get_records_with_query(&query, 0, 2).unwrap();
    let names: Vec<String> = persons
        .iter()
        .map(|record| record.get_str(person::DISPLAY_NAME).unwrap().unwrap())
        .collect();
    assert_eq!(names, vec!["Ada Lovelace", "Alan Turing"]);
    assert!(persons.iter().all(Record::is_projected));
    assert_eq!(client.get_count_with_query(&query).unwrap(), 3);

    let found = client.search_records(view::PERSON, "hopper", 0, 0).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(client.get_all_records(view::PERSON, 1, 0).unwrap().len(), 2);
}

#[test]
fn committed_write_reports_its_version_when_the_reply_overflows() {
    let service = ContactsService::open_in_memory().unwrap();
    let registry = service.registry().clone();
    let server = IpcServer::new(service).with_max_reply_bytes(48);
    let mut client = IpcClient::new(LoopbackTransport::new(server), registry.clone());

    let mut record = named_contact(&registry, "Ada", "Lovelace");
    let committed = client.insert_record(&mut record).unwrap();
    assert_eq!(record.id(), Some(committed.value));
    assert!(record.has_changes());
    assert_eq!(client.last_version(), Some(committed.version));

    assert_eq!(client.get_count(view::CONTACT).unwrap(), 1);
    assert_eq!(client.get_current_version().unwrap(), committed.version);
}

#[test]
fn remote_failures_keep_their_error_kind() {
    let mut client = loopback_client();

    assert!(matches!(
        client.get_record(view::CONTACT, 404),
        Err(ContactsError::NoData(_))
    ));

    let mut nameless = client.registry().create_record(view::ADDRESSBOOK).unwrap();
    nameless.set_str(addressbook::NAME, Some("")).unwrap();
    assert!(matches!(
        client.insert_record(&mut nameless),
        Err(ContactsError::InvalidParameter(_))
    ));
    assert!(nameless.has_changes());
    assert_eq!(client.last_version(), None);
}

#[test]
fn denied_writes_report_permission_denied() {
    let service = ContactsService::open_in_memory()
        .unwrap()
        .with_access_policy(TokenPolicy::read_only());
    let registry = service.registry().clone();
    let mut client = IpcClient::new(LoopbackTransport::new(IpcServer::new(service)), registry);

    let mut book = client.registry().create_record(view::ADDRESSBOOK).unwrap();
    book.set_str(addressbook::NAME, Some("work")).unwrap();
    assert!(matches!(
        client.insert_record(&mut book),
        Err(ContactsError::PermissionDenied(_))
    ));
    assert_eq!(client.get_count(view::ADDRESSBOOK).unwrap(), 1);
}

#[test]
fn unknown_function_is_not_supported() {
    let service = ContactsService::open_in_memory().unwrap();
    let mut transport = LoopbackTransport::new(IpcServer::new(service));

    let reply = transport
        .call(&encode_request("merge_contacts", &[]).unwrap())
        .unwrap();
    let err = contacts_core::ipc::decode_response(&reply, false).unwrap_err();
    assert!(matches!(err, ContactsError::NotSupported(_)));

    let reply = transport
        .call(&encode_request(function::GET_CURRENT_VERSION, &[]).unwrap())
        .unwrap();
    let (version, payload) = contacts_core::ipc::decode_response(&reply, false).unwrap();
    assert_eq!(version, None);
    assert_eq!(payload, 0_i64.to_le_bytes());
}

#[cfg(unix)]
#[test]
fn unix_socket_transport_serves_calls() {
    use contacts_core::ipc::{serve_unix_stream, UnixSocketTransport};
    use std::os::unix::net::UnixListener;

    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("contacts.sock");
    let listener = UnixListener::bind(&socket).unwrap();

    let server = std::thread::spawn(move || {
        let service = ContactsService::open_in_memory().unwrap();
        let server = IpcServer::new(service);
        let (stream, _) = listener.accept().unwrap();
        serve_unix_stream(&server, stream).unwrap();
    });

    let registry = SchemaRegistry::connect().unwrap();
    let mut client = IpcClient::new(UnixSocketTransport::connect(&socket).unwrap(), registry.clone());
    let mut record = named_contact(&registry, "Ada", "Lovelace");
    let committed = client.insert_record(&mut record).unwrap();
    assert_eq!(client.get_count(view::CONTACT).unwrap(), 1);
    assert_eq!(client.get_current_version().unwrap(), committed.version);

    drop(client);
    server.join().unwrap();
}
