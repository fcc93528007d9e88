//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `contacts_core` linkage and list the registered views.
//! - Run one insert/get/marshal round trip against an in-memory store.

use contacts_core::marshal::{record_from_bytes, record_to_bytes};
use contacts_core::schema::property::{contact, name, number, view};
use contacts_core::{ContactsResult, ContactsService};
use std::process::ExitCode;

fn main() -> ExitCode {
    println!("contacts_core ping={}", contacts_core::ping());
    println!("contacts_core version={}", contacts_core::core_version());

    match round_trip() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("contacts_core round_trip=error code={} error={err}", err.code().as_i32());
            ExitCode::FAILURE
        }
    }
}

fn round_trip() -> ContactsResult<()> {
    let service = ContactsService::open_in_memory()?;
    for uri in service.registry().view_uris() {
        println!("contacts_core view={uri}");
    }

    let mut contact_record = service.create_record(view::CONTACT)?;
    let mut name_record = service.create_record(view::NAME)?;
    name_record.set_str(name::FIRST, Some("Ada"))?;
    name_record.set_str(name::LAST, Some("Lovelace"))?;
    contact_record.add_child(contact::NAME, name_record)?;

    let mut number_record = service.create_record(view::NUMBER)?;
    number_record.set_str(number::NUMBER, Some("555-1234"))?;
    number_record.set_int(number::TYPE, number::TYPE_CELL)?;
    number_record.set_bool(number::IS_DEFAULT, true)?;
    contact_record.add_child(contact::NUMBERS, number_record)?;

    let committed = service.insert_record(&mut contact_record)?;
    println!(
        "contacts_core insert id={} version={}",
        committed.value, committed.version
    );

    let stored = service.get_record(view::CONTACT, committed.value)?;
    let bytes = record_to_bytes(&stored)?;
    let decoded = record_from_bytes(&bytes, service.registry())?;
    println!(
        "contacts_core marshal bytes={} equal={}",
        bytes.len(),
        decoded == stored
    );

    match serde_json::to_string_pretty(&decoded) {
        Ok(json) => println!("{json}"),
        Err(err) => eprintln!("contacts_core json=error error={err}"),
    }
    Ok(())
}
