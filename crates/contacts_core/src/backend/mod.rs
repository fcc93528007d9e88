//! SQLite backends of the built-in views.
//!
//! # Responsibility
//! - Translate record CRUD and queries into SQL over the migrated schema.
//! - Register every built-in view with its descriptor table and backend.
//!
//! # Invariants
//! - Backends only run inside a connection opened by `db::open_db*`.
//! - Every mutation appends a change-log row in the same transaction.

mod addressbook;
mod child;
mod common;
mod contact;
mod person;
mod speeddial;
mod updated_info;

pub use child::{address_has_content, normalize_number};

use crate::error::ContactsResult;
use crate::schema::property::view;
use crate::schema::views;
use crate::schema::{SchemaRegistry, ViewPermissions};
use child::{ChildBackend, ChildKind};
use std::sync::Arc;

/// Registers every built-in view in wire-schema order.
pub fn register_builtin_views(registry: &mut SchemaRegistry) -> ContactsResult<()> {
    let permissions = ViewPermissions::CONTACT;
    registry.register(
        view::ADDRESSBOOK,
        views::ADDRESSBOOK_PROPERTIES,
        Arc::new(addressbook::AddressbookBackend),
        permissions,
    )?;
    registry.register(
        view::PERSON,
        views::PERSON_PROPERTIES,
        Arc::new(person::PersonBackend),
        permissions,
    )?;
    registry.register(
        view::CONTACT,
        views::CONTACT_PROPERTIES,
        Arc::new(contact::ContactBackend),
        permissions,
    )?;
    for (uri, descriptors, kind) in [
        (view::NAME, views::NAME_PROPERTIES, ChildKind::Name),
        (view::NUMBER, views::NUMBER_PROPERTIES, ChildKind::Number),
        (view::EMAIL, views::EMAIL_PROPERTIES, ChildKind::Email),
        (view::ADDRESS, views::ADDRESS_PROPERTIES, ChildKind::Address),
    ] {
        registry.register(uri, descriptors, Arc::new(ChildBackend::new(kind)), permissions)?;
    }
    registry.register(
        view::SPEEDDIAL,
        views::SPEEDDIAL_PROPERTIES,
        Arc::new(speeddial::SpeeddialBackend),
        permissions,
    )?;
    registry.register(
        view::UPDATED_INFO,
        views::UPDATED_INFO_PROPERTIES,
        Arc::new(updated_info::UpdatedInfoBackend),
        permissions,
    )?;
    Ok(())
}
