//! Descriptor tables of the built-in views.

use super::property::{
    address, addressbook, contact, email, name, number, person, speeddial, updated_info, view,
};
use super::{DataKind, PropertyDescriptor, PropertyId};

const fn string(id: PropertyId, name: &'static str) -> PropertyDescriptor {
    PropertyDescriptor::new(id, name, DataKind::Str)
}

const fn int(id: PropertyId, name: &'static str) -> PropertyDescriptor {
    PropertyDescriptor::new(id, name, DataKind::Int)
}

const fn uint(id: PropertyId, name: &'static str) -> PropertyDescriptor {
    PropertyDescriptor::new(id, name, DataKind::UInt)
}

const fn boolean(id: PropertyId, name: &'static str) -> PropertyDescriptor {
    PropertyDescriptor::new(id, name, DataKind::Bool)
}

const fn longlong(id: PropertyId, name: &'static str) -> PropertyDescriptor {
    PropertyDescriptor::new(id, name, DataKind::LongLong)
}

const fn double(id: PropertyId, name: &'static str) -> PropertyDescriptor {
    PropertyDescriptor::new(id, name, DataKind::Double)
}

pub(crate) const ADDRESSBOOK_PROPERTIES: &[PropertyDescriptor] = &[
    int(addressbook::ID, "id").primary(),
    string(addressbook::NAME, "name"),
    int(addressbook::ACCOUNT_ID, "account_id"),
    uint(addressbook::MODE, "mode"),
];

pub(crate) const PERSON_PROPERTIES: &[PropertyDescriptor] = &[
    int(person::ID, "id").primary(),
    string(person::DISPLAY_NAME, "display_name").read_only(),
    int(person::DISPLAY_CONTACT_ID, "display_contact_id"),
    string(person::RINGTONE_PATH, "ringtone_path"),
    string(person::IMAGE_THUMBNAIL_PATH, "image_thumbnail_path"),
    string(person::VIBRATION, "vibration"),
    string(person::MESSAGE_ALERT, "message_alert"),
    boolean(person::IS_FAVORITE, "is_favorite"),
    double(person::FAVORITE_PRIORITY, "favorite_priority"),
    boolean(person::HAS_PHONENUMBER, "has_phonenumber").read_only(),
    boolean(person::HAS_EMAIL, "has_email").read_only(),
    int(person::LINK_COUNT, "link_count").read_only(),
];

pub(crate) const CONTACT_PROPERTIES: &[PropertyDescriptor] = &[
    int(contact::ID, "id").primary(),
    int(contact::PERSON_ID, "person_id"),
    int(contact::ADDRESSBOOK_ID, "addressbook_id"),
    string(contact::DISPLAY_NAME, "display_name").read_only(),
    string(contact::RINGTONE_PATH, "ringtone_path"),
    string(contact::IMAGE_THUMBNAIL_PATH, "image_thumbnail_path"),
    string(contact::VIBRATION, "vibration"),
    string(contact::MESSAGE_ALERT, "message_alert"),
    boolean(contact::IS_FAVORITE, "is_favorite"),
    string(contact::UID, "uid"),
    longlong(contact::CHANGED_TIME, "changed_time").read_only(),
    longlong(contact::CREATED_VER, "created_ver").read_only(),
    longlong(contact::CHANGED_VER, "changed_ver").read_only(),
    PropertyDescriptor::children(contact::NAME, "name", view::NAME),
    PropertyDescriptor::children(contact::NUMBERS, "numbers", view::NUMBER),
    PropertyDescriptor::children(contact::EMAILS, "emails", view::EMAIL),
    PropertyDescriptor::children(contact::ADDRESSES, "addresses", view::ADDRESS),
];

pub(crate) const NAME_PROPERTIES: &[PropertyDescriptor] = &[
    int(name::ID, "id").primary(),
    int(name::CONTACT_ID, "contact_id"),
    string(name::FIRST, "first"),
    string(name::LAST, "last"),
    string(name::ADDITION, "addition"),
    string(name::PREFIX, "prefix"),
    string(name::SUFFIX, "suffix"),
];

pub(crate) const NUMBER_PROPERTIES: &[PropertyDescriptor] = &[
    int(number::ID, "id").primary(),
    int(number::CONTACT_ID, "contact_id"),
    boolean(number::IS_DEFAULT, "is_default"),
    int(number::TYPE, "type"),
    string(number::LABEL, "label"),
    string(number::NUMBER, "number"),
    string(number::NORMALIZED_NUMBER, "normalized_number").read_only(),
];

pub(crate) const EMAIL_PROPERTIES: &[PropertyDescriptor] = &[
    int(email::ID, "id").primary(),
    int(email::CONTACT_ID, "contact_id"),
    boolean(email::IS_DEFAULT, "is_default"),
    int(email::TYPE, "type"),
    string(email::LABEL, "label"),
    string(email::EMAIL, "email"),
];

pub(crate) const ADDRESS_PROPERTIES: &[PropertyDescriptor] = &[
    int(address::ID, "id").primary(),
    int(address::CONTACT_ID, "contact_id"),
    boolean(address::IS_DEFAULT, "is_default"),
    int(address::TYPE, "type"),
    string(address::LABEL, "label"),
    string(address::POBOX, "pobox"),
    string(address::POSTAL_CODE, "postal_code"),
    string(address::REGION, "region"),
    string(address::LOCALITY, "locality"),
    string(address::STREET, "street"),
    string(address::EXTENDED, "extended"),
    string(address::COUNTRY, "country"),
];

pub(crate) const SPEEDDIAL_PROPERTIES: &[PropertyDescriptor] = &[
    int(speeddial::SPEEDDIAL_NUMBER, "speeddial_number"),
    int(speeddial::NUMBER_ID, "number_id"),
    string(speeddial::NUMBER, "number").read_only(),
    string(speeddial::NUMBER_LABEL, "number_label").read_only(),
    int(speeddial::NUMBER_TYPE, "number_type").read_only(),
    int(speeddial::PERSON_ID, "person_id").read_only(),
    string(speeddial::DISPLAY_NAME, "display_name").read_only(),
    string(speeddial::IMAGE_THUMBNAIL_PATH, "image_thumbnail_path").read_only(),
];

pub(crate) const UPDATED_INFO_PROPERTIES: &[PropertyDescriptor] = &[
    string(updated_info::VIEW_URI, "view_uri")
        .read_only()
        .filter_only(),
    int(updated_info::RECORD_ID, "record_id").read_only(),
    int(updated_info::ADDRESSBOOK_ID, "addressbook_id").read_only(),
    int(updated_info::TYPE, "type").read_only(),
    longlong(updated_info::VERSION, "version").read_only(),
];
