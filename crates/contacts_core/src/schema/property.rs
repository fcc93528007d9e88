//! View URIs and stable property ids of the built-in views.
//!
//! Ids are persisted and transmitted; never renumber an existing constant.
//! The upper 16 bits name the view, the lower 16 bits the property.

use super::PropertyId;

const fn prop(view: u32, index: u32) -> PropertyId {
    PropertyId((view << 16) | index)
}

/// View URIs of the built-in views.
pub mod view {
    pub const ADDRESSBOOK: &str = "contacts.addressbook";
    pub const PERSON: &str = "contacts.person";
    pub const CONTACT: &str = "contacts.contact";
    pub const NAME: &str = "contacts.name";
    pub const NUMBER: &str = "contacts.number";
    pub const EMAIL: &str = "contacts.email";
    pub const ADDRESS: &str = "contacts.address";
    pub const SPEEDDIAL: &str = "contacts.speeddial";
    pub const UPDATED_INFO: &str = "contacts.updated_info";
}

pub mod addressbook {
    use super::{prop, PropertyId};

    const VIEW: u32 = 0x0001;
    pub const ID: PropertyId = prop(VIEW, 1);
    pub const NAME: PropertyId = prop(VIEW, 2);
    pub const ACCOUNT_ID: PropertyId = prop(VIEW, 3);
    pub const MODE: PropertyId = prop(VIEW, 4);

    /// Id of the built-in local addressbook.
    pub const DEFAULT_ID: i32 = 0;
}

pub mod person {
    use super::{prop, PropertyId};

    const VIEW: u32 = 0x0002;
    pub const ID: PropertyId = prop(VIEW, 1);
    pub const DISPLAY_NAME: PropertyId = prop(VIEW, 2);
    pub const DISPLAY_CONTACT_ID: PropertyId = prop(VIEW, 3);
    pub const RINGTONE_PATH: PropertyId = prop(VIEW, 4);
    pub const IMAGE_THUMBNAIL_PATH: PropertyId = prop(VIEW, 5);
    pub const VIBRATION: PropertyId = prop(VIEW, 6);
    pub const MESSAGE_ALERT: PropertyId = prop(VIEW, 7);
    pub const IS_FAVORITE: PropertyId = prop(VIEW, 8);
    pub const FAVORITE_PRIORITY: PropertyId = prop(VIEW, 9);
    pub const HAS_PHONENUMBER: PropertyId = prop(VIEW, 10);
    pub const HAS_EMAIL: PropertyId = prop(VIEW, 11);
    pub const LINK_COUNT: PropertyId = prop(VIEW, 12);
}

pub mod contact {
    use super::{prop, PropertyId};

    const VIEW: u32 = 0x0003;
    pub const ID: PropertyId = prop(VIEW, 1);
    pub const PERSON_ID: PropertyId = prop(VIEW, 2);
    pub const ADDRESSBOOK_ID: PropertyId = prop(VIEW, 3);
    pub const DISPLAY_NAME: PropertyId = prop(VIEW, 4);
    pub const RINGTONE_PATH: PropertyId = prop(VIEW, 5);
    pub const IMAGE_THUMBNAIL_PATH: PropertyId = prop(VIEW, 6);
    pub const VIBRATION: PropertyId = prop(VIEW, 7);
    pub const MESSAGE_ALERT: PropertyId = prop(VIEW, 8);
    pub const IS_FAVORITE: PropertyId = prop(VIEW, 9);
    pub const UID: PropertyId = prop(VIEW, 10);
    pub const CHANGED_TIME: PropertyId = prop(VIEW, 11);
    pub const CREATED_VER: PropertyId = prop(VIEW, 12);
    pub const CHANGED_VER: PropertyId = prop(VIEW, 13);
    pub const NAME: PropertyId = prop(VIEW, 14);
    pub const NUMBERS: PropertyId = prop(VIEW, 15);
    pub const EMAILS: PropertyId = prop(VIEW, 16);
    pub const ADDRESSES: PropertyId = prop(VIEW, 17);
}

pub mod name {
    use super::{prop, PropertyId};

    const VIEW: u32 = 0x0004;
    pub const ID: PropertyId = prop(VIEW, 1);
    pub const CONTACT_ID: PropertyId = prop(VIEW, 2);
    pub const FIRST: PropertyId = prop(VIEW, 3);
    pub const LAST: PropertyId = prop(VIEW, 4);
    pub const ADDITION: PropertyId = prop(VIEW, 5);
    pub const PREFIX: PropertyId = prop(VIEW, 6);
    pub const SUFFIX: PropertyId = prop(VIEW, 7);
}

pub mod number {
    use super::{prop, PropertyId};

    const VIEW: u32 = 0x0005;
    pub const ID: PropertyId = prop(VIEW, 1);
    pub const CONTACT_ID: PropertyId = prop(VIEW, 2);
    pub const IS_DEFAULT: PropertyId = prop(VIEW, 3);
    pub const TYPE: PropertyId = prop(VIEW, 4);
    pub const LABEL: PropertyId = prop(VIEW, 5);
    pub const NUMBER: PropertyId = prop(VIEW, 6);
    pub const NORMALIZED_NUMBER: PropertyId = prop(VIEW, 7);

    pub const TYPE_OTHER: i32 = 0;
    pub const TYPE_CUSTOM: i32 = 1;
    pub const TYPE_HOME: i32 = 1 << 1;
    pub const TYPE_WORK: i32 = 1 << 2;
    pub const TYPE_VOICE: i32 = 1 << 3;
    pub const TYPE_FAX: i32 = 1 << 4;
    pub const TYPE_CELL: i32 = 1 << 6;
}

pub mod email {
    use super::{prop, PropertyId};

    const VIEW: u32 = 0x0006;
    pub const ID: PropertyId = prop(VIEW, 1);
    pub const CONTACT_ID: PropertyId = prop(VIEW, 2);
    pub const IS_DEFAULT: PropertyId = prop(VIEW, 3);
    pub const TYPE: PropertyId = prop(VIEW, 4);
    pub const LABEL: PropertyId = prop(VIEW, 5);
    pub const EMAIL: PropertyId = prop(VIEW, 6);

    pub const TYPE_OTHER: i32 = 0;
    pub const TYPE_HOME: i32 = 1 << 1;
    pub const TYPE_WORK: i32 = 1 << 2;
}

pub mod address {
    use super::{prop, PropertyId};

    const VIEW: u32 = 0x0007;
    pub const ID: PropertyId = prop(VIEW, 1);
    pub const CONTACT_ID: PropertyId = prop(VIEW, 2);
    pub const IS_DEFAULT: PropertyId = prop(VIEW, 3);
    pub const TYPE: PropertyId = prop(VIEW, 4);
    pub const LABEL: PropertyId = prop(VIEW, 5);
    pub const POBOX: PropertyId = prop(VIEW, 6);
    pub const POSTAL_CODE: PropertyId = prop(VIEW, 7);
    pub const REGION: PropertyId = prop(VIEW, 8);
    pub const LOCALITY: PropertyId = prop(VIEW, 9);
    pub const STREET: PropertyId = prop(VIEW, 10);
    pub const EXTENDED: PropertyId = prop(VIEW, 11);
    pub const COUNTRY: PropertyId = prop(VIEW, 12);

    /// Text fields whose emptiness makes an address contentless.
    pub const CONTENT_FIELDS: [PropertyId; 7] = [
        POBOX,
        POSTAL_CODE,
        REGION,
        LOCALITY,
        STREET,
        EXTENDED,
        COUNTRY,
    ];
}

pub mod speeddial {
    use super::{prop, PropertyId};

    const VIEW: u32 = 0x0008;
    pub const SPEEDDIAL_NUMBER: PropertyId = prop(VIEW, 1);
    pub const NUMBER_ID: PropertyId = prop(VIEW, 2);
    pub const NUMBER: PropertyId = prop(VIEW, 3);
    pub const NUMBER_LABEL: PropertyId = prop(VIEW, 4);
    pub const NUMBER_TYPE: PropertyId = prop(VIEW, 5);
    pub const PERSON_ID: PropertyId = prop(VIEW, 6);
    pub const DISPLAY_NAME: PropertyId = prop(VIEW, 7);
    pub const IMAGE_THUMBNAIL_PATH: PropertyId = prop(VIEW, 8);
}

pub mod updated_info {
    use super::{prop, PropertyId};

    const VIEW: u32 = 0x0009;
    pub const VIEW_URI: PropertyId = prop(VIEW, 1);
    pub const RECORD_ID: PropertyId = prop(VIEW, 2);
    pub const ADDRESSBOOK_ID: PropertyId = prop(VIEW, 3);
    pub const TYPE: PropertyId = prop(VIEW, 4);
    pub const VERSION: PropertyId = prop(VIEW, 5);

    pub const TYPE_INSERTED: i32 = 0;
    pub const TYPE_UPDATED: i32 = 1;
    pub const TYPE_DELETED: i32 = 2;
}
