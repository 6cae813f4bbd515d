pub mod audit_revisions;
pub mod constraints;
pub mod csv_import;
pub mod email_sender;
pub mod fields;
pub mod lookup_filter;
pub mod lookup_service;
pub mod persistence;
pub mod render;

pub use audit_revisions::get_all_audit_revisions;
pub use constraints::ConstraintTranslator;
pub use csv_import::CsvImport;
pub use email_sender::{
    queue_notification, DeliveryReport, EmailMessageSender, LogMailTransport, MailTransport,
};
pub use fields::{fields_of, Entity, EntityFields, FieldTable};
pub use lookup_filter::{filter_by_active_status, filter_by_effective_date, parse_date, CalendarDay};
pub use lookup_service::{LookupQuery, LookupValueOperations};
pub use persistence::PersistenceHelper;
pub use render::{rendered_content_type, xml_to_value, DocumentRenderer, TemplateRenderService};
