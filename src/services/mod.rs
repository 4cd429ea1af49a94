//! External collaborators the core talks to through narrow traits.

/// Outbound email delivery
pub mod email;
/// Payment gateway client
pub mod payment;
/// Uploaded file storage
pub mod storage;
/// Email body templates
pub mod templates;

pub use email::{DisabledMailer, EmailMessage, EmailSender, SmtpMailer};
pub use payment::{DisabledGateway, GatewayOrder, PaymentGateway, RazorpayClient};
pub use storage::{FileStore, LocalFileStore, ObjectFileStore, UploadedFile};
pub use templates::EmailTemplates;
