mod compose;
pub use compose::{MailMessage, compose};

mod http;
pub use http::{HttpMailer, MailerConfig};

mod trace;
pub use trace::TraceNotifier;
