pub(crate) mod macros;
pub(crate) mod net;
pub(crate) mod selector;

pub(crate) use net::Socket;
pub(crate) use selector::{event_data, is_error_or_hup, is_readable, is_writable, Event, Events, Selector};
